use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::Tool;
use crate::spotify::MusicService;

/// Lists the songs in a playlist.
pub struct GetPlaylistContentsTool {
    service: Arc<dyn MusicService>,
}

impl GetPlaylistContentsTool {
    pub fn new(service: Arc<dyn MusicService>) -> Self {
        Self { service }
    }
}

#[derive(Deserialize)]
struct GetPlaylistContentsInput {
    playlist_id: String,
}

#[async_trait::async_trait]
impl Tool for GetPlaylistContentsTool {
    fn name(&self) -> &str {
        "get_playlist_contents"
    }

    fn description(&self) -> &str {
        "Returns a list of songs in a playlist"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "playlist_id": {
                    "type": "string",
                    "description": "The ID of the playlist. This ID must have been previously retrieved by a call to get_my_playlists."
                }
            },
            "required": ["playlist_id"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let input: GetPlaylistContentsInput = serde_json::from_value(args)?;
        let tracks = self.service.get_playlist_contents(&input.playlist_id).await?;
        Ok(serde_json::to_string(&tracks)?)
    }
}
