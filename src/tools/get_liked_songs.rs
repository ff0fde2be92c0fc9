use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;

use super::Tool;
use crate::spotify::MusicService;

/// Lists the user's liked (saved) songs.
pub struct GetLikedSongsTool {
    service: Arc<dyn MusicService>,
}

impl GetLikedSongsTool {
    pub fn new(service: Arc<dyn MusicService>) -> Self {
        Self { service }
    }
}

#[async_trait::async_trait]
impl Tool for GetLikedSongsTool {
    fn name(&self) -> &str {
        "get_liked_songs"
    }

    fn description(&self) -> &str {
        "Returns a list of the user's liked songs from Spotify."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": [],
            "additionalProperties": false
        })
    }

    async fn execute(&self, _args: Value) -> Result<String> {
        let songs = self.service.get_liked_songs().await?;
        Ok(serde_json::to_string(&songs)?)
    }
}
