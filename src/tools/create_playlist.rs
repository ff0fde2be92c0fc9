use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::Tool;
use crate::spotify::MusicService;

/// Creates a new playlist on Spotify and fills it with tracks.
///
/// Side-effecting and not idempotent: a retried call creates a second
/// playlist.
pub struct CreatePlaylistTool {
    service: Arc<dyn MusicService>,
}

impl CreatePlaylistTool {
    pub fn new(service: Arc<dyn MusicService>) -> Self {
        Self { service }
    }
}

#[derive(Deserialize)]
struct CreatePlaylistInput {
    name: String,
    description: String,
    track_uris: Vec<String>,
}

#[async_trait::async_trait]
impl Tool for CreatePlaylistTool {
    fn name(&self) -> &str {
        "create_playlist"
    }

    fn description(&self) -> &str {
        "Creates a new playlist on Spotify."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "The name of the playlist."
                },
                "description": {
                    "type": "string",
                    "description": "The description of the playlist."
                },
                "track_uris": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "A list of Spotify track URIs to add to the playlist."
                }
            },
            "required": ["name", "description", "track_uris"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let input: CreatePlaylistInput = serde_json::from_value(args)?;
        info!(
            name = %input.name,
            tracks = input.track_uris.len(),
            "creating playlist"
        );
        let playlist_id = self
            .service
            .create_playlist(&input.name, &input.description, &input.track_uris)
            .await?;
        Ok(playlist_id)
    }
}
