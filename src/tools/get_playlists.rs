use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;

use super::Tool;
use crate::spotify::MusicService;

/// Lists the playlists owned by the current user.
pub struct GetMyPlaylistsTool {
    service: Arc<dyn MusicService>,
}

impl GetMyPlaylistsTool {
    pub fn new(service: Arc<dyn MusicService>) -> Self {
        Self { service }
    }
}

#[async_trait::async_trait]
impl Tool for GetMyPlaylistsTool {
    fn name(&self) -> &str {
        "get_my_playlists"
    }

    fn description(&self) -> &str {
        "Returns a list of the user's Spotify playlists"
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
        let playlists = self.service.get_user_playlists().await?;
        Ok(serde_json::to_string(&playlists)?)
    }
}
