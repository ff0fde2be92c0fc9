//! Spotify Web API collaborator.
//!
//! [`MusicService`] is the capability seam the tools dispatch through;
//! [`SpotifyClient`] implements it over reqwest with a caller-supplied
//! bearer token. Token exchange and refresh happen outside this crate —
//! the client assumes the token it was handed is ready to use.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::constants::{SPOTIFY_API_BASE_URL, SPOTIFY_PAGE_LIMIT};

/// A playlist summary as surfaced to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    pub playlist_id: String,
    pub description: String,
    pub tracks: u32,
}

/// A track as surfaced to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub artist: String,
    pub album: String,
    pub track_id: String,
}

/// The music-service operations exposed to the model as tools.
///
/// Implementations perform real side effects; nothing here is
/// idempotent. A retried `create_playlist` creates a second playlist.
#[async_trait]
pub trait MusicService: Send + Sync {
    /// Playlists owned by the current user.
    async fn get_user_playlists(&self) -> Result<Vec<Playlist>>;

    /// The user's liked (saved) songs.
    async fn get_liked_songs(&self) -> Result<Vec<Track>>;

    /// Tracks in a specific playlist.
    async fn get_playlist_contents(&self, playlist_id: &str) -> Result<Vec<Track>>;

    /// Creates a public playlist, adds the tracks, and returns the new
    /// playlist's id.
    async fn create_playlist(
        &self,
        name: &str,
        description: &str,
        track_uris: &[String],
    ) -> Result<String>;
}

/// A [`MusicService`] backed by the Spotify Web API.
pub struct SpotifyClient {
    client: Client,
    access_token: String,
    base_url: String,
}

impl SpotifyClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, SPOTIFY_API_BASE_URL)
    }

    /// Point the client at a different API base. Used by tests.
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            access_token: access_token.into(),
            base_url: base_url.into(),
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .with_context(|| format!("Spotify request failed: {}", url))?
            .error_for_status()
            .with_context(|| format!("Spotify returned an error for {}", url))?;
        let body = response
            .json::<Value>()
            .await
            .context("Failed to decode Spotify response")?;
        Ok(body)
    }

    async fn current_user_id(&self) -> Result<String> {
        let me = self.get_json(&format!("{}/me", self.base_url)).await?;
        let id = me
            .get("id")
            .and_then(Value::as_str)
            .context("Spotify /me response missing id")?;
        Ok(id.to_string())
    }
}

/// Extract a [`Track`] from a Spotify track object, joining artist names
/// with `", "`. Returns `None` for null tracks (removed from the catalog
/// but still referenced by a playlist).
fn track_from_item(track: &Value) -> Option<Track> {
    if track.is_null() {
        return None;
    }
    let artist = track
        .get("artists")
        .and_then(Value::as_array)
        .map(|artists| {
            artists
                .iter()
                .filter_map(|a| a.get("name").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();
    Some(Track {
        name: track.get("name").and_then(Value::as_str)?.to_string(),
        artist,
        album: track
            .pointer("/album/name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        track_id: track.get("id").and_then(Value::as_str)?.to_string(),
    })
}

#[async_trait]
impl MusicService for SpotifyClient {
    async fn get_user_playlists(&self) -> Result<Vec<Playlist>> {
        let user_id = self.current_user_id().await?;
        let mut playlists = Vec::new();
        let mut next = Some(format!(
            "{}/me/playlists?limit={}",
            self.base_url, SPOTIFY_PAGE_LIMIT
        ));

        while let Some(url) = next {
            let page = self.get_json(&url).await?;
            if let Some(items) = page.get("items").and_then(Value::as_array) {
                for item in items {
                    // Only include playlists owned by the user.
                    if item.pointer("/owner/id").and_then(Value::as_str) != Some(&user_id) {
                        continue;
                    }
                    let (Some(name), Some(id)) = (
                        item.get("name").and_then(Value::as_str),
                        item.get("id").and_then(Value::as_str),
                    ) else {
                        continue;
                    };
                    playlists.push(Playlist {
                        name: name.to_string(),
                        playlist_id: id.to_string(),
                        description: item
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        tracks: item
                            .pointer("/tracks/total")
                            .and_then(Value::as_u64)
                            .unwrap_or(0) as u32,
                    });
                }
            }
            next = page.get("next").and_then(Value::as_str).map(String::from);
        }

        Ok(playlists)
    }

    async fn get_liked_songs(&self) -> Result<Vec<Track>> {
        let mut liked = Vec::new();
        let mut next = Some(format!(
            "{}/me/tracks?limit={}",
            self.base_url, SPOTIFY_PAGE_LIMIT
        ));

        while let Some(url) = next {
            let page = self.get_json(&url).await?;
            if let Some(items) = page.get("items").and_then(Value::as_array) {
                for item in items {
                    if let Some(track) = item.get("track").and_then(track_from_item) {
                        liked.push(track);
                    }
                }
            }
            next = page.get("next").and_then(Value::as_str).map(String::from);
        }

        Ok(liked)
    }

    async fn get_playlist_contents(&self, playlist_id: &str) -> Result<Vec<Track>> {
        info!(playlist_id, "fetching playlist contents");
        let mut tracks = Vec::new();
        let mut next = Some(format!(
            "{}/playlists/{}/tracks?limit={}",
            self.base_url, playlist_id, SPOTIFY_PAGE_LIMIT
        ));

        while let Some(url) = next {
            let page = self.get_json(&url).await?;
            if let Some(items) = page.get("items").and_then(Value::as_array) {
                for item in items {
                    if let Some(track) = item.get("track").and_then(track_from_item) {
                        tracks.push(track);
                    }
                }
            }
            next = page.get("next").and_then(Value::as_str).map(String::from);
        }

        Ok(tracks)
    }

    async fn create_playlist(
        &self,
        name: &str,
        description: &str,
        track_uris: &[String],
    ) -> Result<String> {
        info!(name, count = track_uris.len(), "creating playlist");
        let user_id = self.current_user_id().await?;

        let playlist = self
            .client
            .post(format!("{}/users/{}/playlists", self.base_url, user_id))
            .bearer_auth(&self.access_token)
            .json(&json!({
                "name": name,
                "description": description,
                "public": true,
            }))
            .send()
            .await
            .context("Spotify playlist creation request failed")?
            .error_for_status()
            .context("Spotify rejected playlist creation")?
            .json::<Value>()
            .await
            .context("Failed to decode playlist creation response")?;

        let playlist_id = playlist
            .get("id")
            .and_then(Value::as_str)
            .context("Playlist creation response missing id")?
            .to_string();

        self.client
            .post(format!("{}/playlists/{}/tracks", self.base_url, playlist_id))
            .bearer_auth(&self.access_token)
            .json(&json!({ "uris": track_uris }))
            .send()
            .await
            .context("Spotify add-tracks request failed")?
            .error_for_status()
            .context("Spotify rejected adding tracks")?;

        Ok(playlist_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_from_item_joins_artists() {
        let track = json!({
            "name": "Come Together",
            "id": "t1",
            "album": { "name": "Abbey Road" },
            "artists": [{ "name": "The Beatles" }, { "name": "Billy Preston" }],
        });
        let parsed = track_from_item(&track).unwrap();
        assert_eq!(parsed.artist, "The Beatles, Billy Preston");
        assert_eq!(parsed.album, "Abbey Road");
        assert_eq!(parsed.track_id, "t1");
    }

    #[test]
    fn track_from_item_skips_null_tracks() {
        assert_eq!(track_from_item(&Value::Null), None);
    }
}
