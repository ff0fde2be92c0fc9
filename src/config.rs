//! Configuration types and path resolution for mixtape.
//!
//! Mixtape stores its settings as TOML at the platform's XDG config path
//! (e.g. `~/.config/mixtape/config.toml` on Linux) and conversation data
//! under the XDG data directory (`~/.local/share/mixtape/`).

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{APP_NAME, CONFIG_FILENAME, DEFAULT_MODEL, OPENAI_DEFAULT_BASE_URL};

/// Root configuration for mixtape, deserialized from `config.toml`.
///
/// All fields are optional so mixtape can run with sensible defaults
/// when no config file exists.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    /// Chat completion model identifier (e.g. `"gpt-4o-mini"`).
    pub model: Option<String>,
    /// OpenAI-compatible chat endpoint settings.
    pub openai: Option<EndpointEntry>,
    /// Spotify Web API settings.
    pub spotify: Option<EndpointEntry>,
}

/// Connection details for a single remote endpoint.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct EndpointEntry {
    /// Credential for the endpoint. Can also be set via environment
    /// variables.
    pub api_key: Option<String>,
    /// Custom base URL (useful for proxies or mock servers).
    pub base_url: Option<String>,
}

impl Config {
    /// Loads the config from `~/.config/mixtape/config.toml`, resolving
    /// `{env:VAR}` placeholders in credential and URL fields.
    ///
    /// If no config file exists, creates one with `{env:VAR}`
    /// placeholders for both credentials and returns it.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            let default_toml = format!(
                r#"model = "{}"

[openai]
api_key = "{{env:OPENAI_API_KEY}}"

[spotify]
api_key = "{{env:SPOTIFY_ACCESS_TOKEN}}"
"#,
                DEFAULT_MODEL
            );
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &default_toml)
                .with_context(|| format!("Failed to write default config to {:?}", path))?;
            let mut config: Config = toml::from_str(&default_toml)
                .with_context(|| "Failed to parse default config".to_string())?;
            config.resolve_substitutions();
            return Ok(config);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {:?}", path))?;
        config.resolve_substitutions();
        Ok(config)
    }

    /// Resolve `{env:VAR_NAME}` patterns in string fields.
    fn resolve_substitutions(&mut self) {
        if let Some(ref mut model) = self.model {
            *model = Self::resolve_str(model);
        }
        Self::resolve_endpoint_entry(&mut self.openai);
        Self::resolve_endpoint_entry(&mut self.spotify);
    }

    /// Resolves `{env:VAR}` patterns in a single entry's `api_key` and
    /// `base_url`.
    fn resolve_endpoint_entry(entry: &mut Option<EndpointEntry>) {
        if let Some(ref mut e) = entry {
            if let Some(ref mut key) = e.api_key {
                *key = Self::resolve_str(key);
            }
            if let Some(ref mut url) = e.base_url {
                *url = Self::resolve_str(url);
            }
        }
    }

    /// Replace `{env:VAR}` with the environment variable value.
    fn resolve_str(s: &str) -> String {
        let mut result = s.to_string();
        while let Some(start) = result.find("{env:") {
            if let Some(end) = result[start..].find('}') {
                let var_name = &result[start + 5..start + end];
                let value = std::env::var(var_name).unwrap_or_default();
                result = format!(
                    "{}{}{}",
                    &result[..start],
                    value,
                    &result[start + end + 1..]
                );
            } else {
                break;
            }
        }
        result
    }

    /// Resolve the OpenAI API key: env var first, then config value.
    pub fn openai_api_key(&self) -> Option<String> {
        Self::resolve_credential("OPENAI_API_KEY", &self.openai)
    }

    /// Resolve the Spotify access token: env var first, then config value.
    pub fn spotify_access_token(&self) -> Option<String> {
        Self::resolve_credential("SPOTIFY_ACCESS_TOKEN", &self.spotify)
    }

    fn resolve_credential(env_key: &str, entry: &Option<EndpointEntry>) -> Option<String> {
        if let Ok(val) = std::env::var(env_key) {
            if !val.is_empty() {
                return Some(val);
            }
        }
        entry
            .as_ref()
            .and_then(|e| e.api_key.clone())
            .filter(|k| !k.is_empty())
    }

    /// The configured chat model, falling back to the default.
    pub fn model_name(&self) -> String {
        self.model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    /// The configured chat endpoint base URL, falling back to the
    /// OpenAI default.
    pub fn openai_base_url(&self) -> String {
        self.openai
            .as_ref()
            .and_then(|e| e.base_url.clone())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| OPENAI_DEFAULT_BASE_URL.to_string())
    }

    /// Returns the platform-specific configuration directory for
    /// mixtape (`~/.config/mixtape/` on Linux).
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join(APP_NAME);
        Ok(dir)
    }

    /// Returns the platform-specific data directory for mixtape
    /// (`~/.local/share/mixtape/` on Linux). Used for conversation
    /// history.
    pub fn data_dir() -> Result<PathBuf> {
        let dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?
            .join(APP_NAME);
        Ok(dir)
    }

    /// Returns the platform-specific cache directory for mixtape
    /// (`~/.cache/mixtape/` on Linux). Used for readline history.
    pub fn cache_dir() -> Result<PathBuf> {
        let dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?
            .join(APP_NAME);
        Ok(dir)
    }

    /// Returns the full path to the mixtape configuration file.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_placeholders_are_substituted() {
        std::env::set_var("MIXTAPE_TEST_TOKEN", "tok-123");
        let mut config: Config = toml::from_str(
            r#"
model = "gpt-4o-mini"

[spotify]
api_key = "{env:MIXTAPE_TEST_TOKEN}"
base_url = "http://localhost:9/{env:MIXTAPE_TEST_TOKEN}"
"#,
        )
        .unwrap();
        config.resolve_substitutions();

        let spotify = config.spotify.as_ref().unwrap();
        assert_eq!(spotify.api_key.as_deref(), Some("tok-123"));
        assert_eq!(
            spotify.base_url.as_deref(),
            Some("http://localhost:9/tok-123")
        );
    }

    #[test]
    fn unset_env_placeholder_resolves_empty() {
        let mut config: Config = toml::from_str(
            r#"
[openai]
api_key = "{env:MIXTAPE_TEST_DEFINITELY_UNSET}"
"#,
        )
        .unwrap();
        config.resolve_substitutions();

        // Empty keys are treated as absent.
        assert_eq!(config.openai.as_ref().unwrap().api_key.as_deref(), Some(""));
        assert_eq!(
            Config::resolve_credential("MIXTAPE_TEST_DEFINITELY_UNSET", &config.openai),
            None
        );
    }

    #[test]
    fn model_and_base_url_fall_back_to_defaults() {
        let config = Config::default();
        assert_eq!(config.model_name(), DEFAULT_MODEL);
        assert_eq!(config.openai_base_url(), OPENAI_DEFAULT_BASE_URL);
    }
}
