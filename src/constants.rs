//! Centralized constants for mixtape.
//!
//! All magic numbers, default strings, and configuration constants live here
//! so they can be changed in one place.

/// Application name used in CLI output and directory paths.
pub const APP_NAME: &str = "mixtape";

/// Default chat completion model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default base URL for the OpenAI-compatible chat completions API.
pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Base URL for the Spotify Web API.
pub const SPOTIFY_API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Page size for paginated Spotify fetches.
pub const SPOTIFY_PAGE_LIMIT: u32 = 50;

/// Maximum model round-trips per user turn. A confused model that keeps
/// requesting tools ends the turn with an apology instead of looping forever.
pub const MAX_TOOL_ROUNDS: usize = 25;

/// Configuration filename.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Readline history filename.
pub const HISTORY_FILENAME: &str = "chat_history.txt";

/// Shown when the completion endpoint fails mid-turn.
pub const APOLOGY_TEXT: &str = "I'm sorry, I'm having trouble connecting to the chat service.";

/// Shown when a turn hits [`MAX_TOOL_ROUNDS`].
pub const ROUND_LIMIT_TEXT: &str =
    "I'm sorry, I had to stop: this request needed more tool calls than I'm allowed to make.";

/// Shown when the model returns no usable output at all.
pub const NO_OUTPUT_TEXT: &str = "No output in response";

/// System instructions sent with every completion request.
pub const SYSTEM_PROMPT: &str = "\
You are a musical history expert and you help analyzing the user's Spotify \
playlists and creating new playlists. In particular, you can curate new \
playlists based on a period or a genre that the user is interested in, and \
you can furnish the corresponding explanations. For example, you could \
create a playlist of the most important transition shifts of The Beatles \
and furnish a text, while the user can listen to the playlist you've created.

You have the following tools available:
1) Retrieve the user's playlists from Spotify.
2) Retrieve the user's liked songs list from Spotify.
3) Retrieve all the songs from a given playlist.
4) Create a new playlist on Spotify.

Rely on your existing knowledge about music to answer the user's questions. \
Do not use the user's playlists to answer general musical questions, or \
questions about a certain era or artist.

IMPORTANT: Only make a function call to get Spotify information after the \
user explicitly confirms that you can do it.
";
