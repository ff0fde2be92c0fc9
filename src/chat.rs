//! Interactive chat REPL for mixtape.
//!
//! Provides a multi-turn conversation loop using [`rustyline`] for
//! readline support (history, line editing). Each user input starts an
//! agent turn; the REPL consumes the turn's event stream, showing tool
//! invocations as they happen and printing the final answer when the
//! turn completes. The full history is persisted after every turn.

use anyhow::{Context, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;

use crate::agent::{run_turn, AgentEvent, TurnParams};
use crate::config::Config;
use crate::constants::{HISTORY_FILENAME, SYSTEM_PROMPT};
use crate::entry::Entry;
use crate::model::{CompletionPort, OpenAiPort};
use crate::spotify::{MusicService, SpotifyClient};
use crate::store::ConversationStore;
use crate::tools::ToolRegistry;

/// Longest argument preview shown next to a running tool's name.
const ARG_PREVIEW_CHARS: usize = 80;

/// Runs the interactive chat REPL.
///
/// Loads credentials from config, builds the completion port and the
/// Spotify-backed tool registry, and enters a readline loop. Passing a
/// conversation id resumes that conversation with its stored history
/// replayed; otherwise a fresh conversation is started.
///
/// # Readline behavior
///
/// - **Ctrl+C**: cancels current input, stays in REPL
/// - **Ctrl+D**: exits cleanly with "goodbye."
/// - Readline history is persisted to `~/.cache/mixtape/chat_history.txt`
pub async fn run_chat(config: Config, conversation: Option<String>) -> Result<()> {
    let api_key = config
        .openai_api_key()
        .context("No OpenAI API key configured (set OPENAI_API_KEY)")?;
    let token = config
        .spotify_access_token()
        .context("No Spotify access token configured (set SPOTIFY_ACCESS_TOKEN)")?;

    let port: Arc<dyn CompletionPort> = Arc::new(OpenAiPort::new(
        api_key,
        config.openai_base_url(),
        config.model_name(),
    ));
    let service: Arc<dyn MusicService> = Arc::new(SpotifyClient::new(token));
    let registry = Arc::new(ToolRegistry::with_spotify(service));

    let store = ConversationStore::open_default()?;
    let (mut id, mut history) = match conversation {
        Some(id) => {
            let history = store.load(&id)?;
            replay(&history);
            (id, history)
        }
        None => (ConversationStore::new_id(), Vec::new()),
    };

    println!(
        "{} [model: {}] (Ctrl+D to exit)",
        "mixtape".bold().cyan(),
        config.model_name().yellow(),
    );
    println!();

    // Set up readline with persistent history
    let mut rl = DefaultEditor::new()?;
    let history_path = Config::cache_dir()?.join(HISTORY_FILENAME);
    if history_path.exists() {
        let _ = rl.load_history(&history_path);
    }

    loop {
        let readline = rl.readline(&format!("{} ", ">".green().bold()));

        match readline {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }

                // Slash commands
                if line.starts_with('/') {
                    match line.as_str() {
                        "/history" => {
                            replay(&history);
                            continue;
                        }
                        "/clear" => {
                            store.delete(&id)?;
                            history.clear();
                            id = ConversationStore::new_id();
                            println!("{}", "Conversation cleared.".dimmed());
                            continue;
                        }
                        "/help" => {
                            println!("{}", "Commands:".bold());
                            println!("  {} - show conversation history", "/history".cyan());
                            println!(
                                "  {} - delete this conversation and start over",
                                "/clear".cyan()
                            );
                            println!("  {} - show this help", "/help".cyan());
                            println!("  {} - exit", "Ctrl+D".cyan());
                            continue;
                        }
                        _ => {
                            println!("{} Unknown command: {}", "?".yellow(), line);
                            continue;
                        }
                    }
                }

                let _ = rl.add_history_entry(&line);

                history.push(Entry::user(&line));
                println!();

                let mut events = run_turn(TurnParams {
                    port: Arc::clone(&port),
                    registry: Arc::clone(&registry),
                    instructions: SYSTEM_PROMPT.to_string(),
                    history: history.clone(),
                });

                while let Some(event) = events.recv().await {
                    match event {
                        AgentEvent::ToolInvocation { name, arguments } => {
                            println!(
                                "{}",
                                format!("running {} {}", name, preview(&arguments)).dimmed()
                            );
                        }
                        AgentEvent::Turn {
                            display_text,
                            history: updated,
                        } => {
                            println!();
                            println!("{}", display_text);
                            history = updated;
                        }
                    }
                }

                store.save(&id, &history)?;
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".dimmed());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "goodbye.".dimmed());
                break;
            }
            Err(e) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                break;
            }
        }
    }

    // Save readline history
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = rl.save_history(&history_path);

    Ok(())
}

/// Prints a stored history the way it originally appeared, skipping
/// tool plumbing.
fn replay(history: &[Entry]) {
    for entry in history {
        let text = match entry {
            Entry::User { text } | Entry::Assistant { text } => text,
            Entry::Refusal { text } => text,
            Entry::ToolCall { .. } | Entry::ToolResult { .. } => continue,
        };
        println!("{} {}", format!("{}:", entry.label()).bold().cyan(), text);
        println!();
    }
}

/// Truncates a tool's raw JSON arguments for single-line display.
fn preview(arguments: &str) -> String {
    let flat: String = arguments.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > ARG_PREVIEW_CHARS {
        let truncated: String = flat.chars().take(ARG_PREVIEW_CHARS).collect();
        format!("{}...", truncated)
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview(r#"{"name": "X"}"#), r#"{"name": "X"}"#);

        let long = format!(r#"{{"track_uris":["{}"]}}"#, "u".repeat(200));
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), ARG_PREVIEW_CHARS + 3);
        assert!(shown.ends_with("..."));
    }
}
