//! Command-line interface definition and dispatch for mixtape.
//!
//! Uses [`clap`] for argument parsing with derive macros.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::chat;
use crate::config::Config;
use crate::store::ConversationStore;

/// Top-level CLI structure for mixtape.
///
/// Parsed from command-line arguments via [`clap::Parser`]. Contains a
/// single required subcommand that determines which action mixtape
/// performs.
#[derive(Parser)]
#[command(name = "mixtape", about = "A Spotify playlist curator for the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the mixtape CLI.
///
/// The `///` doc comments on variants double as `--help` text rendered
/// by clap.
#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Resume a specific conversation
        #[arg(short, long)]
        conversation: Option<String>,
    },
    /// Manage stored conversations
    Conversations {
        #[command(subcommand)]
        action: ConversationAction,
    },
}

/// Subcommands for the `conversations` command.
#[derive(Subcommand)]
pub enum ConversationAction {
    /// List stored conversations
    List,
    /// Delete a stored conversation
    Delete { id: String },
}

/// Parses command-line arguments into a [`Cli`] struct.
///
/// Delegates to [`clap::Parser::parse`], which exits the process on
/// invalid input.
pub fn parse() -> Cli {
    Cli::parse()
}

/// Dispatches the parsed CLI command to its handler.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Chat { conversation } => {
            let config = Config::load()?;
            chat::run_chat(config, conversation).await
        }
        Commands::Conversations { action } => {
            let store = ConversationStore::open_default()?;
            match action {
                ConversationAction::List => {
                    let conversations = store.list()?;
                    if conversations.is_empty() {
                        println!("{}", "No stored conversations.".dimmed());
                        return Ok(());
                    }
                    for meta in conversations {
                        println!(
                            "{}  {}  {}",
                            meta.id.cyan(),
                            meta.updated_at.dimmed(),
                            meta.title.as_deref().unwrap_or("(untitled)"),
                        );
                    }
                    Ok(())
                }
                ConversationAction::Delete { id } => {
                    store.delete(&id)?;
                    println!("Deleted conversation {}", id.cyan());
                    Ok(())
                }
            }
        }
    }
}
