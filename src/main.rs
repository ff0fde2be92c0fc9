//! Entry point for mixtape, a Spotify playlist curator for the terminal.
//!
//! This binary loads environment variables, parses CLI arguments via
//! [`cli`], and dispatches to the appropriate subcommand handler.

mod agent;
mod chat;
mod cli;
mod config;
mod constants;
mod entry;
mod error;
mod model;
mod spotify;
mod store;
mod tools;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Runs the mixtape CLI.
///
/// Loads `.env` files (silently ignored if absent), initializes tracing
/// to stderr so log lines never interleave with chat output, parses
/// command-line arguments into a [`cli::Cli`] struct, and dispatches
/// the chosen subcommand via [`cli::run`].
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::parse();
    cli::run(cli).await
}
