//! ircdcc - send or fetch a single file over DCC SEND.
//!
//! ```bash
//! # Offer a file; prints the DCC SEND line to paste to the peer
//! ircdcc send ./track.flac --nick bob
//!
//! # Accept an offer
//! ircdcc get 3232235786 40123 5242880 track.flac --dir ~/Downloads
//! ```

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ircdcc=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::CliConfig::load(cli.config.as_deref())?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        nick = %config.nick,
        "starting ircdcc"
    );

    match cli.command {
        Command::Send(args) => commands::send::run(args, config).await,
        Command::Get(args) => commands::get::run(args, config).await,
    }
}
