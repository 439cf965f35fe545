//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use ircdcc_transfer::{TransferHandle, TransferObserver, TransferStatus};

pub mod get;
pub mod send;

/// Send or fetch one file over IRC DCC SEND.
#[derive(Parser)]
#[command(name = "ircdcc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/ircdcc/config.toml)
    #[arg(long, global = true, env = "IRCDCC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Offer a local file and wait for the peer to connect
    Send(SendArgs),
    /// Accept an offer by connecting to the sender
    Get(GetArgs),
}

#[derive(Args)]
pub struct SendArgs {
    /// File to send
    pub file: PathBuf,

    /// Nick of the receiving peer
    #[arg(long, default_value = "peer")]
    pub nick: String,

    /// Listen on this port instead of the configured range
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Args)]
pub struct GetArgs {
    /// Sender address, dotted or as the 32-bit integer from the offer
    pub host: String,

    /// Sender port
    pub port: u16,

    /// Advertised size in bytes (0 = unknown)
    pub size: u64,

    /// Offered file name
    pub file_name: String,

    /// Destination directory (default: download_dir from config)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Nick of the sending peer
    #[arg(long, default_value = "peer")]
    pub nick: String,
}

/// Logs every session notification.
pub struct LogObserver;

impl TransferObserver for LogObserver {
    fn on_open(&self, t: &TransferHandle) {
        tracing::info!(
            uid = t.uid(),
            file = %t.download_file_name(),
            dir = %t.path().display(),
            "receiving"
        );
    }

    fn on_listen(&self, t: &TransferHandle) {
        tracing::info!(uid = t.uid(), port = t.port(), "waiting for {}", t.peer_nick());
    }

    fn on_connect(&self, t: &TransferHandle) {
        tracing::info!(uid = t.uid(), "{} connected", t.peer_nick());
    }

    fn on_progress(&self, t: &TransferHandle) {
        let progress = t.progress();
        tracing::info!(
            uid = t.uid(),
            bytes = progress.processed_size,
            size = progress.size,
            percent = %format!("{:.1}", progress.percentage()),
            speed = %format_speed(progress.speed),
            eta = ?t.eta().map(|d| Duration::from_secs(d.as_secs())),
            "progress"
        );
    }

    fn on_close(&self, t: &TransferHandle) {
        tracing::info!(uid = t.uid(), bytes = t.processed_size(), "closed");
    }

    fn on_error(&self, t: &TransferHandle) {
        if let Some(err) = t.error() {
            tracing::error!(
                uid = t.uid(),
                bytes = t.processed_size(),
                error = %err,
                "transfer failed"
            );
        }
    }

    fn on_complete(&self, t: &TransferHandle) {
        tracing::info!(uid = t.uid(), bytes = t.processed_size(), "transfer complete");
    }
}

/// Waits for the session to end, closing it on Ctrl-C.
///
/// Returns an error unless the transfer completed.
pub async fn finish(
    handle: &TransferHandle,
    wait: impl Future<Output = TransferStatus>,
) -> Result<()> {
    tokio::pin!(wait);
    let status = tokio::select! {
        status = &mut wait => status,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, closing transfer");
            handle.close();
            wait.await
        }
    };

    match status {
        TransferStatus::Complete => Ok(()),
        TransferStatus::Error => match handle.error() {
            Some(err) => Err(err.into()),
            None => anyhow::bail!("transfer failed"),
        },
        other => anyhow::bail!("transfer ended as {other:?}"),
    }
}

fn format_speed(bytes_per_second: f64) -> String {
    const UNITS: [&str; 4] = ["B/s", "KiB/s", "MiB/s", "GiB/s"];
    let mut value = bytes_per_second;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_is_scaled() {
        assert_eq!(format_speed(0.0), "0.0 B/s");
        assert_eq!(format_speed(1536.0), "1.5 KiB/s");
        assert_eq!(format_speed(3.0 * 1024.0 * 1024.0), "3.0 MiB/s");
    }

    #[test]
    fn get_args_parse() {
        let cli = Cli::try_parse_from([
            "ircdcc", "get", "3232235786", "40123", "1024", "a b.txt", "--dir", "/tmp/x",
        ])
        .unwrap();
        let Command::Get(args) = cli.command else {
            panic!("expected get");
        };
        assert_eq!(args.port, 40123);
        assert_eq!(args.size, 1024);
        assert_eq!(args.file_name, "a b.txt");
        assert_eq!(args.dir, Some(PathBuf::from("/tmp/x")));
    }
}
