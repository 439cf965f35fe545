//! `ircdcc get`

use std::net::Ipv4Addr;
use std::sync::Arc;

use anyhow::Result;
use ircdcc_transfer::{DccReceiver, ReceiveOffer, TransferObserver};

use super::{GetArgs, LogObserver, finish};
use crate::config::CliConfig;

pub async fn run(args: GetArgs, config: CliConfig) -> Result<()> {
    let offer = ReceiveOffer {
        uid: 1,
        peer_nick: args.nick,
        host: offer_host(&args.host),
        port: args.port,
        size: args.size,
        path: args.dir.unwrap_or(config.download_dir),
        file_name: args.file_name,
    };

    let receiver = DccReceiver::new(offer, config.transfer)?;
    let observer: Arc<dyn TransferObserver> = Arc::new(LogObserver);
    receiver.set_observer(&observer);
    receiver.open()?;

    finish(&receiver.handle(), receiver.wait()).await?;
    println!(
        "{}",
        receiver
            .handle()
            .path()
            .join(receiver.download_file_name())
            .display()
    );
    Ok(())
}

/// Offers carry IPv4 hosts as a bare 32-bit integer; anything else is
/// passed through to the resolver.
fn offer_host(host: &str) -> String {
    match host.parse::<u32>() {
        Ok(n) => Ipv4Addr::from(n).to_string(),
        Err(_) => host.to_string(),
    }
}
