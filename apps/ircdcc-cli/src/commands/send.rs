//! `ircdcc send`

use std::net::IpAddr;
use std::sync::Arc;

use anyhow::Result;
use ircdcc_transfer::{DccSender, TransferObserver, local_address};

use super::{LogObserver, SendArgs, finish};
use crate::config::CliConfig;

pub async fn run(args: SendArgs, config: CliConfig) -> Result<()> {
    let mut transfer = config.transfer;
    if let Some(port) = args.port {
        transfer.port_min = port;
        transfer.port_max = port;
    }

    let sender = DccSender::new(1, args.nick, &args.file, transfer.clone())?;
    let observer: Arc<dyn TransferObserver> = Arc::new(LogObserver);
    sender.set_observer(&observer);

    let port = sender.open()?;

    let address = match local_address(&transfer) {
        Ok(address) => address,
        Err(e) => {
            sender.set_address_error();
            return Err(e.into());
        }
    };

    println!(
        "{}",
        offer_line(sender.file_name(), address, port, sender.size())
    );

    finish(&sender.handle(), sender.wait()).await
}

/// Formats the CTCP payload announcing the file.
///
/// IPv4 addresses go out as a 32-bit integer; names with spaces are quoted.
fn offer_line(file_name: &str, address: IpAddr, port: u16, size: u64) -> String {
    let host = match address {
        IpAddr::V4(v4) => u32::from(v4).to_string(),
        IpAddr::V6(v6) => v6.to_string(),
    };
    let name = if file_name.contains(' ') {
        format!("\"{file_name}\"")
    } else {
        file_name.to_string()
    };
    format!("\x01DCC SEND {name} {host} {port} {size}\x01")
}
