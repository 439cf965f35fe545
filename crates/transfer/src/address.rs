//! Local address the sender advertises in its offer.

use std::net::{IpAddr, Ipv4Addr};

use crate::{TransferConfig, TransferError};

/// Returns the address to advertise to the peer.
///
/// The configured `advertise_address` wins. Otherwise the first usable
/// local IPv4 address is used; with none, the caller should mark its
/// sender with [`set_address_error`](crate::DccSender::set_address_error).
pub fn local_address(config: &TransferConfig) -> Result<IpAddr, TransferError> {
    if let Some(addr) = config.advertise_address {
        return Ok(addr);
    }

    local_ipv4s()
        .into_iter()
        .next()
        .map(IpAddr::V4)
        .ok_or(TransferError::AddressResolution)
}

/// Returns local non-loopback IPv4 addresses, excluding link-local (169.254.x.x).
pub fn local_ipv4s() -> Vec<Ipv4Addr> {
    let Ok(interfaces) = if_addrs::get_if_addrs() else {
        tracing::warn!("failed to enumerate network interfaces");
        return Vec::new();
    };

    interfaces
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .filter_map(|iface| match iface.ip() {
            IpAddr::V4(ip) if is_advertisable(ip) => Some(ip),
            _ => None,
        })
        .collect()
}

fn is_advertisable(ip: Ipv4Addr) -> bool {
    !(ip.is_loopback() || ip.is_link_local() || ip.is_unspecified())
}
