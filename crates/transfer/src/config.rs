//! Transfer engine settings.
//!
//! Durations are stored as whole seconds so the struct reads naturally when
//! embedded in a TOML or JSON config file. Every field has a default, so a
//! partial (or empty) table is valid.

use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_BUFFER_SIZE, DEFAULT_RATE_WINDOW_SECS, DEFAULT_TICK_INTERVAL_SECS};

/// Settings shared by sender and receiver sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Socket/file chunk size in bytes.
    pub buffer_size: usize,

    /// Receiver dial timeout in seconds.
    pub connect_timeout: u64,

    /// Seconds a sender waits for its peer to connect (`None` = forever).
    pub accept_timeout: Option<u64>,

    /// Seconds without progress before a transfer is failed (`None` = never).
    pub stall_timeout: Option<u64>,

    /// Seconds the sender waits for the final ack or EOF after the last byte.
    pub completion_grace: u64,

    /// Seconds between ticks of the per-session timer.
    pub tick_interval: u64,

    /// Spawn a per-session timer driving `on_tick`.
    pub auto_tick: bool,

    /// Seconds of history kept by the rate sampler.
    pub rate_window: u64,

    /// Address the sender binds to.
    pub listen_address: IpAddr,

    /// First port of the sender's port range (0 = ephemeral).
    pub port_min: u16,

    /// Last port of the sender's port range (0 = same as `port_min`).
    pub port_max: u16,

    /// Address advertised in offers instead of the detected one.
    pub advertise_address: Option<IpAddr>,

    /// Receiver sends running byte-count acknowledgements.
    pub send_acks: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            connect_timeout: 30,
            accept_timeout: Some(300),
            stall_timeout: Some(120),
            completion_grace: 10,
            tick_interval: DEFAULT_TICK_INTERVAL_SECS,
            auto_tick: true,
            rate_window: DEFAULT_RATE_WINDOW_SECS,
            listen_address: IpAddr::from([0, 0, 0, 0]),
            port_min: 0,
            port_max: 0,
            advertise_address: None,
            send_acks: true,
        }
    }
}

impl TransferConfig {
    /// Chunk size, never zero.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size.max(1)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn accept_timeout(&self) -> Option<Duration> {
        self.accept_timeout.map(Duration::from_secs)
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout.map(Duration::from_secs)
    }

    pub fn completion_grace(&self) -> Duration {
        Duration::from_secs(self.completion_grace)
    }

    /// Tick period, at least one second.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval.max(1))
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window)
    }

    /// Ports the sender tries in order.
    ///
    /// `None` means "let the OS pick". A reversed range is normalised.
    pub fn port_range(&self) -> Option<RangeInclusive<u16>> {
        if self.port_min == 0 {
            return None;
        }
        let max = if self.port_max == 0 {
            self.port_min
        } else {
            self.port_max
        };
        Some(self.port_min.min(max)..=self.port_min.max(max))
    }
}
