//! DCC SEND transfer engine.
//!
//! A transfer is a [`DccSender`] (listens, accepts one peer, streams a local
//! file out) or a [`DccReceiver`] (dials the peer from an offer, writes the
//! stream to disk). Both share one session core holding the status state
//! machine, byte counters and the [`RateSampler`].
//!
//! Offer construction and CTCP parsing live in the calling layer; this crate
//! only moves bytes.
//!
//! # Wire format
//!
//! Raw file bytes flow sender -> receiver. The receiver answers every chunk
//! with an acknowledgement, see [`wire`].

pub mod address;
pub mod config;
pub mod error;
pub mod naming;
pub mod observer;
pub mod rate;
pub mod receiver;
pub mod sender;
mod session;
pub mod types;
pub mod wire;

pub use address::local_address;
pub use config::TransferConfig;
pub use error::TransferError;
pub use naming::sanitize_file_name;
pub use observer::TransferObserver;
pub use rate::RateSampler;
pub use receiver::{DccReceiver, ReceiveOffer};
pub use sender::DccSender;
pub use session::TransferHandle;
pub use types::{TransferProgress, TransferRole, TransferStatus};

/// Default socket/file chunk size (64 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Default interval between `on_tick` calls.
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 1;

/// Default length of the rate window.
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 5;
