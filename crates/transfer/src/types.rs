use serde::{Deserialize, Serialize};

/// Which side of the DCC SEND a session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferRole {
    /// Listens for the peer and streams a local file out.
    #[serde(rename = "sender")]
    Sender,
    /// Dials the peer from an offer and writes the stream to disk.
    #[serde(rename = "receiver")]
    Receiver,
}

/// Current state of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "listening")]
    Listening,
    #[serde(rename = "connecting")]
    Connecting,
    #[serde(rename = "connected")]
    Connected,
    #[serde(rename = "transferring")]
    Transferring,
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "closed")]
    Closed,
    #[serde(rename = "error")]
    Error,
}

impl TransferStatus {
    /// Returns `true` for states no transition leaves.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Closed | Self::Error)
    }

    /// Returns `true` if the session may move from `self` to `next`.
    ///
    /// Closed and Error are reachable from every live state; the rest
    /// follows the listen/connect -> connected -> transferring -> complete
    /// chain. A zero-byte transfer may complete straight from Connected.
    pub fn can_transition_to(self, next: TransferStatus) -> bool {
        use TransferStatus::*;

        if self.is_terminal() {
            return false;
        }
        match next {
            Closed | Error => true,
            Listening | Connecting => self == Idle,
            Connected => matches!(self, Listening | Connecting),
            Transferring => self == Connected,
            Complete => matches!(self, Connected | Transferring),
            Idle => false,
        }
    }
}

/// Point-in-time view of a transfer, for display or IPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    pub uid: u32,
    pub peer_nick: String,
    pub role: TransferRole,
    pub status: TransferStatus,
    pub file_name: String,
    pub size: u64,
    pub processed_size: u64,
    /// Bytes/second over the rate window.
    pub speed: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl TransferProgress {
    /// Returns the transfer progress as a percentage (0-100).
    ///
    /// A zero-byte transfer reports 100 once complete and 0 before.
    pub fn percentage(&self) -> f64 {
        if self.size == 0 {
            return if self.status == TransferStatus::Complete {
                100.0
            } else {
                0.0
            };
        }
        self.processed_size as f64 / self.size as f64 * 100.0
    }
}
