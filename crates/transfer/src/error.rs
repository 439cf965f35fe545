//! Error types for DCC transfers.

/// Errors produced by a transfer session.
///
/// [`AlreadyOpened`](Self::AlreadyOpened), [`Closed`](Self::Closed) and
/// [`InvalidFileName`](Self::InvalidFileName) are returned to the caller and
/// leave the session untouched. Everything else is terminal: it is recorded
/// on the session as its last error and reported once through `on_error`.
/// The variants carry rendered messages so the recorded error can be cloned
/// out to observers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("could not determine local address")]
    AddressResolution,

    #[error("failed to bind listener: {0}")]
    Bind(String),

    #[error("failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("socket error: {0}")]
    Socket(String),

    #[error("file I/O error: {0}")]
    FileIo(String),

    #[error("peer closed after {transferred} of {expected} bytes")]
    SizeMismatch { transferred: u64, expected: u64 },

    #[error("session already opened")]
    AlreadyOpened,

    #[error("session is closed")]
    Closed,

    #[error("invalid file name: {0}")]
    InvalidFileName(String),
}

impl TransferError {
    pub(crate) fn socket(err: std::io::Error) -> Self {
        Self::Socket(err.to_string())
    }

    pub(crate) fn file(err: std::io::Error) -> Self {
        Self::FileIo(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_mismatch_message_names_both_counts() {
        let err = TransferError::SizeMismatch {
            transferred: 512,
            expected: 1024,
        };
        assert_eq!(err.to_string(), "peer closed after 512 of 1024 bytes");
    }

    #[test]
    fn io_helpers_keep_the_cause() {
        let err = TransferError::socket(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        assert_eq!(err, TransferError::Socket("reset by peer".into()));

        let err = TransferError::file(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(matches!(err, TransferError::FileIo(ref m) if m == "denied"));
    }
}
