//! Notification hooks for the presentation layer.

use crate::TransferHandle;

/// Receives lifecycle notifications for one or more sessions.
///
/// Callbacks run on the session's dispatcher task, in the order the engine
/// produced them, never on the caller of `open`. Every method defaults to a
/// no-op. Sessions keep only a weak reference: dropping the last `Arc` to
/// the observer silently unsubscribes it.
///
/// A callback may call back into the session (e.g. `close` from `on_error`).
pub trait TransferObserver: Send + Sync + 'static {
    /// Receiver connected and the destination file is open.
    fn on_open(&self, _transfer: &TransferHandle) {}

    /// Sender is listening; `transfer.port()` is ready for the offer.
    fn on_listen(&self, _transfer: &TransferHandle) {}

    /// Sender accepted its peer.
    fn on_connect(&self, _transfer: &TransferHandle) {}

    /// Byte counters or speed changed (delivered once per tick at most).
    fn on_progress(&self, _transfer: &TransferHandle) {}

    /// Session was closed by the caller.
    fn on_close(&self, _transfer: &TransferHandle) {}

    /// Session failed; `transfer.error()` holds the cause.
    fn on_error(&self, _transfer: &TransferHandle) {}

    /// All bytes moved.
    fn on_complete(&self, _transfer: &TransferHandle) {}
}
