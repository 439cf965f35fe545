//! DCC SEND, accepting side.
//!
//! Dials the host:port from the peer's offer, writes the stream into a
//! non-colliding file under the destination directory, and acknowledges
//! each chunk with the running byte count.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::naming::{create_download_file, sanitize_file_name};
use crate::session::{SessionCore, SessionInit, TransferEvent};
use crate::wire::write_ack;
use crate::{
    TransferConfig, TransferError, TransferHandle, TransferObserver, TransferRole, TransferStatus,
};

/// What the calling layer extracted from a DCC SEND offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveOffer {
    pub uid: u32,
    pub peer_nick: String,
    pub host: String,
    pub port: u16,
    /// Advertised size; 0 means unknown, the transfer then ends at EOF.
    pub size: u64,
    /// Destination directory.
    pub path: PathBuf,
    /// Name as offered by the peer.
    pub file_name: String,
}

/// Accepting side of a DCC SEND.
pub struct DccReceiver {
    core: Arc<SessionCore>,
}

impl DccReceiver {
    /// Validates the offer. The offered name is reduced to a bare file name.
    pub fn new(offer: ReceiveOffer, config: TransferConfig) -> Result<Self, TransferError> {
        let file_name = sanitize_file_name(&offer.file_name)?;
        if offer.port == 0 {
            return Err(TransferError::Connect {
                addr: format!("{}:0", offer.host),
                reason: "offer carries no port".into(),
            });
        }

        let core = SessionCore::new(
            SessionInit {
                uid: offer.uid,
                peer_nick: offer.peer_nick,
                role: TransferRole::Receiver,
                host: offer.host,
                port: offer.port,
                size: offer.size,
                path: offer.path,
                file_name,
            },
            config,
        );
        Ok(Self { core })
    }

    /// Registers the observer (held weakly).
    pub fn set_observer(&self, observer: &Arc<dyn TransferObserver>) {
        self.core.set_observer(Arc::downgrade(observer));
    }

    /// Starts dialing the peer and returns immediately.
    ///
    /// The outcome arrives as a transition to Connected (then Transferring)
    /// or Error. Must be called from within a Tokio runtime.
    pub fn open(&self) -> Result<(), TransferError> {
        self.core.begin_open()?;
        if !self.core.transition(TransferStatus::Connecting, None) {
            return Err(TransferError::Closed);
        }
        info!(
            uid = self.core.uid(),
            peer = %self.core.peer_nick(),
            host = %self.core.host(),
            port = self.core.port(),
            size = self.core.size(),
            "DCC receive connecting"
        );

        self.core.spawn_io_to_completion(receive(Arc::clone(&self.core)));
        Ok(())
    }

    /// Cancels the transfer. Whatever was written stays on disk.
    pub fn close(&self) {
        self.core.close();
    }

    /// Samples the rate and enforces the stall timeout.
    pub fn on_tick(&self) {
        self.core.on_tick();
    }

    /// Waits until the transfer task ends and returns the final status.
    pub async fn wait(&self) -> TransferStatus {
        self.core.wait().await
    }

    /// Returns a read handle onto this session.
    pub fn handle(&self) -> TransferHandle {
        TransferHandle(Arc::clone(&self.core))
    }

    pub fn status(&self) -> TransferStatus {
        self.core.status()
    }

    pub fn size(&self) -> u64 {
        self.core.size()
    }

    pub fn processed_size(&self) -> u64 {
        self.core.processed_size()
    }

    pub fn file_name(&self) -> &str {
        self.core.file_name()
    }

    /// On-disk name chosen at open (empty before the connection is up).
    pub fn download_file_name(&self) -> String {
        self.handle().download_file_name()
    }
}

impl Drop for DccReceiver {
    fn drop(&mut self) {
        self.core.close();
    }
}

async fn receive(core: Arc<SessionCore>) -> Result<(), TransferError> {
    let cancel = core.cancel_token().clone();
    let host = core.host();
    let port = core.port();
    let addr = format!("{host}:{port}");

    let connect = tokio::time::timeout(
        core.config().connect_timeout(),
        TcpStream::connect((host.as_str(), port)),
    );
    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(()),
        result = connect => match result {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(TransferError::Connect {
                    addr,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(TransferError::Connect {
                    addr,
                    reason: "connection timed out".into(),
                });
            }
        },
    };
    let _ = stream.set_nodelay(true);

    if !core.transition(TransferStatus::Connected, None) {
        return Ok(());
    }
    info!(uid = core.uid(), %addr, "DCC receive connected");

    let (mut file, download_name) = create_download_file(core.path(), core.file_name()).await?;
    if download_name != core.file_name() {
        info!(
            uid = core.uid(),
            offered = %core.file_name(),
            saved_as = %download_name,
            "destination exists, saving under a new name"
        );
    }
    core.set_download_file_name(download_name);

    if !core.transition(TransferStatus::Transferring, Some(TransferEvent::Open)) {
        return Ok(());
    }

    let copied = copy_to_file(&core, &cancel, &mut stream, &mut file).await;

    // Every exit flushes; a disk error outranks whatever stopped the copy.
    let flushed = file.flush().await.map_err(TransferError::file);
    drop(file);
    let received = match (copied, flushed) {
        (Err(e @ TransferError::FileIo(_)), _) => return Err(e),
        (_, Err(e)) => return Err(e),
        (copied, Ok(())) => match copied? {
            Some(received) => received,
            None => return Ok(()),
        },
    };

    core.transition(TransferStatus::Complete, Some(TransferEvent::Complete));
    info!(uid = core.uid(), bytes = received, "DCC receive complete");
    Ok(())
}

/// Copies the stream into `file`, acking each chunk.
///
/// Returns the byte count, or `None` if the session was cancelled.
async fn copy_to_file(
    core: &SessionCore,
    cancel: &CancellationToken,
    stream: &mut TcpStream,
    file: &mut File,
) -> Result<Option<u64>, TransferError> {
    let size = core.size();
    let send_acks = core.config().send_acks;
    let mut buf = vec![0u8; core.config().buffer_size()];
    let mut received: u64 = 0;

    loop {
        let want = if size > 0 {
            let remaining = size - received;
            if remaining == 0 {
                break;
            }
            remaining.min(buf.len() as u64) as usize
        } else {
            buf.len()
        };

        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            read = stream.read(&mut buf[..want]) => read.map_err(TransferError::socket)?,
        };
        if n == 0 {
            if size == 0 {
                debug!(uid = core.uid(), bytes = received, "peer closed, size was unknown");
                break;
            }
            return Err(TransferError::SizeMismatch {
                transferred: received,
                expected: size,
            });
        }

        file.write_all(&buf[..n]).await.map_err(TransferError::file)?;
        received = core.add_progress(n as u64);

        if send_acks {
            let acked = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                acked = write_ack(stream, received) => acked,
            };
            if let Err(e) = acked {
                // The final ack may race the sender's close.
                if size == 0 || received < size {
                    return Err(TransferError::socket(e));
                }
                debug!(uid = core.uid(), error = %e, "final ack not delivered");
            }
        }
    }

    Ok(Some(received))
}
