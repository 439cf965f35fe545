//! DCC SEND, offering side.
//!
//! Binds a listener (ephemeral port or the configured range), accepts a
//! single peer, and streams the source file. The receiver's cumulative acks
//! are drained on a side task; after the last byte the write half is shut
//! down and the sender waits for the final ack or the peer's EOF before
//! reporting completion, so the connection ends with a FIN rather than a
//! reset.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::session::{SessionCore, SessionInit, TransferEvent};
use crate::wire::{ack_value, read_ack};
use crate::{
    TransferConfig, TransferError, TransferHandle, TransferObserver, TransferRole, TransferStatus,
};

/// How long a failed write waits for the ack reader to see the peer's close.
const PEER_VERDICT_WAIT: Duration = Duration::from_secs(1);

/// What the ack reader has seen from the peer so far.
#[derive(Debug, Clone, Default)]
struct PeerAcks {
    last: Option<u32>,
    closed: bool,
    failed: Option<String>,
}

/// Offering side of a DCC SEND.
pub struct DccSender {
    core: Arc<SessionCore>,
}

impl DccSender {
    /// Prepares to send `full_file_name` to `peer_nick`.
    ///
    /// The size advertised in the offer is taken from the file's metadata
    /// now; fails with [`TransferError::FileIo`] if it is not a readable
    /// regular file.
    pub fn new(
        uid: u32,
        peer_nick: impl Into<String>,
        full_file_name: impl Into<PathBuf>,
        config: TransferConfig,
    ) -> Result<Self, TransferError> {
        let full_file_name = full_file_name.into();
        let metadata = std::fs::metadata(&full_file_name).map_err(TransferError::file)?;
        if !metadata.is_file() {
            return Err(TransferError::FileIo(format!(
                "not a regular file: {}",
                full_file_name.display()
            )));
        }
        let file_name = full_file_name
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                TransferError::InvalidFileName(full_file_name.display().to_string())
            })?;

        let core = SessionCore::new(
            SessionInit {
                uid,
                peer_nick: peer_nick.into(),
                role: TransferRole::Sender,
                host: config.listen_address.to_string(),
                port: 0,
                size: metadata.len(),
                path: full_file_name,
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

    /// Binds the listener and starts waiting for the peer.
    ///
    /// Returns the port to put in the offer. Must be called from within a
    /// Tokio runtime. A bind failure is also recorded on the session.
    pub fn open(&self) -> Result<u16, TransferError> {
        self.core.begin_open()?;

        let listener = match bind_listener(self.core.config()) {
            Ok(listener) => listener,
            Err(e) => {
                self.core.fail(e.clone());
                return Err(e);
            }
        };
        let port = match listener.local_addr() {
            Ok(addr) => addr.port(),
            Err(e) => {
                let e = TransferError::Bind(e.to_string());
                self.core.fail(e.clone());
                return Err(e);
            }
        };

        self.core.set_port(port);
        if !self
            .core
            .transition(TransferStatus::Listening, Some(TransferEvent::Listen))
        {
            return Err(TransferError::Closed);
        }
        info!(
            uid = self.core.uid(),
            peer = %self.core.peer_nick(),
            port,
            size = self.core.size(),
            "DCC send listening"
        );

        self.core.spawn_io(serve(Arc::clone(&self.core), listener));
        Ok(port)
    }

    /// Cancels the transfer and releases the listener, socket and file.
    pub fn close(&self) {
        self.core.close();
    }

    /// Samples the rate and enforces the accept/stall timeouts.
    pub fn on_tick(&self) {
        self.core.on_tick();
    }

    /// Fails the session because no advertisable local address exists.
    ///
    /// Callers use this when [`local_address`](crate::local_address) fails
    /// after `open`, since the offer cannot be sent without it.
    pub fn set_address_error(&self) {
        self.core.fail(TransferError::AddressResolution);
    }

    /// Waits until the transfer task ends and returns the final status.
    pub async fn wait(&self) -> TransferStatus {
        self.core.wait().await
    }

    /// Returns a read handle onto this session.
    pub fn handle(&self) -> TransferHandle {
        TransferHandle(Arc::clone(&self.core))
    }

    /// Bound port (0 before `open`).
    pub fn port(&self) -> u16 {
        self.core.port()
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

    pub fn full_file_name(&self) -> &Path {
        self.core.path()
    }
}

impl Drop for DccSender {
    fn drop(&mut self) {
        self.core.close();
    }
}

/// Binds the first free port of the configured range, or an ephemeral one.
fn bind_listener(config: &TransferConfig) -> Result<TcpListener, TransferError> {
    let ports: Vec<u16> = match config.port_range() {
        Some(range) => range.collect(),
        None => vec![0],
    };

    let mut last_err = None;
    for port in ports {
        let addr = SocketAddr::new(config.listen_address, port);
        match bind_port(addr) {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                debug!(%addr, error = %e, "port unavailable");
                last_err = Some(e);
            }
        }
    }

    Err(TransferError::Bind(
        last_err.map_or_else(|| "no ports to try".into(), |e| e.to_string()),
    ))
}

fn bind_port(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    #[cfg(unix)]
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    // One peer per offer.
    socket.listen(1)?;
    socket.set_nonblocking(true)?;
    TcpListener::from_std(socket.into())
}

/// Accepts the peer and streams the file.
async fn serve(core: Arc<SessionCore>, listener: TcpListener) -> Result<(), TransferError> {
    let local = format!("{}:{}", core.host(), core.port());
    let (stream, addr) = listener.accept().await.map_err(|e| TransferError::Connect {
        addr: local,
        reason: e.to_string(),
    })?;

    // Dropping the listener refuses any further connection for this offer.
    drop(listener);

    if !core.transition(TransferStatus::Connected, Some(TransferEvent::Connect)) {
        return Ok(());
    }
    info!(uid = core.uid(), %addr, "DCC send peer connected");
    let _ = stream.set_nodelay(true);

    let size = core.size();
    let (reader, mut writer) = stream.into_split();

    if size == 0 {
        let _ = writer.shutdown().await;
        core.transition(TransferStatus::Complete, Some(TransferEvent::Complete));
        info!(uid = core.uid(), "DCC send complete (empty file)");
        return Ok(());
    }

    let mut file = tokio::fs::File::open(core.path())
        .await
        .map_err(TransferError::file)?;
    if !core.transition(TransferStatus::Transferring, None) {
        return Ok(());
    }

    let mut acks = spawn_ack_reader(reader, core.cancel_token().clone());
    let mut buf = vec![0u8; core.config().buffer_size()];
    let mut sent: u64 = 0;

    while sent < size {
        let to_read = (size - sent).min(buf.len() as u64) as usize;
        let n = file
            .read(&mut buf[..to_read])
            .await
            .map_err(TransferError::file)?;
        if n == 0 {
            return Err(TransferError::FileIo(format!(
                "source file ended after {sent} of {size} bytes"
            )));
        }

        if let Err(e) = writer.write_all(&buf[..n]).await {
            return Err(peer_failure(&mut acks, sent, size, e).await);
        }
        sent = core.add_progress(n as u64);
        debug!(uid = core.uid(), bytes = sent, "chunk sent");
    }

    if let Err(e) = writer.shutdown().await {
        return Err(peer_failure(&mut acks, sent, size, e).await);
    }

    await_final_ack(&core, &mut acks, size).await;
    core.transition(TransferStatus::Complete, Some(TransferEvent::Complete));
    info!(uid = core.uid(), bytes = sent, "DCC send complete");
    Ok(())
}

/// Maps a write failure once the ack reader has seen how the peer left:
/// SizeMismatch after a clean close (EOF), Socket for a reset or anything
/// undecided after [`PEER_VERDICT_WAIT`].
async fn peer_failure(
    acks: &mut watch::Receiver<PeerAcks>,
    sent: u64,
    size: u64,
    err: std::io::Error,
) -> TransferError {
    let seen_closed = {
        let verdict = tokio::time::timeout(
            PEER_VERDICT_WAIT,
            acks.wait_for(|a| a.closed || a.failed.is_some()),
        )
        .await;
        match verdict {
            Ok(Ok(seen)) => Some(seen.closed),
            _ => None,
        }
    };

    if seen_closed.unwrap_or_else(|| acks.borrow().closed) {
        TransferError::SizeMismatch {
            transferred: sent,
            expected: size,
        }
    } else {
        TransferError::socket(err)
    }
}

/// Drains the peer's acks until EOF, error, or cancellation.
fn spawn_ack_reader(
    mut reader: OwnedReadHalf,
    cancel: CancellationToken,
) -> watch::Receiver<PeerAcks> {
    let (tx, rx) = watch::channel(PeerAcks::default());

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = read_ack(&mut reader) => match result {
                    Ok(Some(ack)) => tx.send_modify(|a| a.last = Some(ack)),
                    Ok(None) => {
                        tx.send_modify(|a| a.closed = true);
                        break;
                    }
                    Err(e) => {
                        tx.send_modify(|a| a.failed = Some(e.to_string()));
                        break;
                    }
                },
            }
        }
    });

    rx
}

/// Waits (bounded by `completion_grace`) for the ack covering `size` or
/// the peer's close. Every byte is already written, so a missing ack only
/// warrants a warning.
async fn await_final_ack(core: &SessionCore, acks: &mut watch::Receiver<PeerAcks>, size: u64) {
    let target = ack_value(size);
    let wait = async {
        loop {
            {
                let seen = acks.borrow_and_update();
                if seen.last == Some(target) || seen.closed || seen.failed.is_some() {
                    return seen.clone();
                }
            }
            if acks.changed().await.is_err() {
                return acks.borrow().clone();
            }
        }
    };

    match tokio::time::timeout(core.config().completion_grace(), wait).await {
        Ok(seen) => {
            if let Some(reason) = seen.failed {
                debug!(uid = core.uid(), %reason, "peer dropped after final byte");
            } else if seen.last != Some(target) {
                debug!(uid = core.uid(), last_ack = ?seen.last, "peer closed without final ack");
            }
        }
        Err(_) => warn!(uid = core.uid(), "no final acknowledgement from peer"),
    }
}
