//! State shared by both transfer roles.
//!
//! A [`SessionCore`] owns the status machine, counters and rate sampler.
//! The socket and file handle live only inside the role's I/O task; ending
//! that task (completion, failure, or cancellation through the session's
//! token) is what releases them.
//!
//! Observer notifications are queued on an unbounded channel while the
//! state lock is held and drained by a per-session dispatcher task. Because
//! queueing and terminal transitions are serialised by the same lock,
//! nothing is queued after the terminal notification. The terminal
//! notification itself is held back until the I/O task has ended, so the
//! observer never sees it while the file is still being written.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::rate::RateSampler;
use crate::types::TransferProgress;
use crate::{TransferConfig, TransferError, TransferObserver, TransferRole, TransferStatus};

/// Notification queued for the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransferEvent {
    Open,
    Listen,
    Connect,
    Progress,
    Close,
    Error,
    Complete,
}

impl TransferEvent {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Close | Self::Error | Self::Complete)
    }

    fn deliver(self, observer: &dyn TransferObserver, transfer: &TransferHandle) {
        match self {
            Self::Open => observer.on_open(transfer),
            Self::Listen => observer.on_listen(transfer),
            Self::Connect => observer.on_connect(transfer),
            Self::Progress => observer.on_progress(transfer),
            Self::Close => observer.on_close(transfer),
            Self::Error => observer.on_error(transfer),
            Self::Complete => observer.on_complete(transfer),
        }
    }
}

/// Identity of a session, fixed at construction.
#[derive(Debug, Clone)]
pub(crate) struct SessionInit {
    pub uid: u32,
    pub peer_nick: String,
    pub role: TransferRole,
    pub host: String,
    pub port: u16,
    pub size: u64,
    /// Receiver: destination directory. Sender: source file path.
    pub path: PathBuf,
    pub file_name: String,
}

struct SessionState {
    host: String,
    port: u16,
    size: u64,
    processed_size: u64,
    status: TransferStatus,
    error: Option<TransferError>,
    download_file_name: String,
    rate: RateSampler,
    status_since: Instant,
    last_progress_at: Instant,
    #[cfg(test)]
    history: Vec<TransferStatus>,
}

pub(crate) struct SessionCore {
    uid: u32,
    peer_nick: String,
    role: TransferRole,
    path: PathBuf,
    file_name: String,
    config: TransferConfig,

    state: Mutex<SessionState>,
    observer: RwLock<Option<Weak<dyn TransferObserver>>>,
    events: mpsc::UnboundedSender<TransferEvent>,
    pending_events: Mutex<Option<mpsc::UnboundedReceiver<TransferEvent>>>,

    cancel: CancellationToken,
    /// Cancelled once the I/O task has returned (or panicked).
    io_done: CancellationToken,
    io_spawned: AtomicBool,
    opened: AtomicBool,
    close_requested: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionCore {
    pub(crate) fn new(init: SessionInit, config: TransferConfig) -> Arc<Self> {
        let (events, pending) = mpsc::unbounded_channel();
        let now = Instant::now();

        Arc::new(Self {
            uid: init.uid,
            peer_nick: init.peer_nick,
            role: init.role,
            path: init.path,
            file_name: init.file_name,
            state: Mutex::new(SessionState {
                host: init.host,
                port: init.port,
                size: init.size,
                processed_size: 0,
                status: TransferStatus::Idle,
                error: None,
                download_file_name: String::new(),
                rate: RateSampler::new(config.rate_window()),
                status_since: now,
                last_progress_at: now,
                #[cfg(test)]
                history: vec![TransferStatus::Idle],
            }),
            config,
            observer: RwLock::new(None),
            events,
            pending_events: Mutex::new(Some(pending)),
            cancel: CancellationToken::new(),
            io_done: CancellationToken::new(),
            io_spawned: AtomicBool::new(false),
            opened: AtomicBool::new(false),
            close_requested: AtomicBool::new(false),
            task: Mutex::new(None),
        })
    }

    pub(crate) fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn set_observer(&self, observer: Weak<dyn TransferObserver>) {
        *self.observer.write().unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    fn observer(&self) -> Option<Arc<dyn TransferObserver>> {
        self.observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    // -- lifecycle ----------------------------------------------------------

    /// Claims the single `open` for this session.
    ///
    /// Starts the dispatcher and, if configured, the tick timer.
    pub(crate) fn begin_open(self: &Arc<Self>) -> Result<(), TransferError> {
        if lock(&self.state).status.is_terminal() {
            return Err(TransferError::Closed);
        }
        if self.opened.swap(true, Ordering::SeqCst) {
            return Err(TransferError::AlreadyOpened);
        }

        self.start_dispatcher();
        if self.config.auto_tick {
            self.start_ticker();
        }
        Ok(())
    }

    /// Runs the role's I/O future as the session task.
    ///
    /// An `Err` fails the session. Cancellation drops the future, and with
    /// it the socket and file.
    pub(crate) fn spawn_io<F>(self: &Arc<Self>, io: F)
    where
        F: Future<Output = Result<(), TransferError>> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let uid = self.uid;
        self.spawn_task(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(uid, "transfer task cancelled");
                    Ok(())
                }
                result = io => result,
            }
        });
    }

    /// Like [`spawn_io`](Self::spawn_io), but `io` watches the session token
    /// itself and is never dropped mid-flight, so it can flush what it holds
    /// before returning.
    pub(crate) fn spawn_io_to_completion<F>(self: &Arc<Self>, io: F)
    where
        F: Future<Output = Result<(), TransferError>> + Send + 'static,
    {
        self.spawn_task(io);
    }

    fn spawn_task<F>(self: &Arc<Self>, io: F)
    where
        F: Future<Output = Result<(), TransferError>> + Send + 'static,
    {
        self.io_spawned.store(true, Ordering::SeqCst);
        let core = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let _done = core.io_done.clone().drop_guard();
            if let Err(e) = io.await {
                core.fail(e);
            }
        });
        *lock(&self.task) = Some(handle);
    }

    /// Waits for the I/O task to finish and returns the final status.
    pub(crate) async fn wait(&self) -> TransferStatus {
        let handle = lock(&self.task).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(uid = self.uid, error = %e, "transfer task panicked");
            }
        }
        self.status()
    }

    /// Cancels the session. Safe to call repeatedly and from any state.
    pub(crate) fn close(self: &Arc<Self>) {
        if self.close_requested.swap(true, Ordering::SeqCst) {
            return;
        }

        if self.transition(TransferStatus::Closed, Some(TransferEvent::Close)) {
            info!(uid = self.uid, peer = %self.peer_nick, "transfer closed");
            // A session closed before `open` still reports the close.
            self.start_dispatcher();
        }
        self.cancel.cancel();
    }

    /// Records a terminal error. Returns `false` if the session had already
    /// ended.
    pub(crate) fn fail(&self, err: TransferError) -> bool {
        {
            let mut s = lock(&self.state);
            if !s.status.can_transition_to(TransferStatus::Error) {
                debug!(uid = self.uid, error = %err, "error after session ended, ignored");
                return false;
            }
            warn!(
                uid = self.uid,
                peer = %self.peer_nick,
                bytes = s.processed_size,
                error = %err,
                "transfer failed"
            );
            s.status = TransferStatus::Error;
            #[cfg(test)]
            s.history.push(TransferStatus::Error);
            s.status_since = Instant::now();
            s.error = Some(err);
            let _ = self.events.send(TransferEvent::Error);
        }
        self.cancel.cancel();
        true
    }

    /// Moves to `next`, queueing `event` on success.
    ///
    /// Terminal transitions also cancel the session token so every task
    /// tied to it winds down.
    pub(crate) fn transition(&self, next: TransferStatus, event: Option<TransferEvent>) -> bool {
        {
            let mut s = lock(&self.state);
            if !s.status.can_transition_to(next) {
                debug!(uid = self.uid, from = ?s.status, to = ?next, "transition rejected");
                return false;
            }
            debug!(uid = self.uid, from = ?s.status, to = ?next, "status change");

            let now = Instant::now();
            s.status = next;
            #[cfg(test)]
            s.history.push(next);
            s.status_since = now;
            if next == TransferStatus::Transferring {
                let processed = s.processed_size;
                s.last_progress_at = now;
                s.rate.reset();
                s.rate.record(now, processed);
            }
            if let Some(event) = event {
                let _ = self.events.send(event);
            }
        }
        if next.is_terminal() {
            self.cancel.cancel();
        }
        true
    }

    // -- counters -----------------------------------------------------------

    /// Adds `bytes` to the processed count.
    pub(crate) fn add_progress(&self, bytes: u64) -> u64 {
        let mut s = lock(&self.state);
        s.processed_size = s.processed_size.saturating_add(bytes);
        if bytes > 0 {
            s.last_progress_at = Instant::now();
        }
        s.processed_size
    }

    pub(crate) fn set_port(&self, port: u16) {
        lock(&self.state).port = port;
    }

    pub(crate) fn set_download_file_name(&self, name: String) {
        lock(&self.state).download_file_name = name;
    }

    // -- timer --------------------------------------------------------------

    /// Periodic housekeeping: samples the rate, reports progress and
    /// enforces the accept and stall timeouts.
    pub(crate) fn on_tick(&self) {
        self.tick_at(Instant::now());
    }

    pub(crate) fn tick_at(&self, now: Instant) {
        let timed_out = {
            let mut s = lock(&self.state);
            if s.status.is_terminal() {
                return;
            }
            let processed = s.processed_size;
            s.rate.record(now, processed);

            match s.status {
                TransferStatus::Listening => self
                    .config
                    .accept_timeout()
                    .filter(|limit| now.saturating_duration_since(s.status_since) > *limit)
                    .map(|limit| TransferError::Connect {
                        addr: format!("{}:{}", s.host, s.port),
                        reason: format!("no peer connected within {}s", limit.as_secs()),
                    }),
                TransferStatus::Transferring => {
                    let stalled = self
                        .config
                        .stall_timeout()
                        .filter(|limit| now.saturating_duration_since(s.last_progress_at) > *limit);
                    if stalled.is_none() {
                        let _ = self.events.send(TransferEvent::Progress);
                    }
                    stalled.map(|limit| {
                        TransferError::Socket(format!(
                            "no data for {}s, transfer stalled",
                            limit.as_secs()
                        ))
                    })
                }
                _ => None,
            }
        };

        if let Some(err) = timed_out {
            self.fail(err);
        }
    }

    fn start_ticker(self: &Arc<Self>) {
        let core = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        let period = self.config.tick_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(core) = core.upgrade() else { break };
                        core.on_tick();
                    }
                }
            }
        });
    }

    fn start_dispatcher(self: &Arc<Self>) {
        if tokio::runtime::Handle::try_current().is_err() {
            debug!(uid = self.uid, "no runtime, observer notifications deferred");
            return;
        }
        let Some(mut rx) = lock(&self.pending_events).take() else {
            return;
        };
        let core = Arc::downgrade(self);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(core) = core.upgrade() else { break };
                if event.is_terminal() && core.io_spawned.load(Ordering::SeqCst) {
                    core.io_done.cancelled().await;
                }
                if let Some(observer) = core.observer() {
                    event.deliver(observer.as_ref(), &TransferHandle(Arc::clone(&core)));
                }
                if event.is_terminal() {
                    break;
                }
            }
        });
    }

    // -- accessors ----------------------------------------------------------

    pub(crate) fn uid(&self) -> u32 {
        self.uid
    }

    pub(crate) fn peer_nick(&self) -> &str {
        &self.peer_nick
    }

    pub(crate) fn path(&self) -> &PathBuf {
        &self.path
    }

    pub(crate) fn file_name(&self) -> &str {
        &self.file_name
    }

    pub(crate) fn status(&self) -> TransferStatus {
        lock(&self.state).status
    }

    pub(crate) fn size(&self) -> u64 {
        lock(&self.state).size
    }

    pub(crate) fn processed_size(&self) -> u64 {
        lock(&self.state).processed_size
    }

    pub(crate) fn host(&self) -> String {
        lock(&self.state).host.clone()
    }

    pub(crate) fn port(&self) -> u16 {
        lock(&self.state).port
    }

    /// Every status the session has been in, oldest first.
    #[cfg(test)]
    pub(crate) fn status_history(&self) -> Vec<TransferStatus> {
        lock(&self.state).history.clone()
    }
}

/// Cheap, cloneable read access to a running session.
///
/// Handed to observers and returned by [`DccSender::handle`](crate::DccSender::handle)
/// and [`DccReceiver::handle`](crate::DccReceiver::handle).
#[derive(Clone)]
pub struct TransferHandle(pub(crate) Arc<SessionCore>);

impl TransferHandle {
    pub fn uid(&self) -> u32 {
        self.0.uid()
    }

    pub fn peer_nick(&self) -> &str {
        self.0.peer_nick()
    }

    pub fn role(&self) -> TransferRole {
        self.0.role
    }

    /// Remote host (receiver) or local listen address (sender).
    pub fn host(&self) -> String {
        self.0.host()
    }

    /// Peer port (receiver) or the bound listen port (sender, 0 before `open`).
    pub fn port(&self) -> u16 {
        self.0.port()
    }

    /// Expected total bytes.
    pub fn size(&self) -> u64 {
        self.0.size()
    }

    /// Bytes moved so far.
    pub fn processed_size(&self) -> u64 {
        self.0.processed_size()
    }

    pub fn status(&self) -> TransferStatus {
        self.0.status()
    }

    /// Cause of the failure when `status()` is [`TransferStatus::Error`].
    pub fn error(&self) -> Option<TransferError> {
        lock(&self.0.state).error.clone()
    }

    /// Logical file name (as offered or as sent).
    pub fn file_name(&self) -> &str {
        self.0.file_name()
    }

    /// Name actually written on disk (receiver only; empty until opened).
    pub fn download_file_name(&self) -> String {
        lock(&self.0.state).download_file_name.clone()
    }

    /// Receiver: destination directory. Sender: full source path.
    pub fn path(&self) -> &PathBuf {
        self.0.path()
    }

    /// Current throughput in bytes/second.
    pub fn speed(&self) -> f64 {
        lock(&self.0.state).rate.bytes_per_second()
    }

    /// Estimated time to completion, if the speed is known.
    pub fn eta(&self) -> Option<Duration> {
        let s = lock(&self.0.state);
        s.rate.eta(s.size.saturating_sub(s.processed_size))
    }

    /// Returns a consistent snapshot of the session.
    pub fn progress(&self) -> TransferProgress {
        let s = lock(&self.0.state);
        TransferProgress {
            uid: self.0.uid,
            peer_nick: self.0.peer_nick.clone(),
            role: self.0.role,
            status: s.status,
            file_name: self.0.file_name.clone(),
            size: s.size,
            processed_size: s.processed_size,
            speed: s.rate.bytes_per_second(),
            error: s.error.as_ref().map(ToString::to_string).unwrap_or_default(),
        }
    }

    /// Cancels the session (see [`DccSender::close`](crate::DccSender::close)).
    pub fn close(&self) {
        self.0.close();
    }
}

impl std::fmt::Debug for TransferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferHandle")
            .field("uid", &self.0.uid)
            .field("role", &self.0.role)
            .field("status", &self.status())
            .field("processed_size", &self.processed_size())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Observer recording every notification as `(event, processed_size)`.
    #[derive(Default)]
    pub(crate) struct RecordingObserver {
        pub events: Mutex<Vec<(&'static str, u64)>>,
    }

    impl RecordingObserver {
        fn push(&self, name: &'static str, t: &TransferHandle) {
            self.events.lock().unwrap().push((name, t.processed_size()));
        }

        pub(crate) fn names(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().iter().map(|(n, _)| *n).collect()
        }

        pub(crate) fn count(&self, name: &str) -> usize {
            self.names().iter().filter(|n| **n == name).count()
        }

        /// Polls until `name` has been delivered.
        pub(crate) async fn wait_for(&self, name: &str) {
            for _ in 0..500 {
                if self.count(name) > 0 {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("{name} never delivered, got {:?}", self.names());
        }
    }

    impl TransferObserver for RecordingObserver {
        fn on_open(&self, t: &TransferHandle) {
            self.push("open", t);
        }
        fn on_listen(&self, t: &TransferHandle) {
            self.push("listen", t);
        }
        fn on_connect(&self, t: &TransferHandle) {
            self.push("connect", t);
        }
        fn on_progress(&self, t: &TransferHandle) {
            self.push("progress", t);
        }
        fn on_close(&self, t: &TransferHandle) {
            self.push("close", t);
        }
        fn on_error(&self, t: &TransferHandle) {
            self.push("error", t);
        }
        fn on_complete(&self, t: &TransferHandle) {
            self.push("complete", t);
        }
    }

    fn test_config() -> TransferConfig {
        TransferConfig {
            auto_tick: false,
            ..Default::default()
        }
    }

    fn core_with(config: TransferConfig) -> Arc<SessionCore> {
        SessionCore::new(
            SessionInit {
                uid: 7,
                peer_nick: "bob".into(),
                role: TransferRole::Receiver,
                host: "127.0.0.1".into(),
                port: 5000,
                size: 1000,
                path: PathBuf::from("/tmp"),
                file_name: "a.bin".into(),
            },
            config,
        )
    }

    fn observe(core: &Arc<SessionCore>) -> Arc<RecordingObserver> {
        let observer = Arc::new(RecordingObserver::default());
        let dyn_observer: Arc<dyn TransferObserver> = observer.clone();
        core.set_observer(Arc::downgrade(&dyn_observer));
        observer
    }

    #[tokio::test]
    async fn open_twice_is_rejected() {
        let core = core_with(test_config());
        core.begin_open().unwrap();
        assert_eq!(core.begin_open(), Err(TransferError::AlreadyOpened));
    }

    #[tokio::test]
    async fn open_after_close_is_rejected() {
        let core = core_with(test_config());
        core.close();
        assert_eq!(core.begin_open(), Err(TransferError::Closed));
        assert_eq!(core.status(), TransferStatus::Closed);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_notifies_once() {
        let core = core_with(test_config());
        let observer = observe(&core);
        core.begin_open().unwrap();
        assert!(core.transition(TransferStatus::Connecting, None));

        for _ in 0..3 {
            core.close();
        }
        observer.wait_for("close").await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(core.status(), TransferStatus::Closed);
        assert_eq!(observer.count("close"), 1);
        assert!(core.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn close_after_error_is_a_no_op() {
        let core = core_with(test_config());
        let observer = observe(&core);
        core.begin_open().unwrap();
        assert!(core.fail(TransferError::Socket("boom".into())));

        core.close();
        observer.wait_for("error").await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(core.status(), TransferStatus::Error);
        assert_eq!(observer.names(), vec!["error"]);
        let handle = TransferHandle(Arc::clone(&core));
        assert_eq!(handle.error(), Some(TransferError::Socket("boom".into())));
    }

    #[tokio::test]
    async fn second_failure_is_ignored() {
        let core = core_with(test_config());
        core.begin_open().unwrap();
        assert!(core.fail(TransferError::Socket("first".into())));
        assert!(!core.fail(TransferError::FileIo("second".into())));
        let handle = TransferHandle(core);
        assert_eq!(handle.error(), Some(TransferError::Socket("first".into())));
    }

    #[tokio::test]
    async fn nothing_is_delivered_after_terminal_event() {
        let core = core_with(test_config());
        let observer = observe(&core);
        core.begin_open().unwrap();
        core.transition(TransferStatus::Connecting, None);
        core.transition(TransferStatus::Connected, None);
        core.transition(TransferStatus::Transferring, Some(TransferEvent::Open));
        core.add_progress(1000);
        core.transition(TransferStatus::Complete, Some(TransferEvent::Complete));

        // Late tick and close must not produce notifications.
        core.on_tick();
        core.close();
        observer.wait_for("complete").await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(observer.names(), vec!["open", "complete"]);
        assert_eq!(core.status(), TransferStatus::Complete);
    }

    #[tokio::test]
    async fn tick_reports_progress_while_transferring() {
        let core = core_with(test_config());
        let observer = observe(&core);
        core.begin_open().unwrap();
        core.transition(TransferStatus::Connecting, None);
        core.on_tick();
        core.transition(TransferStatus::Connected, None);
        core.transition(TransferStatus::Transferring, None);
        core.add_progress(10);
        core.on_tick();
        core.add_progress(20);
        core.on_tick();

        observer.wait_for("progress").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let events = observer.events.lock().unwrap().clone();
        let progress: Vec<u64> = events
            .iter()
            .filter(|(n, _)| *n == "progress")
            .map(|(_, b)| *b)
            .collect();
        assert_eq!(progress.len(), 2);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn stalled_transfer_fails_on_tick() {
        let core = core_with(TransferConfig {
            stall_timeout: Some(5),
            ..test_config()
        });
        core.begin_open().unwrap();
        core.transition(TransferStatus::Connecting, None);
        core.transition(TransferStatus::Connected, None);
        core.transition(TransferStatus::Transferring, None);

        core.tick_at(Instant::now() + Duration::from_secs(2));
        assert_eq!(core.status(), TransferStatus::Transferring);

        core.tick_at(Instant::now() + Duration::from_secs(6));
        assert_eq!(core.status(), TransferStatus::Error);
        let handle = TransferHandle(core);
        assert!(matches!(handle.error(), Some(TransferError::Socket(_))));
    }

    #[tokio::test]
    async fn speed_is_derived_from_ticks() {
        let core = core_with(test_config());
        core.begin_open().unwrap();
        core.transition(TransferStatus::Connecting, None);
        core.transition(TransferStatus::Connected, None);
        core.transition(TransferStatus::Transferring, None);

        let t0 = Instant::now();
        core.add_progress(1000);
        core.tick_at(t0 + Duration::from_secs(1));
        core.add_progress(2000);
        core.tick_at(t0 + Duration::from_secs(2));

        let handle = TransferHandle(core);
        assert!(handle.speed() > 0.0);
        assert_eq!(handle.processed_size(), 3000);
    }

    #[test]
    fn dropped_observer_is_not_upgraded() {
        let core = core_with(test_config());
        let observer: Arc<dyn TransferObserver> = Arc::new(RecordingObserver::default());
        core.set_observer(Arc::downgrade(&observer));
        assert!(core.observer().is_some());
        drop(observer);
        assert!(core.observer().is_none());
    }

    #[test]
    fn close_without_runtime_still_closes() {
        let core = core_with(test_config());
        core.close();
        assert_eq!(core.status(), TransferStatus::Closed);
    }
}
