//! Connection manager for the live change feed.
//!
//! A spawned actor task owns the stream connection, the reconnect backoff,
//! and the per-entity debounce deadlines. The [`SyncClient`] handle exposes
//! status, visibility control, and subscriptions to the embedding app.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::bus::{ChangeBus, ChangeNotice};
use crate::feed::{ChangeFeed, FeedError, FeedEvent, FeedStream};
use crate::notices::NoticeStore;
use crate::router;
use crate::types::{
    ChangeNotification, ConnectionStatus, ContextSlot, EntityKind, RefreshHandlers,
};

/// Coalescing window for bursts of same-entity notifications.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// First reconnect delay; doubles per failed attempt.
const BACKOFF_BASE: Duration = Duration::from_millis(3000);

/// Upper bound on the reconnect delay.
const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Capacity of the broadcast change bus.
const CHANGE_BUS_CAPACITY: usize = 64;

/// Hook invoked once per reconnection, never on the initial open.
pub type ReconnectHook = Arc<dyn Fn() + Send + Sync>;

/// Configuration for [`SyncClient::spawn`].
pub struct SyncOptions {
    /// Stable identity of this tab/client instance. Notifications carrying
    /// the same origin are dropped as self-echoes.
    pub tab_id: String,
    /// Initial refresh handler set; swappable later via
    /// [`SyncClient::set_handlers`].
    pub handlers: RefreshHandlers,
    /// Invoked exactly once per reconnection.
    pub on_reconnect: Option<ReconnectHook>,
}

impl SyncOptions {
    pub fn new(tab_id: impl Into<String>) -> Self {
        Self {
            tab_id: tab_id.into(),
            handlers: RefreshHandlers::default(),
            on_reconnect: None,
        }
    }
}

enum Command {
    Suspend,
    Resume,
    Shutdown,
}

/// Handle to a running sync client.
///
/// Dropping the handle stops the manager task; [`shutdown`](Self::shutdown)
/// does the same but waits for the task to finish.
pub struct SyncClient {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    handlers: Arc<RwLock<RefreshHandlers>>,
    notices: NoticeStore,
    changes: ChangeBus,
    task: JoinHandle<()>,
}

impl SyncClient {
    /// Spawns the connection manager over `feed` and connects immediately.
    pub fn spawn(feed: Arc<dyn ChangeFeed>, options: SyncOptions) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let handlers = Arc::new(RwLock::new(options.handlers));
        let notices = NoticeStore::new();
        let changes = ChangeBus::new(CHANGE_BUS_CAPACITY);

        let manager = ConnectionManager {
            feed,
            tab_id: options.tab_id,
            on_reconnect: options.on_reconnect,
            handlers: handlers.clone(),
            notices: notices.clone(),
            changes: changes.clone(),
            status: status_tx,
            commands: command_rx,
            stream: None,
            reconnect_at: None,
            attempts: 0,
            reconnecting: false,
            suspended: false,
            debounce: HashMap::new(),
        };
        let task = tokio::spawn(manager.run());

        Self {
            commands: command_tx,
            status: status_rx,
            handlers,
            notices,
            changes,
            task,
        }
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Watch channel over status transitions, for connection indicators.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Replaces the refresh handler set. Dispatch reads the set at call
    /// time, so the new closures take effect immediately.
    pub fn set_handlers(&self, handlers: RefreshHandlers) {
        *self.handlers.write().unwrap() = handlers;
    }

    /// Store of transient "collection updated" notices.
    pub fn notices(&self) -> &NoticeStore {
        &self.notices
    }

    /// Subscribes to broadcast-kind change notices.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ChangeNotice> {
        self.changes.subscribe()
    }

    /// The tab went hidden: hard-stop the connection and any pending
    /// reconnect.
    pub fn suspend(&self) {
        let _ = self.commands.send(Command::Suspend);
    }

    /// The tab became visible again: reconnect immediately, with the backoff
    /// counter reset.
    pub fn resume(&self) {
        let _ = self.commands.send(Command::Resume);
    }

    /// Stops the manager and waits for its task to finish. The stream, the
    /// reconnect timer, and all pending debounce dispatches die with it.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        let _ = self.task.await;
    }
}

/// Reconnect delay for a 1-based attempt number: 3s, 6s, 12s, 24s, then
/// capped at 30s.
fn reconnect_delay(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    let millis = (BACKOFF_BASE.as_millis() as u64)
        .saturating_mul(factor)
        .min(BACKOFF_CAP.as_millis() as u64);
    Duration::from_millis(millis)
}

struct ConnectionManager {
    feed: Arc<dyn ChangeFeed>,
    tab_id: String,
    on_reconnect: Option<ReconnectHook>,
    handlers: Arc<RwLock<RefreshHandlers>>,
    notices: NoticeStore,
    changes: ChangeBus,
    status: watch::Sender<ConnectionStatus>,
    commands: mpsc::UnboundedReceiver<Command>,

    /// The single active stream. At most one exists at any instant.
    stream: Option<FeedStream>,
    /// Deadline of the pending backoff reconnect, if one is scheduled.
    reconnect_at: Option<Instant>,
    /// Consecutive failed attempts since the last successful open.
    attempts: u32,
    /// Whether the next open follows a disconnect (error- or
    /// visibility-driven) rather than being the initial mount connection.
    reconnecting: bool,
    suspended: bool,
    /// Pending dispatch deadline per entity kind; insert replaces, so a
    /// burst coalesces into the last writer's deadline.
    debounce: HashMap<EntityKind, Instant>,
}

impl ConnectionManager {
    async fn run(mut self) {
        self.open_stream().await;

        loop {
            let reconnect_at = self.reconnect_at;
            let next_dispatch = self.debounce.values().min().copied();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Suspend) => self.handle_suspend(),
                    Some(Command::Resume) => self.handle_resume().await,
                    Some(Command::Shutdown) | None => break,
                },
                event = next_event(&mut self.stream) => {
                    self.handle_feed_event(event);
                }
                _ = sleep_until_opt(reconnect_at) => {
                    self.reconnect_at = None;
                    self.open_stream().await;
                }
                _ = sleep_until_opt(next_dispatch) => {
                    self.flush_due();
                }
            }
        }

        debug!("sync client stopped");
    }

    async fn open_stream(&mut self) {
        self.set_status(ConnectionStatus::Connecting);
        self.stream = Some(self.feed.open().await);
    }

    fn handle_feed_event(&mut self, event: Option<Result<FeedEvent, FeedError>>) {
        match event {
            Some(Ok(FeedEvent::Opened)) => self.handle_open(),
            Some(Ok(FeedEvent::Message(data))) => self.handle_message(&data),
            Some(Err(err)) => {
                warn!("change feed error: {err}");
                self.handle_stream_error();
            }
            None => {
                warn!("change feed ended unexpectedly");
                self.handle_stream_error();
            }
        }
    }

    fn handle_open(&mut self) {
        info!("change feed connected");
        self.attempts = 0;
        self.set_status(ConnectionStatus::Connected);

        if self.reconnecting {
            self.reconnecting = false;
            if let Some(hook) = &self.on_reconnect {
                hook();
            }
            self.full_refresh();
        }
    }

    fn handle_message(&mut self, data: &str) {
        let notification = match ChangeNotification::parse(data) {
            Ok(notification) => notification,
            Err(err) => {
                debug!("discarding malformed notification: {err}");
                return;
            }
        };

        // Self-echo filter: edits made by this tab are not replayed into it.
        if notification.origin_tab_id == self.tab_id {
            debug!("suppressing self-originated {} change", notification.entity_type);
            return;
        }

        let Some(kind) = EntityKind::from_tag(&notification.entity_type) else {
            debug!("ignoring unrecognized entity type {:?}", notification.entity_type);
            return;
        };

        // Last write wins per entity kind.
        self.debounce.insert(kind, Instant::now() + DEBOUNCE_WINDOW);
    }

    fn handle_stream_error(&mut self) {
        self.stream = None;
        self.reconnecting = true;
        self.attempts += 1;
        self.set_status(ConnectionStatus::Disconnected);

        let delay = reconnect_delay(self.attempts);
        info!(
            "change feed disconnected; retrying in {delay:?} (attempt {})",
            self.attempts
        );
        self.reconnect_at = Some(Instant::now() + delay);
    }

    fn handle_suspend(&mut self) {
        if self.suspended {
            return;
        }
        info!("change feed suspended (tab hidden)");
        self.suspended = true;
        self.stream = None;
        self.reconnect_at = None;
        self.reconnecting = true;
        self.set_status(ConnectionStatus::Disconnected);
    }

    async fn handle_resume(&mut self) {
        if !self.suspended {
            return;
        }
        info!("change feed resuming (tab visible)");
        self.suspended = false;
        self.attempts = 0;
        self.open_stream().await;
    }

    /// Dispatches every entity kind whose debounce window has elapsed.
    fn flush_due(&mut self) {
        let now = Instant::now();
        let due: Vec<EntityKind> = self
            .debounce
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(kind, _)| *kind)
            .collect();

        for kind in due {
            self.debounce.remove(&kind);
            router::dispatch(kind, &self.handlers, &self.changes);
            self.notices.push(kind);
        }
    }

    /// Refreshes every collection after a coverage gap: all four context
    /// handlers plus all four broadcast kinds, with no notices.
    fn full_refresh(&self) {
        debug!("full refresh after reconnect");
        let handlers = self.handlers.read().unwrap().clone();
        for slot in ContextSlot::ALL {
            if let Some(refresh) = handlers.slot(slot) {
                refresh();
            }
        }
        for kind in EntityKind::BROADCAST {
            self.changes.publish(ChangeNotice { entity_type: kind });
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
    }
}

/// Resolves to the next stream item, or never if no stream is active.
async fn next_event(stream: &mut Option<FeedStream>) -> Option<Result<FeedEvent, FeedError>> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

/// Sleeps until `deadline`, or never if none is set.
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
