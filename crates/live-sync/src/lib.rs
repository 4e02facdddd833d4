//! HomeLedger Live Sync - real-time multi-tab synchronization client.
//!
//! Subscribes to the server's change event stream and keeps every open tab's
//! view of the household ledger fresh. Incoming change notifications are
//! filtered for self-echoes (edits this tab made are not replayed back into
//! it), coalesced per entity kind over a short debounce window, and routed
//! either to a named refresh handler or to a generic change bus. The
//! connection lifecycle handles exponential-backoff reconnection and
//! tab-visibility suspend/resume, and a small notice store surfaces
//! "collection updated" toasts without coupling to any render cycle.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use homeledger_live_sync::{
//!     generate_tab_id, RefreshHandlers, SseChangeFeed, SyncClient, SyncOptions,
//! };
//!
//! let feed = Arc::new(SseChangeFeed::new("https://ledger.example/api/events/stream")?);
//! let mut options = SyncOptions::new(generate_tab_id());
//! options.handlers = RefreshHandlers {
//!     expenses: Some(Arc::new(|| { /* reload the expense list */ })),
//!     ..RefreshHandlers::default()
//! };
//!
//! let client = SyncClient::spawn(feed, options);
//! let status = client.status();
//! ```

mod bus;
mod client;
mod error;
mod feed;
mod notices;
mod router;
mod types;

pub use bus::{ChangeBus, ChangeNotice};
pub use client::{ReconnectHook, SyncClient, SyncOptions};
pub use error::{Result, SyncError};
pub use feed::{ChangeFeed, FeedError, FeedEvent, FeedStream, SseChangeFeed};
pub use notices::{Notice, NoticeStore, NoticeSubscription};
pub use types::{
    generate_tab_id, ChangeNotification, ConnectionStatus, ContextSlot, EntityKind, RefreshFn,
    RefreshHandlers, Route,
};
