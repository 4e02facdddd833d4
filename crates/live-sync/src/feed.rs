//! Transport seam for the server change feed.
//!
//! The connection manager consumes notifications through the [`ChangeFeed`]
//! trait so the SSE transport can be swapped for a scripted feed in tests.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest_eventsource::{Event, EventSource};
use thiserror::Error;

use crate::error::Result;

/// Connect timeout for establishing the stream. No total request timeout:
/// the stream stays open indefinitely.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Events surfaced by an open change feed connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// The stream is open; notifications follow.
    Opened,
    /// Raw data payload of one server notification.
    Message(String),
}

/// Transport-level failure of a stream connection.
///
/// Never escapes the connection manager; it reacts by scheduling a backoff
/// reconnect.
#[derive(Debug, Clone, Error)]
#[error("change feed transport error: {0}")]
pub struct FeedError(pub String);

/// One live connection to the change feed. The first `Err` item, or the
/// stream ending, means the connection is dead.
pub type FeedStream = BoxStream<'static, std::result::Result<FeedEvent, FeedError>>;

/// A source of change-feed connections.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Opens a new stream connection.
    ///
    /// Failures to connect are reported in-stream rather than as an error
    /// here, so every attempt flows through the same reconnect path.
    async fn open(&self) -> FeedStream;
}

/// Server-sent-events change feed over HTTP.
pub struct SseChangeFeed {
    client: reqwest::Client,
    url: String,
}

impl SseChangeFeed {
    /// Creates a feed reading from `url` (e.g. "https://.../api/events/stream").
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ChangeFeed for SseChangeFeed {
    async fn open(&self) -> FeedStream {
        let source = match EventSource::new(self.client.get(&self.url)) {
            Ok(source) => source,
            // A plain GET is always cloneable; if not, the failure still
            // flows through the normal reconnect path.
            Err(err) => {
                let err = FeedError(err.to_string());
                return stream::once(async move { Err(err) }).boxed();
            }
        };

        source
            .map(|item| match item {
                Ok(Event::Open) => Ok(FeedEvent::Opened),
                Ok(Event::Message(message)) => Ok(FeedEvent::Message(message.data)),
                Err(err) => Err(FeedError(err.to_string())),
            })
            .boxed()
    }
}
