//! # Location Feed Connection Manager
//!
//! Owns the single streaming connection to the vehicle location feed and fans
//! its messages out to any number of subscribers.
//!
//! ## Lifecycle:
//! - The connection is created lazily by the first [`ConnectionManager::connect`]
//!   call. Later calls attach to the same multicast; there is at most one live
//!   transport per manager.
//! - The endpoint is resolved from the configured base address at connect time:
//!   `http(s)://host/base` becomes `ws(s)://host/base/sockets`.
//! - On transport error or close the manager waits a fixed delay and reconnects,
//!   forever. Subscribers never see a transport failure, only the messages that
//!   got through.
//! - A message that fails to decode (including one that is not valid UTF-8) is
//!   delivered as an `Err` item for that message alone. It does not trigger a
//!   reconnect.
//! - After [`ConnectionManager::shutdown`] the manager is spent: `connect`
//!   returns [`FeedError::ShutDown`].
//!
//! The run loop is an explicit state machine (`Connecting`, `Connected`,
//! `Retrying`) with a monotonic retry counter for observability.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::core::dispatcher::{Dispatcher, Subscription};
use crate::core::store_view::StoreView;
use crate::ingestors::transport::{FeedTransport, WsTransport};
use crate::model::VehicleLocation;

/// Configuration for the location feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Base address of the traffic server, e.g. `http://localhost:8000`.
    pub base_address: String,
    /// Fixed delay between reconnect attempts.
    pub retry_delay: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_address: "http://localhost:8000".to_string(),
            retry_delay: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("no base address configured for the location feed")]
    MissingBaseAddress,

    #[error("invalid base address '{address}': {source}")]
    InvalidBaseAddress {
        address: String,
        #[source]
        source: url::ParseError,
    },

    #[error("base address '{0}' has no streaming equivalent (expected http, https, ws or wss)")]
    UnsupportedScheme(String),

    #[error("could not decode feed message {payload:?}: {source}")]
    Decode {
        /// The payload as text, invalid UTF-8 replaced. For diagnostics only.
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("location feed was shut down")]
    ShutDown,
}

/// One item of the feed: a location, or the decode failure of one message.
pub type FeedEvent = Result<VehicleLocation, FeedError>;

pub type FeedSubscription = Subscription<FeedEvent>;

/// Observable state of the connection loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// `connect` was never called.
    Idle,
    Connecting,
    Connected,
    /// Waiting out the retry delay before the next attempt.
    Retrying,
}

/// Turns `http(s)` into `ws(s)` and appends `/sockets` to the base path.
pub fn resolve_feed_url(base_address: &str) -> Result<Url, FeedError> {
    let trimmed = base_address.trim();
    if trimmed.is_empty() {
        return Err(FeedError::MissingBaseAddress);
    }

    let mut url = Url::parse(trimmed).map_err(|source| FeedError::InvalidBaseAddress {
        address: trimmed.to_string(),
        source,
    })?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(FeedError::UnsupportedScheme(other.to_string())),
    };
    url.set_scheme(scheme)
        .map_err(|_| FeedError::UnsupportedScheme(url.scheme().to_string()))?;

    let path = format!("{}/sockets", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

/// Decodes one raw feed payload. Invalid UTF-8 is a decode error.
pub fn decode_location(payload: &[u8]) -> FeedEvent {
    serde_json::from_slice(payload).map_err(|source| FeedError::Decode {
        payload: String::from_utf8_lossy(payload).into_owned(),
        source,
    })
}

/// The live connection: its fan-out and the task driving it.
struct SharedFeed {
    dispatcher: Arc<Dispatcher<FeedEvent>>,
    task: JoinHandle<()>,
}

/// # Connection Manager
///
/// Explicitly owned handle to the shared feed connection. Pass it (or an `Arc`
/// of it) to every consumer; each `connect` call returns a new subscription to
/// the same hot multicast.
pub struct ConnectionManager<T: FeedTransport = WsTransport> {
    config: FeedConfig,
    transport: Arc<T>,
    shared: Mutex<Option<SharedFeed>>,
    state: Arc<watch::Sender<ConnectionState>>,
    retries: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl ConnectionManager<WsTransport> {
    pub fn new(config: FeedConfig) -> Self {
        Self::with_transport(config, WsTransport)
    }
}

impl<T: FeedTransport> ConnectionManager<T> {
    pub fn with_transport(config: FeedConfig, transport: T) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            config,
            transport: Arc::new(transport),
            shared: Mutex::new(None),
            state: Arc::new(state),
            retries: Arc::new(AtomicU64::new(0)),
            cancel: CancellationToken::new(),
        }
    }

    /// # Connect
    ///
    /// Returns a subscription to the feed. The first call resolves the endpoint
    /// and spawns the connection task; later calls attach to it. Must be called
    /// inside a tokio runtime.
    ///
    /// # Errors
    /// Fails when the configured base address cannot be turned into a
    /// streaming endpoint, or with [`FeedError::ShutDown`] once the manager was
    /// shut down. Network trouble is never reported here.
    pub fn connect(&self) -> Result<FeedSubscription, FeedError> {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);

        if self.cancel.is_cancelled() {
            return Err(FeedError::ShutDown);
        }

        if let Some(feed) = shared.as_ref() {
            return Ok(feed.dispatcher.subscribe("feed-subscriber"));
        }

        let url = resolve_feed_url(&self.config.base_address)?;
        let dispatcher = Arc::new(Dispatcher::new());
        // Subscribe before the task exists so the first caller cannot miss anything.
        let subscription = dispatcher.subscribe("feed-subscriber");

        let task = tokio::spawn(run_feed(
            url,
            Arc::clone(&self.transport),
            Arc::clone(&dispatcher),
            Arc::clone(&self.state),
            Arc::clone(&self.retries),
            self.config.retry_delay,
            self.cancel.clone(),
        ));

        *shared = Some(SharedFeed { dispatcher, task });
        Ok(subscription)
    }

    pub fn state(&self) -> StoreView<ConnectionState> {
        StoreView::new(self.state.subscribe())
    }

    /// Number of reconnect attempts since the feed was created.
    pub fn retry_count(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, |feed| feed.dispatcher.subscriber_count())
    }

    /// Stops the connection task and ends every subscription.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let feed = self.shared.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(feed) = feed {
            feed.task.abort();
            feed.dispatcher.close();
            log::info!("Location feed shut down");
        }
        self.state.send_replace(ConnectionState::Idle);
    }
}

impl<T: FeedTransport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Primary execution loop with reconnection logic.
async fn run_feed<T: FeedTransport>(
    url: Url,
    transport: Arc<T>,
    dispatcher: Arc<Dispatcher<FeedEvent>>,
    state: Arc<watch::Sender<ConnectionState>>,
    retries: Arc<AtomicU64>,
    retry_delay: Duration,
    cancel: CancellationToken,
) {
    loop {
        // 1. Connecting
        state.send_replace(ConnectionState::Connecting);
        log::info!("Connecting to location feed: {}", url);

        let opened = tokio::select! {
            _ = cancel.cancelled() => return,
            opened = transport.open(&url) => opened,
        };

        // 2. Connected: forward every payload until the connection ends
        match opened {
            Ok(mut frames) => {
                state.send_replace(ConnectionState::Connected);
                log::info!("Connected to location feed");

                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        frame = frames.next() => match frame {
                            Some(Ok(payload)) => {
                                log::trace!("Feed message: {}", String::from_utf8_lossy(&payload));
                                dispatcher.broadcast(decode_location(&payload));
                            }
                            Some(Err(e)) => {
                                log::warn!("Location feed error: {}", e);
                                break;
                            }
                            None => {
                                log::warn!("Location feed closed by remote host");
                                break;
                            }
                        }
                    }
                }
            }
            Err(e) => log::warn!("{}", e),
        }

        // 3. Retrying after a fixed delay
        let attempt = retries.fetch_add(1, Ordering::Relaxed) + 1;
        state.send_replace(ConnectionState::Retrying);
        log::info!(
            "Reconnecting to location feed in {}ms (retry #{})",
            retry_delay.as_millis(),
            attempt
        );

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(retry_delay) => {}
        }
    }
}
