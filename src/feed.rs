//! The owning scope: one connection feeding one store.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{FeedError, Result};
use crate::store::FeedStore;
use crate::transport::{EventSink, StreamHandle, StreamOpener};
use crate::types::{ConnectionState, DecodeMode, Snapshot, SubscriberId};

/// Feed configuration.
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Event-stream endpoint.
    pub url: String,

    /// Value served before the first message arrives.
    pub seed: Option<Value>,

    /// Payload decode policy.
    pub decode: DecodeMode,
}

impl FeedConfig {
    /// Config with defaults: no seed, lenient decoding.
    pub fn new(url: impl Into<String>) -> Self {
        FeedConfig {
            url: url.into(),
            seed: None,
            decode: DecodeMode::default(),
        }
    }

    /// Set the pre-connection seed value.
    pub fn with_seed(mut self, seed: impl Into<Value>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    /// Set the decode policy.
    pub fn with_decode(mut self, mode: DecodeMode) -> Self {
        self.decode = mode;
        self
    }
}

/// One composed read of a feed: current data, current error, and whether a
/// live connection exists right now.
///
/// `is_connected` is derived from the handle state on every read, never
/// stored.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedState {
    pub data: Option<Value>,
    pub error: Option<FeedError>,
    pub is_connected: bool,
}

/// A live feed: owns the connection handle and the store it feeds.
///
/// Exactly one connection exists per feed at any time. Observers use the
/// external-store surface — [`subscribe`](Feed::subscribe),
/// [`snapshot`](Feed::snapshot), [`server_snapshot`](Feed::server_snapshot)
/// — or the composed [`read`](Feed::read) view.
///
/// Observers may read, subscribe, and unsubscribe from inside a
/// notification callback; they must not tear the feed down from inside one.
pub struct Feed {
    store: Arc<FeedStore>,
    opener: Box<dyn StreamOpener>,
    handle: Option<Box<dyn StreamHandle>>,
    url: String,
}

impl Feed {
    /// Build the store and open the first connection immediately.
    pub fn open(config: FeedConfig, opener: impl StreamOpener + 'static) -> Result<Feed> {
        let FeedConfig { url, seed, decode } = config;
        let store = Arc::new(FeedStore::new(seed, decode));
        let mut feed = Feed {
            store,
            opener: Box::new(opener),
            handle: None,
            url: String::new(),
        };
        feed.connect(url)?;
        Ok(feed)
    }

    /// Open a connection to `url`, wiring its events into the store.
    fn connect(&mut self, url: String) -> Result<()> {
        if url.is_empty() {
            return Err(FeedError::InvalidUrl("empty URL".into()));
        }

        let sink = {
            let on_message = {
                let store = Arc::clone(&self.store);
                move |raw: &str| store.handle_raw_message(raw)
            };
            let on_terminal_error = {
                let store = Arc::clone(&self.store);
                move |error| store.handle_terminal_error(error)
            };
            Arc::new(EventSink::new(on_message, on_terminal_error))
        };

        tracing::debug!(%url, "opening event stream");
        self.handle = Some(self.opener.open(&url, sink)?);
        self.url = url;
        Ok(())
    }

    /// Current connection state (`Idle` when no handle exists).
    pub fn state(&self) -> ConnectionState {
        self.handle
            .as_ref()
            .map_or(ConnectionState::Idle, |handle| handle.state())
    }

    /// True iff a connection handle exists and its stream is open.
    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    /// The URL the current (or last) connection was opened against.
    pub fn url(&self) -> &str {
        &self.url
    }

    // --- External-store surface ---

    /// Register a change callback, fired synchronously on every snapshot
    /// change.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> SubscriberId {
        self.store.subscribe(callback)
    }

    /// Remove a registration; repeat calls are no-ops.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.store.unsubscribe(id)
    }

    /// Current snapshot by reference.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.snapshot()
    }

    /// Pre-connection snapshot (the seed value, no error).
    pub fn server_snapshot(&self) -> Arc<Snapshot> {
        self.store.server_snapshot()
    }

    /// Shared store, for observers that outlive borrowed access to the
    /// feed.
    pub fn store(&self) -> Arc<FeedStore> {
        Arc::clone(&self.store)
    }

    /// One composed read of the feed.
    pub fn read(&self) -> FeedState {
        let snapshot = self.store.snapshot();
        FeedState {
            data: snapshot.data.clone(),
            error: snapshot.error.clone(),
            is_connected: self.is_connected(),
        }
    }

    // --- Lifecycle ---

    /// Tear down the current connection and open a new one against `url`.
    /// The store, and with it the snapshot, survives the switch.
    pub fn set_url(&mut self, url: impl Into<String>) -> Result<()> {
        self.close();
        self.connect(url.into())
    }

    /// Tear the connection down: detach callbacks, close the transport,
    /// clear the handle, in that order. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
            tracing::debug!(url = %self.url, "event stream closed");
        }
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        self.close();
    }
}
