//! The connection seam: opener and handle traits plus the callback sink
//! they deliver through.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{FeedError, Result};
use crate::types::ConnectionState;

struct SinkCallbacks {
    on_message: Box<dyn FnMut(&str) + Send>,
    on_terminal_error: Box<dyn FnMut(FeedError) + Send>,
}

/// Callback cell shared between a connection and its owner.
///
/// Messages and the terminal error are delivered with the cell locked, so
/// [`detach`](EventSink::detach) blocks until an in-flight delivery
/// completes and nothing fires after it returns.
pub struct EventSink {
    callbacks: Mutex<Option<SinkCallbacks>>,
}

impl EventSink {
    pub fn new(
        on_message: impl FnMut(&str) + Send + 'static,
        on_terminal_error: impl FnMut(FeedError) + Send + 'static,
    ) -> Self {
        EventSink {
            callbacks: Mutex::new(Some(SinkCallbacks {
                on_message: Box::new(on_message),
                on_terminal_error: Box::new(on_terminal_error),
            })),
        }
    }

    /// Deliver one message payload. No-op once detached.
    pub fn message(&self, data: &str) {
        let mut guard = self.callbacks.lock();
        if let Some(cbs) = guard.as_mut() {
            (cbs.on_message)(data);
        }
    }

    /// Deliver a terminal error and detach in the same step. A connection
    /// reports at most one terminal error, and nothing fires after it.
    pub fn terminal_error(&self, error: FeedError) {
        let mut guard = self.callbacks.lock();
        if let Some(mut cbs) = guard.take() {
            (cbs.on_terminal_error)(error);
        }
    }

    /// Drop both callbacks. Later deliveries become no-ops.
    pub fn detach(&self) {
        self.callbacks.lock().take();
    }

    /// Whether callbacks are still attached.
    pub fn is_attached(&self) -> bool {
        self.callbacks.lock().is_some()
    }
}

/// One live (or finished) push-stream connection.
pub trait StreamHandle: Send {
    /// Current transport-level state.
    fn state(&self) -> ConnectionState;

    /// Tear the connection down: detach the sink first, then release the
    /// underlying resource. Idempotent.
    fn close(&mut self);
}

/// Capability to open push-stream connections.
pub trait StreamOpener: Send + Sync {
    /// Open a connection to `url`, delivering events through `sink`.
    /// Connecting begins immediately; establishment may complete after this
    /// returns.
    fn open(&self, url: &str, sink: Arc<EventSink>) -> Result<Box<dyn StreamHandle>>;
}

/// Shared connection-state cell. Terminal states stick: transitions out of
/// `Closed` or `Errored` are ignored.
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: ConnectionState) -> Self {
        StateCell(AtomicU8::new(encode(state)))
    }

    pub(crate) fn get(&self) -> ConnectionState {
        decode(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn set(&self, next: ConnectionState) {
        let mut current = self.0.load(Ordering::SeqCst);
        loop {
            if decode(current).is_terminal() {
                return;
            }
            match self
                .0
                .compare_exchange(current, encode(next), Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

fn encode(state: ConnectionState) -> u8 {
    match state {
        ConnectionState::Idle => 0,
        ConnectionState::Connecting => 1,
        ConnectionState::Open => 2,
        ConnectionState::Closed => 3,
        ConnectionState::Errored => 4,
    }
}

fn decode(raw: u8) -> ConnectionState {
    match raw {
        0 => ConnectionState::Idle,
        1 => ConnectionState::Connecting,
        2 => ConnectionState::Open,
        3 => ConnectionState::Closed,
        _ => ConnectionState::Errored,
    }
}
