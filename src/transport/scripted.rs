//! Scripted in-memory transport.
//!
//! Connections opened through a [`ScriptedOpener`] are driven by hand from
//! the paired [`ScriptedDriver`]: mark them open, push payloads, or fail
//! them, all without a network stack. Emissions on a closed connection are
//! dropped by the detached sink, which is the same guarantee the production
//! teardown path relies on.
//!
//! Driver methods panic when no connection has been opened yet; this is
//! test tooling and a loud failure is the useful behavior.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{FeedError, Result};
use crate::types::ConnectionState;

use super::conn::{EventSink, StateCell, StreamHandle, StreamOpener};

struct ScriptedConn {
    url: String,
    sink: Arc<EventSink>,
    state: Arc<StateCell>,
}

/// Opener half of a scripted transport; hand this to the feed.
#[derive(Clone)]
pub struct ScriptedOpener {
    conns: Arc<Mutex<Vec<ScriptedConn>>>,
}

/// Driver half: synthesizes transport events for connections opened through
/// the paired opener. Targets the most recent connection unless an index is
/// given.
pub struct ScriptedDriver {
    conns: Arc<Mutex<Vec<ScriptedConn>>>,
}

/// Create a paired opener and driver.
pub fn scripted() -> (ScriptedOpener, ScriptedDriver) {
    let conns = Arc::new(Mutex::new(Vec::new()));
    (
        ScriptedOpener {
            conns: Arc::clone(&conns),
        },
        ScriptedDriver { conns },
    )
}

impl StreamOpener for ScriptedOpener {
    fn open(&self, url: &str, sink: Arc<EventSink>) -> Result<Box<dyn StreamHandle>> {
        let state = Arc::new(StateCell::new(ConnectionState::Connecting));
        self.conns.lock().push(ScriptedConn {
            url: url.to_owned(),
            sink: Arc::clone(&sink),
            state: Arc::clone(&state),
        });
        Ok(Box::new(ScriptedHandle { sink, state }))
    }
}

struct ScriptedHandle {
    sink: Arc<EventSink>,
    state: Arc<StateCell>,
}

impl StreamHandle for ScriptedHandle {
    fn state(&self) -> ConnectionState {
        self.state.get()
    }

    fn close(&mut self) {
        self.sink.detach();
        self.state.set(ConnectionState::Closed);
    }
}

impl ScriptedDriver {
    /// Number of connections opened so far.
    pub fn opened(&self) -> usize {
        self.conns.lock().len()
    }

    /// URL of the most recent connection.
    pub fn last_url(&self) -> String {
        let conns = self.conns.lock();
        conns
            .last()
            .expect("no scripted connection has been opened")
            .url
            .clone()
    }

    /// Transition the most recent connection to `Open`.
    pub fn mark_open(&self) {
        let conns = self.conns.lock();
        conns
            .last()
            .expect("no scripted connection has been opened")
            .state
            .set(ConnectionState::Open);
    }

    /// Deliver one message payload on the most recent connection.
    pub fn emit(&self, data: &str) {
        // The registry lock is released before delivery so a notified
        // subscriber may re-enter the driver or open a new connection.
        let sink = {
            let conns = self.conns.lock();
            Arc::clone(&conns.last().expect("no scripted connection has been opened").sink)
        };
        sink.message(data);
    }

    /// Deliver one message payload on connection `index` (in open order).
    pub fn emit_to(&self, index: usize, data: &str) {
        let sink = {
            let conns = self.conns.lock();
            Arc::clone(
                &conns
                    .get(index)
                    .expect("scripted connection index out of range")
                    .sink,
            )
        };
        sink.message(data);
    }

    /// Fail the most recent connection: terminal state, single error
    /// delivery, resource released.
    pub fn fail(&self, reason: &str) {
        let (sink, state) = {
            let conns = self.conns.lock();
            let conn = conns.last().expect("no scripted connection has been opened");
            (Arc::clone(&conn.sink), Arc::clone(&conn.state))
        };
        state.set(ConnectionState::Errored);
        sink.terminal_error(FeedError::Connection(reason.to_owned()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_sink() -> (Arc<EventSink>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = {
            let count = Arc::clone(&count);
            Arc::new(EventSink::new(
                move |_| {
                    count.fetch_add(1, Ordering::SeqCst);
                },
                |_| {},
            ))
        };
        (sink, count)
    }

    #[test]
    fn test_driver_drives_state() {
        let (opener, driver) = scripted();
        let (sink, _) = counting_sink();
        let handle = opener.open("/events", sink).unwrap();

        assert_eq!(handle.state(), ConnectionState::Connecting);
        driver.mark_open();
        assert_eq!(handle.state(), ConnectionState::Open);
        driver.fail("dropped");
        assert_eq!(handle.state(), ConnectionState::Errored);
    }

    #[test]
    fn test_emissions_after_close_are_dropped() {
        let (opener, driver) = scripted();
        let (sink, count) = counting_sink();
        let mut handle = opener.open("/events", sink).unwrap();

        driver.emit("1");
        assert_eq!(count.load(Ordering::SeqCst), 1);

        handle.close();
        handle.close();
        assert_eq!(handle.state(), ConnectionState::Closed);

        driver.emit("2");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
