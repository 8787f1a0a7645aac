//! Core types for the feed adapter.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

use crate::error::FeedError;

/// Unique identifier for a subscriber registration.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({})", self.0)
    }
}

/// How raw payloads are decoded into snapshot data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeMode {
    /// JSON, then integer, then the raw text itself. Never fails.
    Lenient,

    /// JSON only; anything else is published as a decode error.
    Strict,
}

impl Default for DecodeMode {
    fn default() -> Self {
        DecodeMode::Lenient
    }
}

/// Lifecycle states of a stream connection handle.
///
/// `Errored` is terminal for the handle: a new connection must be opened to
/// retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection exists.
    Idle,
    /// Connection establishment is in flight.
    Connecting,
    /// Live and delivering events.
    Open,
    /// Torn down locally.
    Closed,
    /// The transport reported a terminal failure.
    Errored,
}

impl ConnectionState {
    /// True while the stream is live.
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// No further transitions happen from this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Errored)
    }
}

/// The latest observable state of a feed.
///
/// Snapshots are value types: once published they are never mutated, and
/// every update swaps in a fresh instance. Observers compare snapshots by
/// pointer identity (`Arc::ptr_eq`) to detect "no change".
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Last successfully decoded payload. `None` until the first message
    /// arrives, unless a seed value was configured.
    pub data: Option<Value>,

    /// Last decode or connection failure; cleared by the next successful
    /// message.
    pub error: Option<FeedError>,
}

impl Snapshot {
    /// Snapshot holding an optional seed value and no error.
    pub fn seeded(seed: Option<Value>) -> Self {
        Snapshot {
            data: seed,
            error: None,
        }
    }

    /// Deserialize the current data into a concrete type.
    ///
    /// Returns `None` when no data has arrived yet or when the payload does
    /// not match `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.data
            .clone()
            .and_then(|value| serde_json::from_value(value).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_seeded_snapshot() {
        let snapshot = Snapshot::seeded(Some(json!(0)));
        assert_eq!(snapshot.data, Some(json!(0)));
        assert!(snapshot.error.is_none());

        let empty = Snapshot::seeded(None);
        assert!(empty.data.is_none());
    }

    #[test]
    fn test_data_as_typed_read() {
        let snapshot = Snapshot::seeded(Some(json!({"value": 7})));

        #[derive(serde::Deserialize, PartialEq, Debug)]
        struct Reading {
            value: i64,
        }

        assert_eq!(snapshot.data_as::<Reading>(), Some(Reading { value: 7 }));
        assert_eq!(snapshot.data_as::<String>(), None);
    }

    #[test]
    fn test_state_predicates() {
        assert!(ConnectionState::Open.is_open());
        assert!(!ConnectionState::Connecting.is_open());
        assert!(ConnectionState::Closed.is_terminal());
        assert!(ConnectionState::Errored.is_terminal());
        assert!(!ConnectionState::Idle.is_terminal());
    }
}
