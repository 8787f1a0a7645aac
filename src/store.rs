//! The synchronized store: latest snapshot plus synchronous fan-out.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::decode::decode_payload;
use crate::error::FeedError;
use crate::types::{DecodeMode, Snapshot, SubscriberId};

/// Zero-argument change notification.
type NotifyFn = Arc<dyn Fn() + Send + Sync>;

/// Holds the latest snapshot and notifies subscribers on every change.
///
/// The snapshot is replaced wholesale on each update and shared by `Arc`, so
/// a reader sees either the previous snapshot or the new one, never a
/// partially-updated value. [`snapshot`](FeedStore::snapshot) returns the
/// same `Arc` between updates; observers use `Arc::ptr_eq` for change
/// detection.
pub struct FeedStore {
    /// Current snapshot. Swapped before any subscriber runs.
    current: RwLock<Arc<Snapshot>>,

    /// Snapshot served before any connection work completes.
    initial: Arc<Snapshot>,

    /// Registered notification callbacks.
    subscribers: RwLock<HashMap<SubscriberId, NotifyFn>>,

    /// Counter for generating subscriber ids.
    next_id: AtomicU64,

    /// Payload decode policy.
    mode: DecodeMode,
}

impl FeedStore {
    /// Create a store, optionally seeded with a starting value.
    pub fn new(seed: Option<Value>, mode: DecodeMode) -> Self {
        let initial = Arc::new(Snapshot::seeded(seed));
        FeedStore {
            current: RwLock::new(Arc::clone(&initial)),
            initial,
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            mode,
        }
    }

    /// Register a change callback. Every registration is independent, even
    /// when the same observer subscribes twice.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers.write().insert(id, Arc::new(callback));
        id
    }

    /// Remove a registration. Calling again with the same id is a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.write().remove(&id);
    }

    /// Number of live registrations.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Current snapshot, by reference. Pure read; the same `Arc` comes back
    /// until the next update.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// The pre-connection snapshot (seed value included), for reads that
    /// must be deterministic without a live connection.
    pub fn server_snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.initial)
    }

    /// Fold one raw payload into a new snapshot and notify.
    ///
    /// In lenient mode decoding always yields a value, which replaces `data`
    /// and clears `error`. In strict mode a decode failure publishes the
    /// error and leaves `data` untouched.
    pub fn handle_raw_message(&self, raw: &str) {
        let next = match decode_payload(raw, self.mode) {
            Ok(value) => Snapshot {
                data: Some(value),
                error: None,
            },
            Err(error) => Snapshot {
                data: self.current.read().data.clone(),
                error: Some(error),
            },
        };
        self.publish(next);
    }

    /// Record a terminal connection failure and notify. `data` is left
    /// untouched; the transport has already torn the connection down.
    pub fn handle_terminal_error(&self, error: FeedError) {
        let next = Snapshot {
            data: self.current.read().data.clone(),
            error: Some(error),
        };
        self.publish(next);
    }

    /// Swap the snapshot, then fan out. The swap happens before any callback
    /// runs, so a re-entrant read from inside a notification observes the
    /// new snapshot.
    fn publish(&self, next: Snapshot) {
        *self.current.write() = Arc::new(next);
        self.notify();
    }

    /// Invoke every currently-registered callback exactly once. Membership
    /// is copied up front, so a callback unsubscribing itself (or anyone
    /// else) mid-round cannot disturb the iteration, and a panicking
    /// callback is contained to its own slot.
    fn notify(&self) {
        let round: Vec<(SubscriberId, NotifyFn)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, callback)| (*id, Arc::clone(callback)))
            .collect();

        for (id, callback) in round {
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                tracing::warn!(subscriber = id.0, "subscriber callback panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting_subscriber(store: &FeedStore) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = Arc::clone(&count);
            store.subscribe(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        count
    }

    // --- Registration ---

    #[test]
    fn test_subscribe_unsubscribe() {
        let store = FeedStore::new(None, DecodeMode::Lenient);

        let id = store.subscribe(|| {});
        assert_eq!(store.subscriber_count(), 1);

        store.unsubscribe(id);
        assert_eq!(store.subscriber_count(), 0);

        // Repeat unsubscribe is a no-op.
        store.unsubscribe(id);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_same_observer_subscribes_twice() {
        let store = FeedStore::new(None, DecodeMode::Lenient);
        let count = Arc::new(AtomicUsize::new(0));

        let make = |count: &Arc<AtomicUsize>| {
            let count = Arc::clone(count);
            move || {
                count.fetch_add(1, Ordering::SeqCst);
            }
        };
        let first = store.subscribe(make(&count));
        let _second = store.subscribe(make(&count));

        store.handle_raw_message("1");
        assert_eq!(count.load(Ordering::SeqCst), 2);

        store.unsubscribe(first);
        store.handle_raw_message("2");
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    // --- Snapshot discipline ---

    #[test]
    fn test_snapshot_reference_stable_between_updates() {
        let store = FeedStore::new(Some(json!(0)), DecodeMode::Lenient);

        let a = store.snapshot();
        let b = store.snapshot();
        assert!(Arc::ptr_eq(&a, &b));

        store.handle_raw_message("1");
        let c = store.snapshot();
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(Arc::ptr_eq(&c, &store.snapshot()));
    }

    #[test]
    fn test_server_snapshot_keeps_seed() {
        let store = FeedStore::new(Some(json!(0)), DecodeMode::Lenient);
        store.handle_raw_message("42");

        assert_eq!(store.server_snapshot().data, Some(json!(0)));
        assert_eq!(store.snapshot().data, Some(json!(42)));
    }

    #[test]
    fn test_reentrant_read_sees_new_snapshot() {
        let store = Arc::new(FeedStore::new(None, DecodeMode::Lenient));
        let observed = Arc::new(Mutex::new(Vec::new()));
        {
            let store = Arc::clone(&store);
            let observed = Arc::clone(&observed);
            store.clone().subscribe(move || {
                observed.lock().push(store.snapshot().data.clone());
            });
        }

        store.handle_raw_message("1");
        store.handle_raw_message("2");
        assert_eq!(*observed.lock(), vec![Some(json!(1)), Some(json!(2))]);
    }

    // --- Message folding ---

    #[test]
    fn test_messages_replace_data_and_clear_error() {
        let store = FeedStore::new(None, DecodeMode::Lenient);
        store.handle_terminal_error(FeedError::Connection("dropped".into()));
        assert!(store.snapshot().error.is_some());

        store.handle_raw_message(r#"{"x":1}"#);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.data, Some(json!({"x": 1})));
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn test_terminal_error_preserves_data() {
        let store = FeedStore::new(None, DecodeMode::Lenient);
        store.handle_raw_message("7");

        store.handle_terminal_error(FeedError::Connection("dropped".into()));
        let snapshot = store.snapshot();
        assert_eq!(snapshot.data, Some(json!(7)));
        assert_eq!(
            snapshot.error,
            Some(FeedError::Connection("dropped".into()))
        );
    }

    #[test]
    fn test_strict_decode_failure_preserves_data() {
        let store = FeedStore::new(Some(json!(0)), DecodeMode::Strict);

        store.handle_raw_message("not json");
        let snapshot = store.snapshot();
        assert_eq!(snapshot.data, Some(json!(0)));
        assert!(matches!(snapshot.error, Some(FeedError::Decode(_))));

        store.handle_raw_message(r#"{"ok":true}"#);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.data, Some(json!({"ok": true})));
        assert!(snapshot.error.is_none());
    }

    // --- Notification ---

    #[test]
    fn test_every_update_notifies_once() {
        let store = FeedStore::new(None, DecodeMode::Lenient);
        let count = counting_subscriber(&store);

        store.handle_raw_message("1");
        store.handle_raw_message("2");
        store.handle_terminal_error(FeedError::Connection("dropped".into()));

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unsubscribe_during_notification() {
        let store = Arc::new(FeedStore::new(None, DecodeMode::Lenient));
        let self_removing = Arc::new(Mutex::new(None::<SubscriberId>));
        let fired = Arc::new(AtomicUsize::new(0));

        let id = {
            let store = Arc::clone(&store);
            let cell = Arc::clone(&self_removing);
            let fired = Arc::clone(&fired);
            store.clone().subscribe(move || {
                fired.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = cell.lock().take() {
                    store.unsubscribe(id);
                }
            })
        };
        *self_removing.lock() = Some(id);
        let others = counting_subscriber(&store);

        store.handle_raw_message("1");
        // The self-removing subscriber fired, and so did the other one.
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(others.load(Ordering::SeqCst), 1);

        store.handle_raw_message("2");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(others.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let store = FeedStore::new(None, DecodeMode::Lenient);
        store.subscribe(|| panic!("observer bug"));
        let count = counting_subscriber(&store);

        store.handle_raw_message("1");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
