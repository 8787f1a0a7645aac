//! Transport layer for the feed.
//!
//! The native live-connection primitive is abstracted behind the
//! [`StreamOpener`] capability so a feed can be driven by a real HTTP
//! event stream ([`http::HttpOpener`]) or by a hand-scripted one
//! ([`scripted::ScriptedOpener`]) with no network stack at all.
//!
//! A connection delivers events upward through an [`EventSink`], a shared
//! callback cell the owner detaches on teardown. Delivery holds the cell's
//! lock, which is what makes teardown safe: `close` cannot return while a
//! delivery is in flight, and any delivery that starts afterwards observes
//! the empty cell and becomes a no-op.

mod conn;
pub mod http;
pub mod scripted;

pub use conn::{EventSink, StreamHandle, StreamOpener};
