//! # Live Feed
//!
//! A client-side Server-Sent Events adapter: it bridges a one-way push
//! stream into a synchronously observable snapshot store.
//!
//! ## Core Concepts
//!
//! - **Transport**: one connection handle per feed, created through an
//!   injectable [`StreamOpener`] (real HTTP, or scripted for tests)
//! - **Store**: [`FeedStore`] holds the latest decoded value and last error
//!   as one immutable [`Snapshot`], swapped wholesale on every update
//! - **Scope**: [`Feed`] ties exactly one connection to one store and
//!   exposes the subscribe/snapshot surface a reactive layer syncs against
//!
//! Notification is synchronous: each inbound message swaps the snapshot and
//! then fires every subscriber in the delivering context, so a re-entrant
//! read always observes the just-updated snapshot.
//!
//! ## Example
//!
//! ```ignore
//! use livefeed::{Feed, FeedConfig, HttpOpener};
//!
//! let opener = HttpOpener::new()?;
//! let mut feed = Feed::open(
//!     FeedConfig::new("http://localhost:3000/events").with_seed(0),
//!     opener,
//! )?;
//!
//! let id = feed.subscribe(|| println!("changed"));
//!
//! let current = feed.snapshot();
//! println!("{:?} (connected: {})", current.data, feed.is_connected());
//!
//! feed.unsubscribe(id);
//! feed.close();
//! ```

pub mod decode;
pub mod error;
pub mod feed;
pub mod framing;
pub mod store;
pub mod transport;
pub mod types;

// Re-exports
pub use error::{FeedError, Result};
pub use feed::{Feed, FeedConfig, FeedState};
pub use framing::{EventFrame, FrameDecoder};
pub use store::FeedStore;
pub use transport::http::HttpOpener;
pub use transport::scripted::{scripted, ScriptedDriver, ScriptedOpener};
pub use transport::{EventSink, StreamHandle, StreamOpener};
pub use types::{ConnectionState, DecodeMode, Snapshot, SubscriberId};
