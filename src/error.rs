//! Error types for the feed adapter.

use thiserror::Error;

/// Main error type for feed operations.
///
/// Variants are cloneable because the latest failure is published inside the
/// shared snapshot handed to every observer.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("invalid stream URL: {0}")]
    InvalidUrl(String),

    #[error("failed to decode event payload: {0}")]
    Decode(String),

    #[error("event stream connection failed: {0}")]
    Connection(String),
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;
