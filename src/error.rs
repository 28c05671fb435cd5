//! Error types for the autobridge relay.

/// Top-level error type for relay infrastructure.
///
/// Per-request failures the origin should see (no surface open, input box
/// missing, response too short, ...) are not errors in this sense; they are
/// [`crate::failure::FailureKind`] values rendered into localized messages.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Payload staging error.
    #[error("store error: {0}")]
    Store(String),

    /// Settings or history file error.
    #[error("persist error: {0}")]
    Persist(String),

    /// Surface page-driver transport error.
    #[error("surface error: {0}")]
    Surface(String),

    /// A page operation against a live surface failed.
    #[error(transparent)]
    Page(#[from] crate::surface::PageError),

    /// DOM snapshot lookup error.
    #[error("DOM error: {0}")]
    Dom(#[from] autobridge_dom::DomError),

    /// Wire-format (de)serialization error.
    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// A caller-side wait ran past its deadline.
    #[error("timed out: {0}")]
    Timeout(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BridgeError>;
