//! Page driver seam.
//!
//! A [`Page`] exposes exactly what the adapter needs from a live chat tab:
//! a full HTML snapshot for lookups, and a handful of actions addressed by
//! [`Locator`]. Lookups happen on the relay side against the snapshot, so
//! a driver never evaluates selectors of its own beyond resolving a locator.

use super::SurfaceKind;
use async_trait::async_trait;
use autobridge_dom::Locator;

/// Failure of a single page operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    /// The page agent ran the operation and reported failure.
    #[error("page operation `{op}` failed: {reason}")]
    Rejected { op: &'static str, reason: String },

    /// The page agent did not answer in time.
    #[error("page operation `{op}` timed out")]
    TimedOut { op: &'static str },

    /// The page agent is gone.
    #[error("page agent disconnected")]
    Disconnected,
}

impl PageError {
    /// `true` when the driver itself is unusable, as opposed to one
    /// operation failing.
    #[must_use]
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, Self::Disconnected | Self::TimedOut { .. })
    }
}

pub type PageResult<T> = std::result::Result<T, PageError>;

/// Driver for one open chat surface.
#[async_trait]
pub trait Page: Send + Sync {
    /// Which provider this page belongs to.
    fn surface(&self) -> SurfaceKind;

    /// `document.documentElement.outerHTML`.
    async fn snapshot(&self) -> PageResult<String>;

    /// Focus the element.
    async fn focus(&self, target: &Locator) -> PageResult<()>;

    /// Select all of the element's content and delete it.
    async fn clear(&self, target: &Locator) -> PageResult<()>;

    /// Dispatch a synthetic paste event carrying `text` as `text/plain`.
    async fn paste(&self, target: &Locator, text: &str) -> PageResult<()>;

    /// Splice `text` into the current selection range and fire `input`.
    async fn insert_at_selection(&self, target: &Locator, text: &str) -> PageResult<()>;

    /// Click the element.
    async fn click(&self, target: &Locator) -> PageResult<()>;
}
