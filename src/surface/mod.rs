//! Chat surfaces: the third-party web UIs the relay drives.
//!
//! - [`page`]: the [`Page`] driver seam (DOM snapshot + actions).
//! - [`profile`]: per-provider selector chains, as data.
//! - [`normalize`]: provider-specific pre-send text cleanup.
//! - [`adapter`]: the shared request state machine.
//! - [`remote`]: WebSocket hub that browser page agents connect to.

pub mod adapter;
pub mod normalize;
pub mod page;
pub mod profile;
pub mod remote;

pub use adapter::{AdapterStage, SurfaceAdapter};
pub use page::{Page, PageError, PageResult};
pub use profile::SurfaceProfile;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One of the interchangeable chat providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    Claude,
    Gemini,
}

impl SurfaceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Gemini => "gemini",
        }
    }

    /// Product name shown to users.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Claude => "Claude",
            Self::Gemini => "Gemini",
        }
    }

    /// Site the surface lives on.
    #[must_use]
    pub fn host(self) -> &'static str {
        match self {
            Self::Claude => "claude.ai",
            Self::Gemini => "gemini.google.com",
        }
    }
}

impl std::fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live lookup of open surfaces.
///
/// Every call is a fresh probe; implementations must not cache presence,
/// since a surface can close between requests.
#[async_trait]
pub trait SurfaceDirectory: Send + Sync + 'static {
    /// A driver for the open `kind` surface, or `None` if none is open.
    async fn page(&self, kind: SurfaceKind) -> Option<Arc<dyn Page>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&SurfaceKind::Gemini).expect("serialize in test");
        assert_eq!(json, "\"gemini\"");
        let kind: SurfaceKind = serde_json::from_str("\"claude\"").expect("deserialize in test");
        assert_eq!(kind, SurfaceKind::Claude);
    }
}
