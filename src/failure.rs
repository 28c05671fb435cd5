//! Per-request terminal failures reported to the origin.
//!
//! These are outcomes, not infrastructure errors: every one of them ends a
//! single request and turns into exactly one localized message for the
//! origin. Nothing here is retried.

use crate::locale::Locale;
use crate::surface::SurfaceKind;
use serde::{Deserialize, Serialize};

/// Terminal failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No surface is open to receive the chunk.
    TargetUnavailable,
    /// No input-control strategy matched.
    InputNotFound,
    /// No enabled submit-control strategy matched.
    SubmitNotFound,
    /// Both the paste and the selection-splice insertion failed.
    InsertionFailed,
    /// The response settled but was missing or implausibly short.
    EmptyOrTooShortResponse,
    /// The hard deadline passed without a plausible response.
    Timeout,
    /// The surface's page agent disconnected mid-request.
    SurfaceLost,
    /// Another chunk is still in flight and the relay rejects overlap.
    Busy,
}

impl FailureKind {
    /// Stable snake-case name used in logs and diagnostics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TargetUnavailable => "target_unavailable",
            Self::InputNotFound => "input_not_found",
            Self::SubmitNotFound => "submit_not_found",
            Self::InsertionFailed => "insertion_failed",
            Self::EmptyOrTooShortResponse => "empty_or_too_short_response",
            Self::Timeout => "timeout",
            Self::SurfaceLost => "surface_lost",
            Self::Busy => "busy",
        }
    }
}

/// A failure tied to the surface that produced it, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub surface: Option<SurfaceKind>,
}

impl Failure {
    /// A failure not attributable to a particular surface.
    #[must_use]
    pub fn relay(kind: FailureKind) -> Self {
        Self {
            kind,
            surface: None,
        }
    }

    /// A failure raised while driving `surface`.
    #[must_use]
    pub fn on(surface: SurfaceKind, kind: FailureKind) -> Self {
        Self {
            kind,
            surface: Some(surface),
        }
    }

    /// Render the user-facing message in `locale`.
    #[must_use]
    pub fn message(&self, locale: Locale) -> String {
        locale.describe(self)
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.surface {
            Some(surface) => write!(f, "{} on {}", self.kind.as_str(), surface.as_str()),
            None => f.write_str(self.kind.as_str()),
        }
    }
}
