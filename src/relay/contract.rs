//! Relay message vocabulary.
//!
//! | Message | Direction |
//! |---|---|
//! | `CheckTargetOpen` | origin -> relay |
//! | `SendChunk` | origin -> relay |
//! | `ProcessChunk` | relay -> surface |
//! | `Result` | surface -> relay |
//! | `ResultDelivered` | relay -> origin |
//! | `Error` | surface -> relay, relay -> origin |

use crate::failure::FailureKind;
use crate::locale::Locale;
use crate::store::Carried;
use crate::surface::SurfaceKind;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Outbound chunk from an origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendChunk {
    /// Requesting origin; becomes the relay's current origin.
    pub origin: String,
    /// Locale for failure messages (None = relay default).
    #[serde(default)]
    pub locale: Option<Locale>,
    /// Caller-supplied correlation id, echoed on the reply.
    pub request_id: String,
    pub payload: Carried,
}

/// A resolved chunk handed to a surface adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessChunk {
    pub request_id: String,
    pub payload: String,
    pub locale: Locale,
}

/// Live presence answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetStatus {
    pub open: bool,
    /// The surface a chunk sent now would go to.
    pub surface: Option<SurfaceKind>,
}

/// Everything the switchboard loop consumes.
#[derive(Debug)]
pub enum RelayInbound {
    CheckTargetOpen {
        reply: oneshot::Sender<TargetStatus>,
    },
    SendChunk(SendChunk),
    /// A surface finished with a response.
    Result { request_id: String, payload: String },
    /// A surface failed; `message` is already localized.
    Error {
        request_id: String,
        message: String,
        kind: Option<FailureKind>,
    },
}

/// Relay -> origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OriginEvent {
    ResultDelivered {
        request_id: String,
        payload: Carried,
    },
    Error {
        request_id: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<FailureKind>,
    },
}

impl OriginEvent {
    #[must_use]
    pub fn request_id(&self) -> &str {
        match self {
            Self::ResultDelivered { request_id, .. } | Self::Error { request_id, .. } => {
                request_id
            }
        }
    }
}

/// An [`OriginEvent`] addressed to one origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub origin: String,
    pub event: OriginEvent,
}
