//! The switchboard between origins and surfaces.
//!
//! One [`Switchboard`] task owns all routing state: the current origin,
//! the in-flight request, the origin of every dispatched request and the
//! payload store handle. Callers talk to it
//! through a cloneable [`RelayHandle`]; replies to origins go out on a
//! broadcast channel of [`Delivery`] values that each origin filters by id.

pub mod contract;
mod switchboard;

pub use contract::{Delivery, OriginEvent, ProcessChunk, RelayInbound, SendChunk, TargetStatus};
pub use switchboard::{RelayHandle, Switchboard, relay_channel};

use serde::{Deserialize, Serialize};

/// What the relay does with a chunk that arrives while another is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyPolicy {
    /// Take over routing and dispatch anyway. Each dispatched request's
    /// report still goes to the origin that sent it.
    #[default]
    Overwrite,
    /// Answer the newcomer with a `Busy` failure and do not dispatch.
    Reject,
}
