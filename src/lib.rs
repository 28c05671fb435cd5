//! autobridge: a relay between an app and chat web surfaces.
//!
//! An app hands text chunks to the relay; the relay pastes them into an
//! open chat surface (Claude or Gemini), waits for the streamed answer to
//! settle, and returns it.
//!
//! # Architecture
//!
//! - **Facade**: the app-side origin, spoken to as JSON lines on stdin/stdout
//! - **Relay**: a single switchboard task that tracks the origin and the
//!   in-flight request
//! - **Store**: out-of-band staging for payloads over the channel size limit
//! - **Surface**: per-provider adapters that drive a page over a WebSocket
//!   page-driver protocol
//! - **Detector**: polling completion detection for streamed answers

pub mod bridge_dirs;
pub mod config;
pub mod detector;
pub mod diagnostics;
pub mod error;
pub mod facade;
pub mod failure;
pub mod locale;
pub mod relay;
pub mod settings;
pub mod store;
pub mod surface;
pub mod text;

#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
pub mod test_utils;

pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
