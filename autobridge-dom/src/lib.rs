//! # autobridge-dom
//!
//! Opportunistic element lookup over HTML snapshots of third-party chat
//! surfaces.
//!
//! Chat UIs change their markup between releases, so nothing here parses
//! their structure. Instead every lookup is an ordered [`LookupChain`] of CSS
//! [`Strategy`] probes, tried from most to least specific until one reports
//! a hit.
//!
//! ## Design
//!
//! - Snapshots are parsed with [`scraper`] and queried synchronously; a
//!   [`Document`] is never held across an `.await` by callers.
//! - [`Document::locate`] follows `querySelector` semantics: only the first
//!   match of each strategy is considered, and it may be rejected by the
//!   strategy's [`Filter`] (e.g. a disabled button).
//! - [`Document::last_text`] follows `querySelectorAll` semantics: every match
//!   passing the filter is collected and the last one in document order wins.
//! - A hit is reported as a [`Locator`] (`selector` + index) that a live page
//!   driver can resolve with `document.querySelectorAll(selector)[index]`.

pub mod document;
pub mod error;
pub mod strategy;
mod text;

pub use document::Document;
pub use error::{DomError, Result};
pub use strategy::{Filter, Locator, LookupChain, Strategy};
