//! Threshold policy deciding between inline and staged transport.

use super::{PayloadStore, StageKey};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A payload as it travels through a size-limited channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Carried {
    /// The payload itself.
    Inline(String),
    /// A reference to a payload staged in a [`PayloadStore`].
    Staged(StageKey),
}

impl Carried {
    #[must_use]
    pub fn is_staged(&self) -> bool {
        matches!(self, Self::Staged(_))
    }

    /// Resolve to the payload text, consuming a staged entry.
    ///
    /// A staged key that is no longer present resolves to an empty string.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the backend read itself fails.
    pub async fn resolve(self, store: &dyn PayloadStore) -> Result<String> {
        match self {
            Self::Inline(text) => Ok(text),
            Self::Staged(key) => store.take(&key).await,
        }
    }
}

/// Stages payloads whose UTF-8 length exceeds `threshold_bytes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverflowPolicy {
    threshold_bytes: usize,
}

impl OverflowPolicy {
    #[must_use]
    pub fn new(threshold_bytes: usize) -> Self {
        Self { threshold_bytes }
    }

    /// Returns `true` if `text` must travel by reference.
    #[must_use]
    pub fn exceeds(&self, text: &str) -> bool {
        text.len() > self.threshold_bytes
    }

    /// Carry `text` inline, or stage it under `namespace` when it is too large.
    ///
    /// # Errors
    ///
    /// Returns the store's error if staging fails.
    pub async fn pack(
        &self,
        store: &dyn PayloadStore,
        namespace: &str,
        text: String,
    ) -> Result<Carried> {
        if !self.exceeds(&text) {
            return Ok(Carried::Inline(text));
        }
        let bytes = text.len();
        let key = store.stage(namespace, text).await?;
        tracing::debug!(
            key = %key,
            bytes,
            threshold = self.threshold_bytes,
            "payload over threshold; carried by reference"
        );
        Ok(Carried::Staged(key))
    }

    /// Inverse of [`pack`](Self::pack).
    ///
    /// # Errors
    ///
    /// Returns the store's error if the backend read fails.
    pub async fn unpack(store: &dyn PayloadStore, carried: Carried) -> Result<String> {
        carried.resolve(store).await
    }
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        Self::new(2048)
    }
}
