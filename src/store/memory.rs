//! Process-local payload store.

use super::{PayloadStore, StageKey, StagedEntry, fresh_key};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory [`PayloadStore`]. Staged entries do not survive the process.
#[derive(Debug, Default)]
pub struct MemoryPayloadStore {
    entries: Mutex<HashMap<StageKey, StagedEntry>>,
}

impl MemoryPayloadStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries staged but not yet taken.
    #[must_use]
    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(entries) => entries.len(),
            Err(p) => p.into_inner().len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PayloadStore for MemoryPayloadStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn stage(&self, namespace: &str, value: String) -> Result<StageKey> {
        let key = fresh_key(namespace);
        let bytes = value.len();
        {
            let mut entries = match self.entries.lock() {
                Ok(e) => e,
                Err(p) => p.into_inner(),
            };
            entries.insert(key.clone(), StagedEntry::new(value));
        }
        tracing::debug!(key = %key, bytes, "payload staged");
        Ok(key)
    }

    async fn take(&self, key: &StageKey) -> Result<String> {
        let entry = {
            let mut entries = match self.entries.lock() {
                Ok(e) => e,
                Err(p) => p.into_inner(),
            };
            entries.remove(key)
        };
        match entry {
            Some(entry) => Ok(entry.value),
            None => {
                tracing::debug!(key = %key, "staged payload missing; resolving to empty");
                Ok(String::new())
            }
        }
    }
}
