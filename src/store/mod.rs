//! Out-of-band staging for payloads too large for a direct message.
//!
//! A producer [`stage`](PayloadStore::stage)s a value and passes only the
//! returned [`StageKey`] through the size-limited channel; the consumer
//! [`take`](PayloadStore::take)s it, which deletes the entry. Entries are
//! write-once/read-once, so no locking beyond the backend's own is needed.
//!
//! A key never read leaks until process exit (memory backend) or stays on
//! disk (file backend). There is no TTL.

mod fs;
mod memory;
mod overflow;

pub use fs::FilePayloadStore;
pub use memory::MemoryPayloadStore;
pub use overflow::{Carried, OverflowPolicy};

use crate::config::{StoreBackend, StoreConfig};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Namespace for chunks travelling origin -> relay.
pub const PAYLOAD_NAMESPACE: &str = "bridge_payload";

/// Namespace for results travelling relay -> origin.
pub const RESULT_NAMESPACE: &str = "bridge_result";

/// Key of a staged entry: `<namespace>_<timestamp-millis>`.
///
/// Keys arrive from the wire, so parsing restricts them to ASCII
/// alphanumerics and `_`; a key is always safe to use as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StageKey(String);

impl StageKey {
    fn from_parts(namespace: &str, stamp: i64) -> Self {
        Self(format!("{namespace}_{stamp}"))
    }

    /// Validate a key received from a peer.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= 128
            && raw.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
            && raw.rsplit_once('_').is_some_and(|(ns, stamp)| {
                !ns.is_empty() && !stamp.is_empty() && stamp.bytes().all(|b| b.is_ascii_digit())
            });
        valid.then(|| Self(raw.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StageKey {
    type Error = String;

    fn try_from(raw: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| format!("invalid stage key `{raw}`"))
    }
}

impl From<StageKey> for String {
    fn from(key: StageKey) -> Self {
        key.0
    }
}

/// A staged value with its write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedEntry {
    pub value: String,
    pub created_at: DateTime<Utc>,
}

impl StagedEntry {
    #[must_use]
    pub fn new(value: String) -> Self {
        Self {
            value,
            created_at: Utc::now(),
        }
    }
}

/// Write-once, read-once-and-delete key/value staging area.
#[async_trait]
pub trait PayloadStore: Send + Sync + 'static {
    /// Backend name for logs.
    fn backend(&self) -> &'static str;

    /// Durably store `value` under a fresh key in `namespace`.
    ///
    /// The key is returned only after the write has completed.
    async fn stage(&self, namespace: &str, value: String) -> Result<StageKey>;

    /// Read and delete the entry under `key`.
    ///
    /// An absent key yields an empty string, not an error.
    async fn take(&self, key: &StageKey) -> Result<String>;
}

/// Build the store selected by `config`.
#[must_use]
pub fn open(config: &StoreConfig) -> Arc<dyn PayloadStore> {
    match config.backend {
        StoreBackend::Memory => Arc::new(MemoryPayloadStore::new()),
        StoreBackend::File => Arc::new(FilePayloadStore::new(config.effective_dir())),
    }
}

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Millisecond timestamp that is strictly greater than every earlier stamp
/// handed out by this process.
pub(crate) fn next_stamp() -> i64 {
    let now = Utc::now().timestamp_millis();
    let prev = LAST_STAMP
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    now.max(prev + 1)
}

pub(crate) fn fresh_key(namespace: &str) -> StageKey {
    StageKey::from_parts(namespace, next_stamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_strictly_increase() {
        let mut last = next_stamp();
        for _ in 0..1000 {
            let next = next_stamp();
            assert!(next > last, "{next} should exceed {last}");
            last = next;
        }
    }

    #[test]
    fn fresh_keys_are_namespaced_and_unique() {
        let a = fresh_key(RESULT_NAMESPACE);
        let b = fresh_key(RESULT_NAMESPACE);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("bridge_result_"));
    }

    #[test]
    fn parse_rejects_path_like_keys() {
        assert!(StageKey::parse("bridge_payload_1712345678901").is_some());
        assert!(StageKey::parse("../etc/passwd").is_none());
        assert!(StageKey::parse("bridge_payload_12a").is_none());
        assert!(StageKey::parse("nounderscore").is_none());
        assert!(StageKey::parse("_123").is_none());
        assert!(StageKey::parse("").is_none());
    }

    #[test]
    fn key_deserialization_validates() {
        let ok: StageKey =
            serde_json::from_str("\"bridge_result_42\"").expect("valid key in test");
        assert_eq!(ok.as_str(), "bridge_result_42");
        assert!(serde_json::from_str::<StageKey>("\"a/b_1\"").is_err());
    }

    #[test]
    fn open_selects_backend() {
        let memory = open(&StoreConfig::default());
        assert_eq!(memory.backend(), "memory");

        let dir = tempfile::tempdir().expect("create temp dir");
        let file = open(&StoreConfig {
            backend: StoreBackend::File,
            dir: Some(dir.path().to_path_buf()),
        });
        assert_eq!(file.backend(), "file");
    }
}
