//! File-backed payload store: one JSON file per staged key.

use super::{PayloadStore, StageKey, StagedEntry, fresh_key};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Fresh keys tried before giving up on a directory full of collisions.
const MAX_STAGE_ATTEMPTS: usize = 16;

/// [`PayloadStore`] writing `<dir>/<key>.json` files.
///
/// Files are opened with `create_new`, so a key already present on disk
/// (e.g. left by another process) is detected and a newer stamp is tried.
#[derive(Debug, Clone)]
pub struct FilePayloadStore {
    dir: PathBuf,
}

impl FilePayloadStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &StageKey) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

/// Await `write`; if it fails, remove the partially written file at `path`.
async fn write_or_discard(
    path: &Path,
    write: impl Future<Output = std::io::Result<()>>,
) -> std::io::Result<()> {
    let result = write.await;
    if let Err(e) = &result {
        tracing::warn!(path = %path.display(), error = %e, "stage write failed; removing partial file");
        if let Err(rm) = tokio::fs::remove_file(path).await {
            tracing::debug!(path = %path.display(), error = %rm, "partial file already gone");
        }
    }
    result
}

#[async_trait]
impl PayloadStore for FilePayloadStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn stage(&self, namespace: &str, value: String) -> Result<StageKey> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = value.len();
        let body = serde_json::to_vec(&StagedEntry::new(value))?;
        let body = body.as_slice();

        for _ in 0..MAX_STAGE_ATTEMPTS {
            let key = fresh_key(namespace);
            let path = self.path_for(&key);
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!(key = %key, "stage key collision; bumping");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            write_or_discard(&path, async move {
                file.write_all(body).await?;
                file.sync_all().await
            })
            .await?;
            tracing::debug!(key = %key, bytes, path = %path.display(), "payload staged");
            return Ok(key);
        }

        Err(BridgeError::Store(format!(
            "no free stage key in {} after {MAX_STAGE_ATTEMPTS} attempts",
            self.dir.display()
        )))
    }

    async fn take(&self, key: &StageKey) -> Result<String> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(key = %key, "staged payload missing; resolving to empty");
                return Ok(String::new());
            }
            Err(e) => return Err(e.into()),
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            // Lost a race with another reader; this read still counts.
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let entry: StagedEntry = serde_json::from_slice(&raw).map_err(|e| {
            BridgeError::Store(format!("corrupt staged entry {}: {e}", path.display()))
        })?;
        Ok(entry.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stage_take_deletes_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = FilePayloadStore::new(dir.path().join("staging"));

        let value = "x".repeat(5000);
        let key = store
            .stage("bridge_payload", value.clone())
            .await
            .expect("stage in test");
        let path = store.path_for(&key);
        assert!(path.is_file());

        assert_eq!(store.take(&key).await.expect("take in test"), value);
        assert!(!path.exists());
        assert_eq!(store.take(&key).await.expect("take in test"), "");
    }

    #[tokio::test]
    async fn existing_file_is_never_overwritten() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = FilePayloadStore::new(dir.path());

        let first = store.stage("ns", "one".into()).await.expect("stage in test");
        let second = store.stage("ns", "two".into()).await.expect("stage in test");
        assert_ne!(first, second);
        assert_eq!(store.take(&first).await.expect("take in test"), "one");
        assert_eq!(store.take(&second).await.expect("take in test"), "two");
    }

    #[tokio::test]
    async fn failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = FilePayloadStore::new(dir.path());
        let key = StageKey::parse("bridge_payload_42").expect("valid key in test");
        let path = store.path_for(&key);
        std::fs::write(&path, b"{\"value\":\"trunc").expect("write fixture");

        let err = write_or_discard(&path, async {
            Err::<(), _>(std::io::Error::new(ErrorKind::StorageFull, "disk full"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageFull);
        assert!(!path.exists());
        assert_eq!(store.take(&key).await.expect("take in test"), "");
    }

    #[tokio::test]
    async fn successful_write_keeps_the_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("entry.json");
        std::fs::write(&path, b"{}").expect("write fixture");

        write_or_discard(&path, async { Ok::<(), std::io::Error>(()) })
            .await
            .expect("write in test");
        assert!(path.is_file());
    }

    #[tokio::test]
    async fn corrupt_entry_is_store_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = FilePayloadStore::new(dir.path());
        let key = StageKey::parse("bridge_result_99").expect("valid key in test");
        std::fs::write(store.path_for(&key), b"not json").expect("write fixture");

        let err = store.take(&key).await.unwrap_err();
        assert!(matches!(err, BridgeError::Store(_)));
        assert!(!store.path_for(&key).exists());
    }
}
