//! App settings and request history persistence.
//!
//! Both live as JSON under the data directory (see
//! [`crate::bridge_dirs::settings_file`] and
//! [`crate::bridge_dirs::history_file`]). Missing or unreadable files load as
//! defaults; a settings file that names only some fields keeps the defaults
//! for the rest.

use crate::error::{BridgeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which assistant the user asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelChoice {
    #[default]
    Claude,
    Gemini,
    /// Whatever surface the relay finds open.
    Bridge,
}

impl std::fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Claude => write!(f, "claude"),
            Self::Gemini => write!(f, "gemini"),
            Self::Bridge => write!(f, "bridge"),
        }
    }
}

/// User-facing processing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub model: ModelChoice,
    /// Run filler cleanup before chunking.
    pub preprocess_enabled: bool,
    /// Maximum chunk length in chars.
    pub chunk_size: usize,
    /// Chars shared between consecutive chunks.
    pub overlap: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            model: ModelChoice::Claude,
            preprocess_enabled: true,
            chunk_size: 150_000,
            overlap: 200,
        }
    }
}

impl AppSettings {
    /// Load settings, falling back to defaults if the file is missing or
    /// cannot be parsed.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(_) => return Self::default(),
        };
        match serde_json::from_slice(&bytes) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "settings unreadable, using defaults");
                Self::default()
            }
        }
    }

    /// Persist settings to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Persist`] if the directory cannot be created
    /// or the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }
}

/// One completed transcript run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub date: DateTime<Utc>,
    pub model: ModelChoice,
    /// The first chunk that was sent.
    pub text: String,
}

/// Bounded history, most recent first.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
    limit: usize,
    records: Vec<HistoryRecord>,
}

impl HistoryLog {
    /// Load the log at `path`, keeping at most `limit` records.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>, limit: usize) -> Self {
        let path = path.into();
        let mut records: Vec<HistoryRecord> = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "history unreadable, starting empty");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };
        records.truncate(limit);
        Self {
            path,
            limit,
            records,
        }
    }

    #[must_use]
    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    /// Prepend `record`, drop the oldest past the limit and write the log.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Persist`] if the log cannot be written. The
    /// in-memory log is updated either way.
    pub fn push(&mut self, record: HistoryRecord) -> Result<()> {
        self.records.insert(0, record);
        self.records.truncate(self.limit);
        write_json(&self.path, &self.records)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            BridgeError::Persist(format!("cannot create {}: {e}", parent.display()))
        })?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| BridgeError::Persist(format!("cannot serialize {}: {e}", path.display())))?;
    std::fs::write(path, json)
        .map_err(|e| BridgeError::Persist(format!("cannot write {}: {e}", path.display())))
}
