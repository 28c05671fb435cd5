//! Configuration types for the relay.

use crate::error::{BridgeError, Result};
use crate::locale::Locale;
use crate::relay::ConcurrencyPolicy;
use crate::surface::SurfaceKind;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Switchboard routing and overflow settings.
    pub relay: RelayConfig,
    /// Payload staging backend.
    pub store: StoreConfig,
    /// Streaming-completion detector thresholds.
    pub detector: DetectorConfig,
    /// Surface adapter pacing and plausibility checks.
    pub adapter: AdapterConfig,
    /// Surface page-driver listener.
    pub surfaces: SurfacesConfig,
    /// App-side facade settings.
    pub app: AppConfig,
}

/// Switchboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Payloads longer than this many bytes are staged instead of inlined.
    ///
    /// Applied independently on the outbound and inbound legs.
    pub overflow_threshold_bytes: usize,
    /// Capacity of the relay inbox.
    pub request_capacity: usize,
    /// Capacity of the origin delivery broadcast channel.
    pub event_capacity: usize,
    /// What to do with a chunk that arrives while another is in flight.
    pub concurrency: ConcurrencyPolicy,
    /// Surfaces probed for each chunk, in order. The first open one wins.
    pub surface_order: Vec<SurfaceKind>,
    /// Locale assumed for origins that do not announce one.
    pub default_locale: Locale,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            overflow_threshold_bytes: 2048,
            request_capacity: 64,
            event_capacity: 128,
            concurrency: ConcurrencyPolicy::Overwrite,
            surface_order: vec![SurfaceKind::Claude, SurfaceKind::Gemini],
            default_locale: Locale::He,
        }
    }
}

/// Which payload store implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local map; staged payloads vanish with the process.
    #[default]
    Memory,
    /// One file per staged payload under [`StoreConfig::dir`].
    File,
}

/// Payload staging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store implementation.
    pub backend: StoreBackend,
    /// Staging directory for the file backend (None = platform data dir).
    pub dir: Option<PathBuf>,
}

impl StoreConfig {
    /// Effective staging directory for the file backend.
    #[must_use]
    pub fn effective_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(crate::bridge_dirs::staging_dir)
    }
}

/// Streaming-completion detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Time between polls of the surface, in milliseconds.
    pub poll_interval_ms: u64,
    /// Consecutive polls without the generation indicator required to settle.
    pub quiet_cycles: u32,
    /// Consecutive polls without message growth required to settle.
    pub stable_cycles: u32,
    /// Absolute deadline after which polling stops unconditionally.
    pub hard_timeout_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            quiet_cycles: 3,
            stable_cycles: 2,
            hard_timeout_secs: 300,
        }
    }
}

impl DetectorConfig {
    /// Poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Hard timeout as a [`Duration`].
    #[must_use]
    pub fn hard_timeout(&self) -> Duration {
        Duration::from_secs(self.hard_timeout_secs)
    }
}

/// Surface adapter pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Pause after focusing the input control.
    pub focus_delay_ms: u64,
    /// Pause after clearing stale content.
    pub clear_delay_ms: u64,
    /// Pause after inserting text so the UI can enable its submit control.
    pub settle_delay_ms: u64,
    /// Extracted responses shorter than this many characters are rejected.
    pub min_response_chars: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            focus_delay_ms: 200,
            clear_delay_ms: 100,
            settle_delay_ms: 800,
            min_response_chars: 20,
        }
    }
}

/// Surface page-driver listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfacesConfig {
    /// Loopback address browser agents connect to.
    pub listen_addr: String,
    /// Per page-operation reply deadline, in milliseconds.
    pub op_timeout_ms: u64,
    /// Deadline for a freshly connected agent to announce its surface.
    pub handshake_timeout_ms: u64,
}

impl Default for SurfacesConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8765".to_owned(),
            op_timeout_ms: 10_000,
            handshake_timeout_ms: 5_000,
        }
    }
}

/// App-side facade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Origin id the stdio facade registers under.
    pub origin_id: String,
    /// How long the facade waits for a correlated reply, in seconds.
    ///
    /// Should exceed [`DetectorConfig::hard_timeout_secs`] plus adapter pacing.
    pub request_timeout_secs: u64,
    /// Settings record path (None = platform data dir).
    pub settings_path: Option<PathBuf>,
    /// History log path (None = platform data dir).
    pub history_path: Option<PathBuf>,
    /// Most-recent records kept in the history log.
    pub history_limit: usize,
    /// Most-recent errors kept for diagnostic reports.
    pub error_log_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin_id: "app".to_owned(),
            request_timeout_secs: 330,
            settings_path: None,
            history_path: None,
            history_limit: 50,
            error_log_limit: 10,
        }
    }
}

impl AppConfig {
    /// Effective settings record path.
    #[must_use]
    pub fn effective_settings_path(&self) -> PathBuf {
        self.settings_path
            .clone()
            .unwrap_or_else(crate::bridge_dirs::settings_file)
    }

    /// Effective history log path.
    #[must_use]
    pub fn effective_history_path(&self) -> PathBuf {
        self.history_path
            .clone()
            .unwrap_or_else(crate::bridge_dirs::history_file)
    }

    /// Reply deadline as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| BridgeError::Config(e.to_string()))
    }

    /// Load from `path` if it exists, otherwise return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.is_file() {
            Self::from_file(path)
        } else {
            tracing::info!(path = %path.display(), "no config file; using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| BridgeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the config file path: `$AUTOBRIDGE_CONFIG` or the platform config dir.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        if let Some(path) = std::env::var_os("AUTOBRIDGE_CONFIG") {
            return PathBuf::from(path);
        }
        crate::bridge_dirs::config_file()
    }

    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.relay.overflow_threshold_bytes == 0 {
            return Err(BridgeError::Config(
                "relay.overflow_threshold_bytes must be greater than 0".into(),
            ));
        }
        if self.relay.surface_order.is_empty() {
            return Err(BridgeError::Config(
                "relay.surface_order must name at least one surface".into(),
            ));
        }
        let mut seen = Vec::with_capacity(self.relay.surface_order.len());
        for kind in &self.relay.surface_order {
            if seen.contains(kind) {
                return Err(BridgeError::Config(format!(
                    "relay.surface_order lists {} twice",
                    kind.as_str()
                )));
            }
            seen.push(*kind);
        }
        if self.detector.poll_interval_ms == 0 {
            return Err(BridgeError::Config(
                "detector.poll_interval_ms must be greater than 0".into(),
            ));
        }
        if self.detector.quiet_cycles == 0 || self.detector.stable_cycles == 0 {
            return Err(BridgeError::Config(
                "detector.quiet_cycles and detector.stable_cycles must be greater than 0".into(),
            ));
        }
        if self.detector.hard_timeout_secs == 0 {
            return Err(BridgeError::Config(
                "detector.hard_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.surfaces.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(BridgeError::Config(format!(
                "surfaces.listen_addr `{}` is not a socket address",
                self.surfaces.listen_addr
            )));
        }
        if self.surfaces.op_timeout_ms == 0 {
            return Err(BridgeError::Config(
                "surfaces.op_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.app.origin_id.trim().is_empty() {
            return Err(BridgeError::Config("app.origin_id cannot be empty".into()));
        }
        if self.app.request_timeout_secs == 0 {
            return Err(BridgeError::Config(
                "app.request_timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
