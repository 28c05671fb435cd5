//! Centralized filesystem paths for the relay.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/autobridge/` | `~/.local/share/autobridge/` |
//! | Config | `~/Library/Application Support/autobridge/` | `~/.config/autobridge/` |
//!
//! # Environment Overrides
//!
//! - `AUTOBRIDGE_DATA_DIR` overrides [`data_dir`]
//! - `AUTOBRIDGE_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Holds the file-backed payload staging area, the settings record and the
/// history log.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("AUTOBRIDGE_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("autobridge"))
        .unwrap_or_else(|| PathBuf::from("/tmp/autobridge-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("AUTOBRIDGE_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("autobridge"))
        .unwrap_or_else(|| PathBuf::from("/tmp/autobridge-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Payload staging directory for the file-backed store (`data_dir()/staging/`).
#[must_use]
pub fn staging_dir() -> PathBuf {
    data_dir().join("staging")
}

/// App settings record (`data_dir()/settings.json`).
#[must_use]
pub fn settings_file() -> PathBuf {
    data_dir().join("settings.json")
}

/// Bounded request history (`data_dir()/history.json`).
#[must_use]
pub fn history_file() -> PathBuf {
    data_dir().join("history.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_is_nonempty() {
        assert!(!data_dir().as_os_str().is_empty());
    }

    #[test]
    fn config_file_ends_with_config_toml() {
        let path = config_file();
        let s = path.to_string_lossy();
        assert!(s.ends_with("config.toml"), "config_file: {s}");
    }

    #[test]
    fn staging_dir_is_subpath_of_data_dir() {
        let staging = staging_dir();
        let data = data_dir();
        assert!(
            staging.starts_with(&data),
            "staging_dir ({}) should start with data_dir ({})",
            staging.display(),
            data.display()
        );
    }

    #[test]
    fn persisted_records_are_json() {
        assert!(settings_file().to_string_lossy().ends_with("settings.json"));
        assert!(history_file().to_string_lossy().ends_with("history.json"));
    }
}
