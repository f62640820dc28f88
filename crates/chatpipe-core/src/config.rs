//! Settings resolution for chatpipe.
//!
//! Resolution order (later wins):
//! 1. Built-in defaults
//! 2. Settings file (`--config`, or the global file if present)
//! 3. Environment variables
//! 4. CLI arguments (applied by the binary)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Chat channel the bridge reads from and writes to.
    pub relay_channel_id: Option<String>,
    /// `host:port` of the chat gateway for the TCP adapter.
    pub adapter_addr: Option<String>,
    pub log_level: String,
    pub log_json: bool,
    /// Per-listener queue depth for event channels.
    pub listener_capacity: usize,
    /// How long to wait for stdout/stderr to drain after the child exits.
    pub drain_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            relay_channel_id: None,
            adapter_addr: None,
            log_level: "info".to_string(),
            log_json: false,
            listener_capacity: crate::broadcast::DEFAULT_LISTENER_CAPACITY,
            drain_timeout_ms: 2_000,
        }
    }
}

impl Settings {
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Load settings from `explicit` (which must exist) or the global settings
/// file, then apply environment overrides.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let mut settings = match explicit {
        Some(path) => load_settings_file(path)?,
        None => match global_settings_path() {
            Some(path) if path.exists() => load_settings_file(&path)?,
            _ => Settings::default(),
        },
    };
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

/// Load settings from `path` and apply overrides from the `var` lookup.
pub fn load_settings_from(path: &Path, var: impl Fn(&str) -> Option<String>) -> Result<Settings> {
    let mut settings = load_settings_file(path)?;
    apply_env_overrides(&mut settings, var);
    Ok(settings)
}

/// Global settings file: `<config dir>/chatpipe/settings.json`.
pub fn global_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("chatpipe").join("settings.json"))
}

fn load_settings_file(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read settings file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse settings file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("CHATPIPE_CHANNEL_ID") {
        settings.relay_channel_id = Some(val);
    }
    if let Some(val) = var("CHATPIPE_ADAPTER_ADDR") {
        settings.adapter_addr = Some(val);
    }
    if let Some(val) = var("CHATPIPE_LOG_LEVEL") {
        settings.log_level = val;
    }
    if let Some(n) = var("CHATPIPE_LISTENER_CAPACITY").and_then(|v| v.parse().ok()) {
        settings.listener_capacity = n;
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.listener_capacity, 1);
        assert_eq!(settings.drain_timeout(), Duration::from_secs(2));
        assert!(settings.relay_channel_id.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"relay_channel_id": "1234", "log_json": true}"#).unwrap();

        let settings = load_settings_file(&path).unwrap();
        assert_eq!(settings.relay_channel_id.as_deref(), Some("1234"));
        assert!(settings.log_json);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("CHATPIPE_CHANNEL_ID", "general"),
            ("CHATPIPE_LOG_LEVEL", "debug"),
            ("CHATPIPE_LISTENER_CAPACITY", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings {
            relay_channel_id: Some("from-file".to_string()),
            ..Settings::default()
        };
        apply_env_overrides(&mut settings, |k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(settings.relay_channel_id.as_deref(), Some("general"));
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.listener_capacity, 1);
    }
}
