//! Bootstrap configuration and persisted view preferences
//!
//! Config file path resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`VTP_CONFIG`)
//! 3. User config directory (`<config_dir>/vtp/config.toml`)
//!
//! A missing or unreadable file never terminates the process. A warning is
//! logged and compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "VTP_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Pipeline backend connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Review workflow tuning
    #[serde(default)]
    pub review: ReviewConfig,

    /// View toggles persisted across runs
    #[serde(default)]
    pub view: ViewPreferences,
}

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the pipeline API, e.g. `http://localhost:8010/api`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path prefix for the job and stage endpoints
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Timeout for request/response calls. Streamed stages are not bounded by it.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_prefix: default_api_prefix(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BackendConfig {
    /// Base URL joined with the API prefix, without a trailing slash
    pub fn api_base(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, prefix)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Review workflow tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Segments fetched per catalog page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Auto-reject: segments below this SNR (dB) are rejected
    #[serde(default = "default_snr_floor_db")]
    pub snr_floor_db: f64,

    /// Auto-reject: segments below this speech ratio are rejected
    #[serde(default = "default_speech_floor")]
    pub speech_floor: f64,

    /// Auto-reject: segments shorter than this (seconds) are rejected
    #[serde(default = "default_duration_floor_secs")]
    pub duration_floor_secs: f64,

    /// Catalogs larger than this switch performance mode on
    #[serde(default = "default_perf_mode_threshold")]
    pub perf_mode_threshold: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            snr_floor_db: default_snr_floor_db(),
            speech_floor: default_speech_floor(),
            duration_floor_secs: default_duration_floor_secs(),
            perf_mode_threshold: default_perf_mode_threshold(),
        }
    }
}

/// View toggles persisted across runs
///
/// Loaded once at startup and written back whenever a toggle changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPreferences {
    /// Lightweight rows, no waveform or timeline
    #[serde(default)]
    pub perf_mode: bool,

    /// Compact rows
    #[serde(default)]
    pub compact: bool,

    #[serde(default = "default_true")]
    pub show_timeline: bool,

    #[serde(default = "default_true")]
    pub show_trays: bool,
}

impl Default for ViewPreferences {
    fn default() -> Self {
        Self {
            perf_mode: false,
            compact: false,
            show_timeline: true,
            show_trays: true,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8010/api".to_string()
}

fn default_api_prefix() -> String {
    "/legacy".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_page_size() -> usize {
    200
}

fn default_snr_floor_db() -> f64 {
    8.0
}

fn default_speech_floor() -> f64 {
    0.5
}

fn default_duration_floor_secs() -> f64 {
    1.0
}

fn default_perf_mode_threshold() -> usize {
    2000
}

fn default_true() -> bool {
    true
}

/// Where the config file path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    UserConfigDir,
}

/// Resolved config file location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    pub path: PathBuf,
    pub source: ConfigSource,
}

/// Resolve the config file path by priority order
///
/// Returns `None` only when no argument or variable is given and the
/// platform has no user config directory.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<ConfigLocation> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(ConfigLocation {
            path: path.to_path_buf(),
            source: ConfigSource::CommandLine,
        });
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(ConfigLocation {
                path: PathBuf::from(path),
                source: ConfigSource::Environment,
            });
        }
    }

    // Priority 3: User config directory
    default_config_path().map(|path| ConfigLocation {
        path,
        source: ConfigSource::UserConfigDir,
    })
}

/// Platform config file location (`~/.config/vtp/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vtp").join("config.toml"))
}

/// Read and parse a TOML config file, failing on any error
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(config)
}

/// Load configuration with graceful degradation
///
/// Missing file: info log, defaults. Unparseable file: warning, defaults.
pub fn load_config(location: Option<&ConfigLocation>) -> TomlConfig {
    let Some(location) = location else {
        warn!("No config location available, using compiled defaults");
        return TomlConfig::default();
    };

    if !location.path.exists() {
        info!(
            path = %location.path.display(),
            source = ?location.source,
            "Config file not found, using compiled defaults"
        );
        return TomlConfig::default();
    }

    match read_toml_config(&location.path) {
        Ok(config) => {
            debug!(path = %location.path.display(), "Loaded config file");
            config
        }
        Err(e) => {
            warn!(
                path = %location.path.display(),
                error = %e,
                "Config file unreadable, using compiled defaults"
            );
            TomlConfig::default()
        }
    }
}

/// Write config atomically: serialize to `<path>.tmp`, then rename over `path`
///
/// Parent directories are created as needed.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    let tmp_path = temp_path_for(path)?;
    std::fs::write(&tmp_path, content)?;

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::Io(e));
    }

    debug!(path = %path.display(), "Wrote config file");
    Ok(())
}

fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Config(format!("Config path has no file name: {}", path.display())))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    Ok(path.with_file_name(tmp_name))
}

/// View preferences bound to the config file they persist into
///
/// Writes preserve every other section of the file.
#[derive(Debug, Clone)]
pub struct ViewPreferencesStore {
    path: Option<PathBuf>,
    current: ViewPreferences,
}

impl ViewPreferencesStore {
    /// Load preferences at startup
    pub fn load(location: Option<&ConfigLocation>) -> Self {
        let current = load_config(location).view;
        Self {
            path: location.map(|l| l.path.clone()),
            current,
        }
    }

    /// In-memory store that never touches disk
    pub fn in_memory(current: ViewPreferences) -> Self {
        Self {
            path: None,
            current,
        }
    }

    pub fn get(&self) -> ViewPreferences {
        self.current
    }

    /// Apply a change and persist it when anything actually changed
    ///
    /// Returns whether the preferences changed. A failed write keeps the
    /// in-memory change and is reported as a warning only.
    pub fn update<F>(&mut self, change: F) -> bool
    where
        F: FnOnce(&mut ViewPreferences),
    {
        let mut next = self.current;
        change(&mut next);
        if next == self.current {
            return false;
        }
        self.current = next;

        if let Some(path) = &self.path {
            if let Err(e) = self.persist(path) {
                warn!(path = %path.display(), error = %e, "Failed to save view preferences");
            }
        }
        true
    }

    fn persist(&self, path: &Path) -> Result<()> {
        let mut config = if path.exists() {
            read_toml_config(path)?
        } else {
            TomlConfig::default()
        };
        config.view = self.current;
        write_toml_config(&config, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_joins_prefix() {
        let backend = BackendConfig {
            base_url: "http://host:8010/api/".to_string(),
            api_prefix: "/legacy".to_string(),
            request_timeout_secs: 5,
        };
        assert_eq!(backend.api_base(), "http://host:8010/api/legacy");
    }

    #[test]
    fn test_api_base_without_prefix() {
        let backend = BackendConfig {
            api_prefix: String::new(),
            ..BackendConfig::default()
        };
        assert_eq!(backend.api_base(), "http://localhost:8010/api");
    }

    #[test]
    fn test_default_log_level() {
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn test_temp_path_appends_suffix() {
        let tmp = temp_path_for(Path::new("/a/b/config.toml")).unwrap();
        assert_eq!(tmp, PathBuf::from("/a/b/config.toml.tmp"));
    }

    #[test]
    fn test_in_memory_store_reports_changes() {
        let mut store = ViewPreferencesStore::in_memory(ViewPreferences::default());
        assert!(store.update(|p| p.perf_mode = true));
        assert!(!store.update(|p| p.perf_mode = true), "No-op change is not a change");
        assert!(store.get().perf_mode);
    }
}
