//! Configuration resolution, graceful degradation and persistence tests
//!
//! Uses serial_test to prevent ENV variable race conditions. Tests that
//! manipulate VTP_CONFIG are marked with #[serial].

use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;
use vtp_common::config::{
    load_config, read_toml_config, resolve_config_path, write_toml_config, ConfigLocation,
    ConfigSource, TomlConfig, ViewPreferences, ViewPreferencesStore, CONFIG_ENV_VAR,
};

fn location(path: PathBuf) -> ConfigLocation {
    ConfigLocation {
        path,
        source: ConfigSource::CommandLine,
    }
}

#[test]
#[serial]
fn test_cli_argument_beats_environment() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/vtp-env.toml");

    let resolved = resolve_config_path(Some(&PathBuf::from("/tmp/vtp-cli.toml"))).unwrap();
    assert_eq!(resolved.path, PathBuf::from("/tmp/vtp-cli.toml"));
    assert_eq!(resolved.source, ConfigSource::CommandLine);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_used_without_cli_argument() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/vtp-env.toml");

    let resolved = resolve_config_path(None).unwrap();
    assert_eq!(resolved.path, PathBuf::from("/tmp/vtp-env.toml"));
    assert_eq!(resolved.source, ConfigSource::Environment);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_blank_environment_falls_through_to_user_dir() {
    env::set_var(CONFIG_ENV_VAR, "  ");

    if let Some(resolved) = resolve_config_path(None) {
        assert_eq!(resolved.source, ConfigSource::UserConfigDir);
        assert!(resolved.path.ends_with("vtp/config.toml"));
    }

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_missing_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_config(Some(&location(temp_dir.path().join("absent.toml"))));

    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.backend.api_base(), "http://localhost:8010/api/legacy");
    assert_eq!(config.review.perf_mode_threshold, 2000);
}

#[test]
fn test_malformed_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[backend\nbase_url = ").unwrap();

    assert!(read_toml_config(&path).is_err());
    assert_eq!(load_config(Some(&location(path))), TomlConfig::default());
}

#[test]
fn test_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        [backend]
        base_url = "http://gpu-box:9000/api"

        [view]
        perf_mode = true
        "#,
    )
    .unwrap();

    let config = load_config(Some(&location(path)));
    assert_eq!(config.backend.base_url, "http://gpu-box:9000/api");
    assert_eq!(config.backend.api_prefix, "/legacy");
    assert!(config.view.perf_mode);
    assert!(config.view.show_timeline, "Unset toggles keep their defaults");
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_atomic_write_leaves_no_temp_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");

    write_toml_config(&TomlConfig::default(), &path).unwrap();

    assert!(path.exists());
    assert!(!temp_dir.path().join("nested").join("config.toml.tmp").exists());
    assert_eq!(read_toml_config(&path).unwrap(), TomlConfig::default());
}

#[test]
fn test_view_preferences_save_preserves_other_sections() {
    // Given: a config file with a custom backend
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    let mut initial = TomlConfig::default();
    initial.backend.base_url = "http://gpu-box:9000/api".to_string();
    write_toml_config(&initial, &path).unwrap();

    // When: a view toggle changes
    let loc = location(path.clone());
    let mut store = ViewPreferencesStore::load(Some(&loc));
    assert!(store.update(|p| {
        p.perf_mode = true;
        p.show_trays = false;
    }));

    // Then: the toggle persisted and the backend section survived
    let saved = read_toml_config(&path).unwrap();
    assert_eq!(saved.backend.base_url, "http://gpu-box:9000/api");
    assert_eq!(
        saved.view,
        ViewPreferences {
            perf_mode: true,
            compact: false,
            show_timeline: true,
            show_trays: false,
        }
    );

    // And: a fresh load at startup sees the saved toggles
    let reloaded = ViewPreferencesStore::load(Some(&loc));
    assert_eq!(reloaded.get(), saved.view);
}
