//! Unit tests for configuration and graceful degradation
//!
//! Covers:
//! - Missing TOML files do not cause termination
//! - Missing configs → defaults
//! - Priority order for root folder resolution
//! - Automatic root folder creation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate QK_ROOT_FOLDER or QK_ROOT are marked with #[serial].

use qk_common::config::{
    load_toml_config, read_toml_config, CompiledDefaults, ConfigSource, LoggingConfig,
    RootFolderInitializer, RootFolderResolver, TomlConfig, DEFAULT_REFRESH_INTERVAL_SECS,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_root_env() {
    env::remove_var("QK_ROOT_FOLDER");
    env::remove_var("QK_ROOT");
}

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.to_string_lossy().contains("quotekeeper"));
    assert_eq!(defaults.log_level, "info");
    assert!(defaults.log_file.is_none());
    assert_eq!(defaults.refresh_interval_secs, DEFAULT_REFRESH_INTERVAL_SECS);
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    clear_root_env();

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var_qk_root_folder() {
    clear_root_env();
    env::set_var("QK_ROOT_FOLDER", "/tmp/qk-test-env-folder");

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/qk-test-env-folder"));

    clear_root_env();
}

#[test]
#[serial]
fn test_resolver_qk_root_folder_takes_precedence() {
    clear_root_env();
    env::set_var("QK_ROOT_FOLDER", "/tmp/qk-priority-1");
    env::set_var("QK_ROOT", "/tmp/qk-priority-2");

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/qk-priority-1"));

    clear_root_env();
}

#[test]
#[serial]
fn test_resolver_cli_beats_env_and_toml() {
    clear_root_env();
    env::set_var("QK_ROOT", "/tmp/qk-from-env");

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/qk-from-toml")),
        ..TomlConfig::default()
    };
    let resolver = RootFolderResolver::new("test-module")
        .with_toml(&toml)
        .with_cli_arg(Some(PathBuf::from("/tmp/qk-from-cli")));
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/qk-from-cli"));

    clear_root_env();
}

#[test]
#[serial]
fn test_resolver_env_beats_toml() {
    clear_root_env();
    env::set_var("QK_ROOT", "/tmp/qk-from-env");

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/qk-from-toml")),
        ..TomlConfig::default()
    };
    let resolver = RootFolderResolver::new("test-module").with_toml(&toml);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/qk-from-env"));

    clear_root_env();
}

#[test]
#[serial]
fn test_resolver_uses_toml_without_env() {
    clear_root_env();

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/qk-from-toml")),
        ..TomlConfig::default()
    };
    let resolver = RootFolderResolver::new("test-module").with_toml(&toml);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/qk-from-toml"));
}

#[test]
fn test_initializer_creates_directory_and_names_artifacts() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("nested").join("qk");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(initializer.archive_path(), root.join("quotes.json"));
    assert_eq!(initializer.aliases_path(), root.join("aliases.json"));
    assert_eq!(initializer.watermark_path(), root.join("watermark"));

    // Second call is a no-op
    initializer.ensure_directory_exists().unwrap();
}

#[test]
fn test_missing_toml_file_gives_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_toml_config(Some(&temp_dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_read_reports_config_source() {
    let temp_dir = TempDir::new().unwrap();
    let absent = temp_dir.path().join("absent.toml");
    let (config, source) = read_toml_config(Some(&absent)).unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(source, ConfigSource::Missing(absent));

    let present = temp_dir.path().join("config.toml");
    std::fs::write(&present, "channel_id = 7\n").unwrap();
    let (config, source) = read_toml_config(Some(&present)).unwrap();
    assert_eq!(config.channel_id, Some(7));
    assert_eq!(source, ConfigSource::File(present));
}

#[test]
fn test_partial_toml_file_parses() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "channel_id = 4242\n[logging]\nlevel = \"debug\"\n").unwrap();

    let config = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.channel_id, Some(4242));
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.file.is_none());
    assert!(config.root_folder.is_none());
    assert!(config.refresh_interval_secs.is_none());
}

#[test]
fn test_unparseable_toml_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "channel_id = \"not a number\"\n").unwrap();

    let err = load_toml_config(Some(&path)).unwrap_err();
    assert!(matches!(err, qk_common::Error::Config(_)));
}

#[test]
fn test_logging_config_default() {
    let logging = LoggingConfig::default();
    assert_eq!(logging.level, "info");
    assert!(logging.file.is_none());
}
