//! Configuration loading and root folder resolution
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is never fatal: a warning is logged and defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "QK_ROOT_FOLDER";

/// Shorter alias accepted for the root folder
pub const ROOT_ENV: &str = "QK_ROOT";

/// Default refresh interval between reconciliation passes
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// File names of the persisted artifacts inside the root folder
pub const ARCHIVE_FILE: &str = "quotes.json";
pub const ALIASES_FILE: &str = "aliases.json";
pub const WATERMARK_FILE: &str = "watermark";

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file; stdout when absent
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// On-disk TOML configuration
///
/// Every field is optional so a partial file still parses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the quote archive, alias table and watermark
    #[serde(default)]
    pub root_folder: Option<PathBuf>,
    /// Conversation channel to harvest
    #[serde(default)]
    pub channel_id: Option<u64>,
    /// Folder containing channel export files
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
    /// Seconds between reconciliation passes
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,
    /// Author name the bot posts under; its messages are never harvested
    #[serde(default)]
    pub bot_name: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub refresh_interval_secs: u64,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: default_log_level(),
            log_file: None,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/quotekeeper (or /var/lib/quotekeeper for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("quotekeeper"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/quotekeeper"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("quotekeeper"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/quotekeeper"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("quotekeeper"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\quotekeeper"))
    } else {
        PathBuf::from("./quotekeeper_data")
    }
}

/// Locate the platform config file, if one exists
///
/// Linux checks `~/.config/quotekeeper/config.toml` then
/// `/etc/quotekeeper/config.toml`; other platforms only the user config dir.
pub fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("quotekeeper").join("config.toml"));
    if let Some(path) = user_config.filter(|p| p.exists()) {
        return Some(path);
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/quotekeeper/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }
    None
}

/// Where a loaded [`TomlConfig`] came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// A path was chosen but nothing exists there
    Missing(PathBuf),
    /// No path given and no platform config location
    Unresolved,
}

impl ConfigSource {
    /// Log where the configuration came from
    ///
    /// Call once tracing is installed; the missing-file cases log a warning.
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::Missing(path) => {
                warn!("Config file not found: {}, using defaults", path.display())
            }
            ConfigSource::Unresolved => warn!("No config file found, using defaults"),
        }
    }
}

/// Read a TOML config file without logging
///
/// Missing file → `TomlConfig::default()` and [`ConfigSource::Missing`].
/// Present but unparseable → [`Error::Config`].
pub fn read_toml_config(path: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    let Some(path) = path.map(Path::to_path_buf).or_else(default_config_file) else {
        return Ok((TomlConfig::default(), ConfigSource::Unresolved));
    };

    if !path.exists() {
        return Ok((TomlConfig::default(), ConfigSource::Missing(path)));
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))?;

    Ok((config, ConfigSource::File(path)))
}

/// Load a TOML config file, logging where it came from
///
/// Missing file → `TomlConfig::default()` with a warning.
/// Present but unparseable → [`Error::Config`].
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let (config, source) = read_toml_config(path)?;
    source.log();
    Ok(config)
}

/// Write a TOML config atomically (temp file + rename, 0600 on Unix)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    crate::persist::write_atomic(path, content.as_bytes())
}

/// True if the TOML file is readable by group or others
#[cfg(unix)]
pub fn check_toml_permissions_loose(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)?.permissions().mode();
    Ok(mode & 0o077 != 0)
}

/// Root folder resolution following the 4-tier priority order
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    /// Root folder given on the command line
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Root folder read from the TOML file
    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            debug!("{}: root folder from command line", self.module_name);
            return path.clone();
        }

        // Priority 2: Environment variables
        for var in [ROOT_FOLDER_ENV, ROOT_ENV] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    debug!("{}: root folder from {}", self.module_name, var);
                    return PathBuf::from(path);
                }
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &self.toml_root {
            debug!("{}: root folder from TOML config", self.module_name);
            return path.clone();
        }

        // Priority 4: Compiled default
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and names the artifact paths inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            debug!("Created root folder {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn archive_path(&self) -> PathBuf {
        self.root_folder.join(ARCHIVE_FILE)
    }

    pub fn aliases_path(&self) -> PathBuf {
        self.root_folder.join(ALIASES_FILE)
    }

    pub fn watermark_path(&self) -> PathBuf {
        self.root_folder.join(WATERMARK_FILE)
    }
}
