//! Configuration resolution for qk-harvester
//!
//! Provides multi-tier configuration resolution with CLI → ENV → TOML →
//! compiled default priority. Command-line values arrive already merged with
//! their environment fallbacks (clap `env =`), so this module only layers them
//! over the TOML file and the defaults.

use crate::error::{HarvestError, Result};
use qk_common::config::{CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig};
use qk_common::time;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Folder under the root that holds channel exports unless configured otherwise
pub const DEFAULT_EXPORT_SUBDIR: &str = "exports";

/// Values given on the command line (or their environment variables)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub channel_id: Option<u64>,
    pub export_dir: Option<PathBuf>,
    pub refresh_interval_secs: Option<u64>,
    pub bot_name: Option<String>,
    pub log_level: Option<String>,
}

/// Fully resolved harvester configuration
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestConfig {
    pub root_folder: PathBuf,
    pub channel_id: u64,
    pub export_dir: PathBuf,
    pub refresh_interval: Duration,
    pub bot_name: Option<String>,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl HarvestConfig {
    /// Resolve every setting from the CLI, the TOML file and the defaults
    ///
    /// A missing or zero channel id and a zero refresh interval are
    /// [`HarvestError::ConfigInvalid`].
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::for_current_platform();

        let root_folder = RootFolderResolver::new("qk-harvester")
            .with_cli_arg(cli.root_folder.clone())
            .with_toml(toml)
            .resolve();

        let channel_id = pick("channel_id", cli.channel_id, toml.channel_id).ok_or_else(|| {
            HarvestError::ConfigInvalid(
                "channel id not configured. Please configure using one of:\n\
                 1. Command line: --channel-id <ID>\n\
                 2. Environment: QK_CHANNEL_ID=<ID>\n\
                 3. TOML config: channel_id = <ID>"
                    .to_string(),
            )
        })?;
        if channel_id == 0 {
            return Err(HarvestError::ConfigInvalid("channel id must be non-zero".to_string()));
        }

        let export_dir = pick("export_dir", cli.export_dir.clone(), toml.export_dir.clone())
            .unwrap_or_else(|| root_folder.join(DEFAULT_EXPORT_SUBDIR));

        let interval_secs = pick(
            "refresh_interval_secs",
            cli.refresh_interval_secs,
            toml.refresh_interval_secs,
        )
        .unwrap_or(defaults.refresh_interval_secs);
        if interval_secs == 0 {
            return Err(HarvestError::ConfigInvalid(
                "refresh interval must be at least 1 second".to_string(),
            ));
        }

        let bot_name = pick("bot_name", cli.bot_name.clone(), toml.bot_name.clone())
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let log_level = cli
            .log_level
            .clone()
            .unwrap_or_else(|| toml.logging.level.clone());

        Ok(Self {
            root_folder,
            channel_id,
            export_dir,
            refresh_interval: time::secs_to_duration(interval_secs),
            bot_name,
            log_level,
            log_file: toml.logging.file.clone().or(defaults.log_file),
        })
    }

    /// Artifact paths inside the root folder
    pub fn artifacts(&self) -> RootFolderInitializer {
        RootFolderInitializer::new(self.root_folder.clone())
    }
}

/// CLI value if given, else TOML; warns when both are set and disagree
fn pick<T: PartialEq>(setting: &str, cli: Option<T>, toml: Option<T>) -> Option<T> {
    match (cli, toml) {
        (Some(cli), Some(toml)) => {
            if cli != toml {
                warn!("{} set on the command line and in TOML config; using command line", setting);
            }
            Some(cli)
        }
        (Some(cli), None) => {
            info!("{} loaded from command line", setting);
            Some(cli)
        }
        (None, Some(toml)) => {
            info!("{} loaded from TOML config", setting);
            Some(toml)
        }
        (None, None) => None,
    }
}
