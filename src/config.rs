//! Configuration management for stallwatch.
//!
//! The configuration is a TOML file describing the node to watch, the
//! record file, the recovery commands and the alert channels:
//!
//! ```toml
//! name = "validator-1"
//!
//! [node_check]
//! check_interval_s = 300
//! file = "record.toml"
//! max_record_num = 10
//! method = "POST"
//! url = "http://127.0.0.1:26657"
//! body = '{"jsonrpc":"2.0","id":1,"method":"status"}'
//! height_json_path = "result.sync_info.latest_block_height"
//!
//! [commands]
//! content = [["systemctl", "restart", "node"]]
//!
//! [lark]
//! enable = true
//! url = "https://open.feishu.cn/open-apis/bot/v2/hook/..."
//! ```

pub mod validation;

pub use validation::{ConfigValidator, ValidationReport};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatchError};
use crate::recovery::RecoveryCommand;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Default record file name, relative to the config file.
pub const DEFAULT_RECORD_FILE: &str = "record.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Display name of the monitored node, used in alert titles.
    #[serde(default)]
    pub name: String,

    pub node_check: NodeCheckConfig,

    #[serde(default)]
    pub commands: CommandsConfig,

    #[serde(default)]
    pub ding: DingTalkConfig,

    #[serde(default)]
    pub lark: LarkConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// How and how often the node height is checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCheckConfig {
    /// Seconds without a new height before the node counts as stalled.
    pub check_interval_s: i64,

    /// Record file holding the observation history.
    #[serde(default = "default_record_file")]
    pub file: PathBuf,

    /// Maximum number of observations kept in the record.
    #[serde(default = "default_max_record_num")]
    pub max_record_num: i64,

    #[serde(default = "default_method")]
    pub method: String,

    pub url: String,

    #[serde(default)]
    pub body: String,

    /// Path to the height inside the JSON response.
    pub height_json_path: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Optional request timeout in seconds.
    #[serde(default)]
    pub timeout_s: Option<u64>,
}

fn default_record_file() -> PathBuf {
    PathBuf::from(DEFAULT_RECORD_FILE)
}

fn default_max_record_num() -> i64 {
    10
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommandsConfig {
    /// Recovery commands as argv lists, run in order on a stall.
    #[serde(default)]
    pub content: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DingTalkConfig {
    #[serde(default)]
    pub enable: bool,

    #[serde(default)]
    pub url: String,

    /// Signing secret; signing is skipped when empty.
    #[serde(default)]
    pub secret: String,

    /// Phone numbers to mention in alerts.
    #[serde(default)]
    pub mobiles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LarkConfig {
    #[serde(default)]
    pub enable: bool,

    #[serde(default)]
    pub url: String,

    /// Signing secret; signing is skipped when empty.
    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub file: LogFileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogFileConfig {
    /// Append logs to this file in addition to stderr.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Parses a configuration from TOML text.
    ///
    /// Relative paths are left untouched; see [`Config::load`].
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| WatchError::config(e.to_string()))
    }

    /// Loads a configuration file.
    ///
    /// Relative record and log paths are resolved against the directory
    /// containing the config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WatchError::config_with_path(format!("cannot read config: {e}"), path.to_path_buf())
        })?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| WatchError::config_with_path(e.to_string(), path.to_path_buf()))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.node_check.file = resolve(base, &config.node_check.file);
        if let Some(log_path) = config.log.file.path.take() {
            config.log.file.path = Some(resolve(base, &log_path));
        }

        Ok(config)
    }

    /// Loads a configuration file and rejects it if validation fails.
    pub fn load_validated(path: &Path) -> Result<Self> {
        let config = Self::load(path)?;
        config.ensure_valid().map_err(|e| match e {
            WatchError::Config { message, .. } => {
                WatchError::config_with_path(message, path.to_path_buf())
            }
            other => other,
        })?;
        Ok(config)
    }

    /// Logs validation warnings and fails on validation errors.
    pub fn ensure_valid(&self) -> Result<()> {
        let report = ConfigValidator::new(self).validate();
        for warning in &report.warnings {
            tracing::warn!("{}", warning);
        }
        if !report.is_valid() {
            return Err(WatchError::config(report.errors.join("; ")));
        }
        Ok(())
    }

    /// Returns the stall threshold.
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.node_check.check_interval_s.max(0).unsigned_abs())
    }

    /// Returns the retention bound, never less than one.
    #[must_use]
    pub fn max_records(&self) -> usize {
        usize::try_from(self.node_check.max_record_num.max(1)).unwrap_or(usize::MAX)
    }

    /// Returns the record file path.
    #[must_use]
    pub fn record_path(&self) -> &Path {
        &self.node_check.file
    }

    /// Returns the configured recovery commands, skipping empty entries.
    #[must_use]
    pub fn recovery_commands(&self) -> Vec<RecoveryCommand> {
        self.commands
            .content
            .iter()
            .filter_map(|argv| RecoveryCommand::from_argv(argv))
            .collect()
    }

    /// Returns the name used in alert titles.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.node_check.url
        } else {
            &self.name
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
