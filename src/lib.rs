//! Stallwatch - single-shot liveness monitor
//!
//! Each invocation asks a node for its current height, compares it with a
//! small persisted history and, if the height has not moved for at least
//! one check interval, alerts through chat webhooks and runs a configured
//! sequence of recovery commands. Scheduling is left to cron or a systemd
//! timer.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`config`] - Configuration loading and validation
//! - [`detector`] - Stall decision over the observation history
//! - [`error`] - Custom error types and handling
//! - [`history`] - Bounded observation history and its record file
//! - [`monitor`] - One end-to-end monitoring run
//! - [`notify`] - Alert delivery (DingTalk, Lark)
//! - [`recovery`] - Stall alerts and recovery command execution
//! - [`source`] - Height fetching over HTTP with JSON path lookup
//! - [`testing`] - Testing infrastructure (mocks, fixtures, assertions)
//!
//! # Example
//!
//! ```rust,ignore
//! use stallwatch::{Config, FanoutNotifier, FileHistoryStore, HttpHeightSource};
//! use stallwatch::{Monitor, MonitorSettings, SystemCommandRunner};
//!
//! let config = Config::load_validated("config.toml".as_ref())?;
//! let monitor = Monitor::new(
//!     MonitorSettings::from_config(&config),
//!     HttpHeightSource::from_config(&config.node_check)?,
//!     FanoutNotifier::from_config(&config)?,
//!     SystemCommandRunner,
//!     FileHistoryStore::new(config.record_path(), config.max_records()),
//! );
//! let outcome = monitor.run().await?;
//! println!("{outcome}");
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod history;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod recovery;
pub mod source;
pub mod testing;

// Re-export commonly used types
pub use error::{IntoWatchError, Result, WatchError};

pub use config::{Config, ConfigValidator, ValidationReport};
pub use detector::{format_duration, StallDetector, Verdict};
pub use history::{FileHistoryStore, History, HistoryStore, Observation, RecordLock};
pub use monitor::{Monitor, MonitorSettings, RunOutcome};
pub use notify::{Alert, DingTalkNotifier, FanoutNotifier, LarkNotifier, Notifier, Severity};
pub use recovery::{
    ActionRunner, CommandOutput, CommandRunner, RecoveryCommand, RecoveryReport,
    SystemCommandRunner,
};
pub use source::{HeightSource, HttpHeightSource};
