//! Custom error types for stallwatch.
//!
//! Every failure a monitoring run can hit maps to one section of
//! [`WatchError`]. Fetch, store, exec and config failures abort the run;
//! notify failures are logged by the caller and swallowed.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for stallwatch operations
#[derive(Error, Debug)]
pub enum WatchError {
    // =========================================================================
    // Height Source Errors
    // =========================================================================
    /// Fetching the current height failed
    #[error("Failed to fetch height: {message}")]
    Fetch { message: String },

    /// The response did not contain a value at the configured path
    #[error("No value at path '{path}' in height response")]
    MissingHeight { path: String },

    // =========================================================================
    // History Store Errors
    // =========================================================================
    /// Reading or writing the observation record failed
    #[error("History store error at {path}: {message}")]
    Store { path: PathBuf, message: String },

    /// Another run holds the record lock
    #[error("Record {path} is locked by another stallwatch run")]
    StoreLocked { path: PathBuf },

    // =========================================================================
    // Notification Errors
    // =========================================================================
    /// Delivering an alert failed
    #[error("Notification via {channel} failed: {message}")]
    Notify { channel: String, message: String },

    // =========================================================================
    // Recovery Errors
    // =========================================================================
    /// A recovery command failed to spawn or exited unsuccessfully
    #[error("Recovery command #{index} `{command}` failed: {message}")]
    Exec {
        index: usize,
        command: String,
        message: String,
        output: String,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WatchError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a fetch error
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
        }
    }

    /// Create a store error for the given record path
    pub fn store(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Store {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a notify error
    pub fn notify(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Notify {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Fetch { .. } | Self::MissingHeight { .. } => 2,
            Self::Store { .. } | Self::StoreLocked { .. } => 3,
            Self::Exec { .. } => 4,
            Self::Config { .. } | Self::InvalidConfig { .. } => 5,
            _ => 1,
        }
    }
}

/// Type alias for stallwatch results
pub type Result<T> = std::result::Result<T, WatchError>;

/// Extension trait for converting foreign errors to WatchError
pub trait IntoWatchError<T> {
    fn into_watch_fetch(self) -> Result<T>;
    fn into_watch_store(self, path: &std::path::Path) -> Result<T>;
    fn into_watch_notify(self, channel: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoWatchError<T> for std::result::Result<T, E> {
    fn into_watch_fetch(self) -> Result<T> {
        self.map_err(|e| WatchError::fetch(e.to_string()))
    }

    fn into_watch_store(self, path: &std::path::Path) -> Result<T> {
        self.map_err(|e| WatchError::store(path, e.to_string()))
    }

    fn into_watch_notify(self, channel: &str) -> Result<T> {
        self.map_err(|e| WatchError::notify(channel, e.to_string()))
    }
}
