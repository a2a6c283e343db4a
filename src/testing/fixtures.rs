//! Test fixtures for creating reproducible test environments.
//!
//! Provides temporary config and record files for consistent testing.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::{DEFAULT_CONFIG_FILE, DEFAULT_RECORD_FILE};
use crate::history::Observation;

/// A minimal config checking a local node every minute.
pub const MINIMAL_CONFIG: &str = r#"
name = "test-node"

[node_check]
check_interval_s = 60
url = "http://127.0.0.1:1"
height_json_path = "result"
"#;

/// A temporary directory holding a config file and, optionally, a record.
///
/// Automatically cleans up when dropped.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::with_config(MINIMAL_CONFIG);
/// let config = Config::load(&fixture.config_path())?;
/// // Directory is cleaned up when fixture goes out of scope
/// ```
pub struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    /// Create an empty directory.
    ///
    /// # Panics
    ///
    /// Panics if temporary directory creation fails.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Create a directory with `config.toml` holding `content`.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[must_use]
    pub fn with_config(content: &str) -> Self {
        let fixture = Self::empty();
        std::fs::write(fixture.config_path(), content).expect("Failed to write config.toml");
        fixture
    }

    /// Write a record file in the format the file store reads.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_record(&self, observations: &[Observation]) {
        let mut content = String::new();
        for observation in observations {
            content.push_str(&format!(
                "[[bean]]\nHeight = \"{}\"\nTimestamp = {}\nTime = \"{}\"\n\n",
                observation.height, observation.timestamp, observation.time
            ));
        }
        std::fs::write(self.record_path(), content).expect("Failed to write record.toml");
    }

    /// Get the path to the fixture directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.path().join(DEFAULT_CONFIG_FILE)
    }

    /// Default record location for configs without a `file` entry.
    #[must_use]
    pub fn record_path(&self) -> PathBuf {
        self.path().join(DEFAULT_RECORD_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_config_writes_file() {
        let fixture = TestFixture::with_config(MINIMAL_CONFIG);
        let content = std::fs::read_to_string(fixture.config_path()).unwrap();
        assert!(content.contains("check_interval_s = 60"));
        assert!(!fixture.record_path().exists());
    }

    #[test]
    fn test_fixture_cleanup() {
        let path = {
            let fixture = TestFixture::empty();
            fixture.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
