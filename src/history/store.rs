//! Durable storage for the observation history.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{History, Observation};
use crate::error::{IntoWatchError, Result, WatchError};

/// Temporary file suffix for atomic writes.
const TMP_SUFFIX: &str = ".tmp";

/// Lock file suffix for concurrent access prevention.
const LOCK_SUFFIX: &str = ".lock";

/// Load/save contract for the persisted history.
pub trait HistoryStore {
    /// Reads the persisted history, creating an empty record if none exists.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Store`] if the record exists but cannot be read,
    /// is not writable, or does not parse.
    fn load(&self) -> Result<History>;

    /// Replaces the persisted history with `history`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Store`] on any I/O or encoding failure.
    fn save(&self, history: &History) -> Result<()>;
}

/// On-disk layout: an array of `[[bean]]` tables.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordFile {
    #[serde(default)]
    bean: Vec<Observation>,
}

/// History store backed by a single TOML record file.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    path: PathBuf,
    max_records: usize,
}

impl FileHistoryStore {
    /// Creates a store for the record at `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>, max_records: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_records,
        }
    }

    /// Returns the path to the record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path used for atomic writes.
    #[must_use]
    pub fn tmp_file_path(&self) -> PathBuf {
        sibling_with_suffix(&self.path, TMP_SUFFIX)
    }

    fn create_placeholder(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).into_watch_store(&self.path)?;
        }
        File::create(&self.path).into_watch_store(&self.path)?;
        info!(path = %self.path.display(), "Created empty observation record");
        Ok(())
    }
}

impl HistoryStore for FileHistoryStore {
    fn load(&self) -> Result<History> {
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.create_placeholder()?;
                return Ok(History::new(self.max_records));
            }
            Err(e) => return Err(WatchError::store(&self.path, e.to_string())),
        };

        if metadata.is_dir() {
            return Err(WatchError::store(&self.path, "record path is a directory"));
        }

        OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| WatchError::store(&self.path, format!("record is not writable: {e}")))?;

        let content = fs::read_to_string(&self.path).into_watch_store(&self.path)?;
        let record: RecordFile = toml::from_str(&content)
            .map_err(|e| WatchError::store(&self.path, format!("record is corrupt: {e}")))?;

        debug!(
            path = %self.path.display(),
            entries = record.bean.len(),
            "Loaded observation record"
        );

        Ok(History::from_observations(record.bean, self.max_records))
    }

    fn save(&self, history: &History) -> Result<()> {
        let record = RecordFile {
            bean: history.to_vec(),
        };
        let content = toml::to_string(&record).into_watch_store(&self.path)?;

        let tmp_path = self.tmp_file_path();
        let mut tmp_file = File::create(&tmp_path).into_watch_store(&self.path)?;
        tmp_file
            .write_all(content.as_bytes())
            .into_watch_store(&self.path)?;
        tmp_file.sync_all().into_watch_store(&self.path)?;

        fs::rename(&tmp_path, &self.path).into_watch_store(&self.path)?;

        debug!(
            path = %self.path.display(),
            entries = history.len(),
            "Saved observation record"
        );
        Ok(())
    }
}

/// Exclusive advisory lock held next to a record file for one run.
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct RecordLock {
    file: File,
    path: PathBuf,
}

impl RecordLock {
    /// Takes the lock for `record_path` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::StoreLocked`] if another process holds it, or
    /// [`WatchError::Store`] if the lock file cannot be opened.
    pub fn acquire(record_path: &Path) -> Result<Self> {
        let path = sibling_with_suffix(record_path, LOCK_SUFFIX);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).into_watch_store(&path)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .into_watch_store(&path)?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Self { file, path }),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(WatchError::StoreLocked {
                    path: record_path.to_path_buf(),
                })
            }
            Err(e) => Err(WatchError::store(&path, format!("failed to lock: {e}"))),
        }
    }

    /// Returns the path to the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn obs(height: &str, timestamp: i64) -> Observation {
        Observation::new(height, timestamp, format!("t={timestamp}"))
    }

    #[test]
    fn test_load_creates_missing_record() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("record.toml");
        let store = FileHistoryStore::new(&path, 5);

        let history = store.load().expect("load");
        assert!(history.is_empty());
        assert_eq!(history.max_records(), 5);
        assert!(path.exists());
    }

    #[test]
    fn test_load_creates_missing_parent_directories() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state/nested/record.toml");
        let store = FileHistoryStore::new(&path, 5);

        store.load().expect("load");
        assert!(path.exists());
    }

    #[test]
    fn test_empty_file_is_empty_history() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("record.toml");
        fs::write(&path, "").unwrap();

        let history = FileHistoryStore::new(&path, 3).load().expect("load");
        assert!(history.is_empty());
    }

    #[test]
    fn test_save_then_load_reproduces_history() {
        let temp = TempDir::new().unwrap();
        let store = FileHistoryStore::new(temp.path().join("record.toml"), 4);

        let mut history = History::new(4);
        history.push(obs("100", 1_000));
        history.push(obs("0xabc", 1_060));
        history.push(obs("102", 1_120));

        store.save(&history).expect("save");
        let loaded = store.load().expect("load");

        assert_eq!(loaded, history);
    }

    #[test]
    fn test_load_then_save_is_stable() {
        let temp = TempDir::new().unwrap();
        let store = FileHistoryStore::new(temp.path().join("record.toml"), 4);

        let mut history = History::new(4);
        history.push(obs("7", 70));
        history.push(obs("8", 80));
        store.save(&history).unwrap();

        let first = store.load().unwrap();
        store.save(&first).unwrap();
        let second = store.load().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_load_sorts_unordered_record() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("record.toml");
        fs::write(
            &path,
            r#"
[[bean]]
Height = "12"
Timestamp = 1200
Time = "later"

[[bean]]
Height = "11"
Timestamp = 1100
Time = "earlier"
"#,
        )
        .unwrap();

        let history = FileHistoryStore::new(&path, 10).load().expect("load");
        let heights: Vec<&str> = history.iter().map(|o| o.height.as_str()).collect();
        assert_eq!(heights, vec!["11", "12"]);
    }

    #[test]
    fn test_load_accepts_lowercase_keys_and_missing_label() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("record.toml");
        fs::write(&path, "[[bean]]\nheight = \"5\"\ntimestamp = 50\n").unwrap();

        let history = FileHistoryStore::new(&path, 10).load().expect("load");
        assert_eq!(history.last(), Some(&Observation::new("5", 50, "")));
    }

    #[test]
    fn test_corrupt_record_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("record.toml");
        fs::write(&path, "[[bean]\nHeight = ").unwrap();

        let err = FileHistoryStore::new(&path, 3).load().unwrap_err();
        assert!(matches!(err, WatchError::Store { .. }));
        assert!(err.to_string().contains("corrupt"));
    }

    #[test]
    fn test_directory_record_is_an_error() {
        let temp = TempDir::new().unwrap();
        let err = FileHistoryStore::new(temp.path(), 3).load().unwrap_err();
        assert!(matches!(err, WatchError::Store { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_record_is_an_error() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("record.toml");
        fs::write(&path, "").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o444)).unwrap();

        // Root ignores file modes; nothing to check there.
        if OpenOptions::new().write(true).open(&path).is_ok() {
            return;
        }

        let result = FileHistoryStore::new(&path, 3).load();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let err = result.unwrap_err();
        assert!(matches!(err, WatchError::Store { .. }));
        assert!(err.to_string().contains("not writable"));
    }

    #[test]
    fn test_save_leaves_no_tmp_file() {
        let temp = TempDir::new().unwrap();
        let store = FileHistoryStore::new(temp.path().join("record.toml"), 2);
        let mut history = History::new(2);
        history.push(obs("1", 1));

        store.save(&history).unwrap();
        assert!(!store.tmp_file_path().exists());
    }

    #[test]
    fn test_record_lock_is_exclusive() {
        let temp = TempDir::new().unwrap();
        let record = temp.path().join("record.toml");

        let lock = RecordLock::acquire(&record).expect("first lock");
        assert!(lock.path().ends_with("record.toml.lock"));

        let err = RecordLock::acquire(&record).unwrap_err();
        assert!(matches!(err, WatchError::StoreLocked { .. }));

        drop(lock);
        assert!(RecordLock::acquire(&record).is_ok());
    }
}
