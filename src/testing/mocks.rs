//! Mock implementations of the monitor's capabilities.
//!
//! These mocks provide controllable test doubles for the height source,
//! alert channels, command runner and history store, enabling
//! deterministic unit tests of a full monitoring run.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Result, WatchError};
use crate::history::{History, HistoryStore, Observation};
use crate::notify::{Alert, Notifier};
use crate::recovery::{CommandOutput, CommandRunner, RecoveryCommand};
use crate::source::HeightSource;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock height source.
///
/// Returns the queued heights one per call; once the queue is down to a
/// single height, that height is returned forever.
///
/// # Example
///
/// ```rust,ignore
/// let source = MockHeightSource::with_heights(["100", "101"]);
/// assert_eq!(source.fetch_height().await?, "100");
/// assert_eq!(source.fetch_height().await?, "101");
/// assert_eq!(source.fetch_height().await?, "101");
/// ```
#[derive(Debug)]
pub struct MockHeightSource {
    heights: Mutex<VecDeque<String>>,
    error: Option<SourceFailure>,
    call_count: AtomicU32,
}

#[derive(Debug, Clone)]
enum SourceFailure {
    Fetch(String),
    Missing(String),
}

impl MockHeightSource {
    /// A source that always reports `height`.
    #[must_use]
    pub fn new(height: impl Into<String>) -> Self {
        Self::with_heights([height.into()])
    }

    #[must_use]
    pub fn with_heights<I, S>(heights: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            heights: Mutex::new(heights.into_iter().map(Into::into).collect()),
            error: None,
            call_count: AtomicU32::new(0),
        }
    }

    /// A source whose node cannot be reached.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            error: Some(SourceFailure::Fetch(message.into())),
            ..Self::with_heights(Vec::<String>::new())
        }
    }

    /// A source whose response lacks the height path.
    #[must_use]
    pub fn missing(path: impl Into<String>) -> Self {
        Self {
            error: Some(SourceFailure::Missing(path.into())),
            ..Self::with_heights(Vec::<String>::new())
        }
    }

    /// Number of times the height was requested.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HeightSource for MockHeightSource {
    async fn fetch_height(&self) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        match &self.error {
            Some(SourceFailure::Fetch(message)) => return Err(WatchError::fetch(message.clone())),
            Some(SourceFailure::Missing(path)) => {
                return Err(WatchError::MissingHeight { path: path.clone() })
            }
            None => {}
        }

        let mut heights = lock(&self.heights);
        let height = if heights.len() > 1 {
            heights.pop_front()
        } else {
            heights.front().cloned()
        };
        height.ok_or_else(|| WatchError::fetch("no height queued"))
    }
}

/// Notifier that records every alert it is asked to send.
///
/// # Example
///
/// ```rust,ignore
/// let notifier = RecordingNotifier::failing("HTTP 500").with_name("lark");
/// assert!(notifier.send(&alert).await.is_err());
/// assert_eq!(notifier.alerts().len(), 1);
/// ```
#[derive(Debug)]
pub struct RecordingNotifier {
    name: String,
    failure: Option<String>,
    alerts: Mutex<Vec<Alert>>,
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self {
            name: "recording".to_string(),
            failure: None,
            alerts: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn named(name: &str) -> Self {
        Self::new().with_name(name)
    }

    /// A notifier that records alerts and then reports `message` as failure.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Alerts received so far, in order.
    pub fn alerts(&self) -> Vec<Alert> {
        lock(&self.alerts).clone()
    }

    /// Titles of the alerts received so far.
    pub fn titles(&self) -> Vec<String> {
        lock(&self.alerts).iter().map(|a| a.title.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn channel(&self) -> &str {
        &self.name
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        lock(&self.alerts).push(alert.clone());
        match &self.failure {
            Some(message) => Err(WatchError::notify(&self.name, message.clone())),
            None => Ok(()),
        }
    }
}

/// Command runner that never spawns anything.
///
/// Unknown programs succeed with empty output.
#[derive(Debug, Default)]
pub struct MockCommandRunner {
    outputs: HashMap<String, CommandOutput>,
    spawn_errors: HashSet<String>,
    invoked: Mutex<Vec<RecoveryCommand>>,
}

impl MockCommandRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `program` succeeds and prints `output`.
    #[must_use]
    pub fn with_output(mut self, program: &str, output: &str) -> Self {
        self.outputs
            .insert(program.to_string(), CommandOutput::success(output));
        self
    }

    /// `program` exits with `exit_code` after printing `output`.
    #[must_use]
    pub fn with_failure(mut self, program: &str, exit_code: i32, output: &str) -> Self {
        self.outputs
            .insert(program.to_string(), CommandOutput::failure(exit_code, output));
        self
    }

    /// `program` cannot be started.
    #[must_use]
    pub fn with_spawn_error(mut self, program: &str) -> Self {
        self.spawn_errors.insert(program.to_string());
        self
    }

    /// Programs run so far, in order.
    pub fn invoked_programs(&self) -> Vec<String> {
        lock(&self.invoked)
            .iter()
            .map(|c| c.program.clone())
            .collect()
    }

    /// Full commands run so far, in order.
    pub fn invoked(&self) -> Vec<RecoveryCommand> {
        lock(&self.invoked).clone()
    }
}

#[async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(&self, command: &RecoveryCommand) -> Result<CommandOutput> {
        lock(&self.invoked).push(command.clone());

        if self.spawn_errors.contains(&command.program) {
            return Err(WatchError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}: command not found", command.program),
            )));
        }

        Ok(self
            .outputs
            .get(&command.program)
            .cloned()
            .unwrap_or_else(|| CommandOutput::success("")))
    }
}

/// In-memory history store.
#[derive(Debug)]
pub struct MemoryHistoryStore {
    max_records: usize,
    observations: Mutex<Vec<Observation>>,
    load_error: Option<String>,
    save_error: Option<String>,
    save_count: AtomicU32,
}

impl MemoryHistoryStore {
    #[must_use]
    pub fn new(max_records: usize) -> Self {
        Self {
            max_records,
            observations: Mutex::new(Vec::new()),
            load_error: None,
            save_error: None,
            save_count: AtomicU32::new(0),
        }
    }

    /// Seeds the store as if `observations` had been saved earlier.
    #[must_use]
    pub fn with_observations(self, observations: Vec<Observation>) -> Self {
        *lock(&self.observations) = observations;
        self
    }

    /// Every load fails with a store error.
    #[must_use]
    pub fn with_load_error(mut self, message: &str) -> Self {
        self.load_error = Some(message.to_string());
        self
    }

    /// Every save fails with a store error.
    #[must_use]
    pub fn with_save_error(mut self, message: &str) -> Self {
        self.save_error = Some(message.to_string());
        self
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> u32 {
        self.save_count.load(Ordering::SeqCst)
    }

    /// Currently persisted observations.
    pub fn saved(&self) -> Vec<Observation> {
        lock(&self.observations).clone()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load(&self) -> Result<History> {
        if let Some(message) = &self.load_error {
            return Err(WatchError::store("memory", message.clone()));
        }
        Ok(History::from_observations(
            self.saved(),
            self.max_records,
        ))
    }

    fn save(&self, history: &History) -> Result<()> {
        if let Some(message) = &self.save_error {
            return Err(WatchError::store("memory", message.clone()));
        }
        *lock(&self.observations) = history.to_vec();
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
