//! One monitoring run, end to end.
//!
//! [`Monitor`] wires the height source, the persisted history, the stall
//! detector and the recovery actions together:
//!
//! 1. fetch the current height (failure aborts before the history is read)
//! 2. load the history
//! 3. evaluate the new observation
//! 4. persist the history if it changed
//! 5. on a stall, alert and run the recovery commands
//!
//! Stall alerts are repeated on every run that still sees the stall.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use tracing::{info, warn};

use crate::config::Config;
use crate::detector::{StallDetector, Verdict};
use crate::error::Result;
use crate::history::{HistoryStore, Observation};
use crate::notify::Notifier;
use crate::recovery::{ActionRunner, CommandRunner, RecoveryCommand, RecoveryReport};
use crate::source::HeightSource;

/// What a run needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Name used in alert titles.
    pub name: String,
    /// Stall threshold.
    pub check_interval: Duration,
    /// Recovery sequence, run in order on a stall.
    pub commands: Vec<RecoveryCommand>,
}

impl MonitorSettings {
    #[must_use]
    pub fn new(name: impl Into<String>, check_interval: Duration) -> Self {
        Self {
            name: name.into(),
            check_interval,
            commands: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: config.display_name().to_string(),
            check_interval: config.check_interval(),
            commands: config.recovery_commands(),
        }
    }

    #[must_use]
    pub fn with_command(mut self, command: RecoveryCommand) -> Self {
        self.commands.push(command);
        self
    }
}

/// Result of one completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub height: String,
    pub verdict: Verdict,
    /// Present only when the run ended in a stall.
    pub recovery: Option<RecoveryReport>,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "height {}: {}", self.height, self.verdict)
    }
}

/// A single-shot liveness check over explicit collaborators.
pub struct Monitor<S, N, R, H> {
    settings: MonitorSettings,
    detector: StallDetector,
    source: S,
    notifier: N,
    runner: R,
    store: H,
}

impl<S, N, R, H> Monitor<S, N, R, H>
where
    S: HeightSource,
    N: Notifier,
    R: CommandRunner,
    H: HistoryStore,
{
    pub fn new(settings: MonitorSettings, source: S, notifier: N, runner: R, store: H) -> Self {
        let detector = StallDetector::new(settings.check_interval);
        Self {
            settings,
            detector,
            source,
            notifier,
            runner,
            store,
        }
    }

    #[must_use]
    pub fn store(&self) -> &H {
        &self.store
    }

    /// Runs one check against the local wall clock.
    pub async fn run(&self) -> Result<RunOutcome> {
        self.run_at(&Local::now()).await
    }

    /// Runs one check as if the height were observed at `now`.
    ///
    /// # Errors
    ///
    /// Fetch and store failures abort the run before any action is taken.
    /// A failing recovery command is returned after the alerts for this
    /// run have been sent. Alert failures are logged only.
    pub async fn run_at<Tz>(&self, now: &DateTime<Tz>) -> Result<RunOutcome>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let height = self.source.fetch_height().await?;
        info!(name = %self.settings.name, height = %height, "Fetched height");

        let mut history = self.store.load()?;
        let observation = Observation::observed_at(height.clone(), now);
        let verdict = self.detector.evaluate(&mut history, observation);

        if verdict.history_changed() {
            self.store.save(&history)?;
        }

        match &verdict {
            Verdict::Baseline => info!(height = %height, "Baseline established"),
            Verdict::Progressed { previous, evicted } => {
                info!(height = %height, previous = %previous, evicted, "Height progressed");
            }
            Verdict::Waiting { delay } => info!(
                height = %height,
                delay_secs = delay.as_secs(),
                "Height unchanged, below threshold"
            ),
            Verdict::Stalled { delay, anchor } => warn!(
                height = %height,
                delay_secs = delay.as_secs(),
                since = %anchor.time,
                "Node stalled"
            ),
        }

        let recovery = match &verdict {
            Verdict::Stalled { delay, .. } => {
                let actions = ActionRunner::new(&self.settings.name, &self.notifier, &self.runner);
                actions
                    .notify_stall(*delay, self.settings.check_interval)
                    .await;
                Some(actions.run_recovery(&self.settings.commands).await?)
            }
            _ => None,
        };

        Ok(RunOutcome {
            height,
            verdict,
            recovery,
        })
    }
}
