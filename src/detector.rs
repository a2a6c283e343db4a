//! Stall detection over the observation history.
//!
//! A service is stalled once the newest height in the history has stayed
//! the same for at least one check interval of elapsed wall-clock time.
//! The decision depends only on timestamps, never on how often the monitor
//! happens to run, so a skipped scheduler tick neither hides nor invents a
//! stall.
//!
//! # State transitions (per run)
//!
//! ```text
//! empty history ────────────────> Baseline   (append, save)
//! new height != last height ────> Progressed (append + truncate, save)
//! same height, delay <  interval > Waiting    (no change)
//! same height, delay >= interval > Stalled    (no change, act)
//! ```
//!
//! While stalled the anchor observation is never replaced, so repeated runs
//! keep measuring the delay from the moment progress actually stopped and
//! keep reporting the stall on every run until the height moves again.

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::history::{History, Observation};

/// Outcome of evaluating one fresh observation against the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The history was empty; the observation became the first entry.
    Baseline,
    /// The height moved; the observation was appended.
    Progressed {
        /// Height seen on the previous progress.
        previous: String,
        /// Entries dropped to respect the retention bound.
        evicted: usize,
    },
    /// The height has not moved, but the interval has not elapsed yet.
    Waiting {
        /// Time since the height was first observed.
        delay: Duration,
    },
    /// The height has not moved for at least one interval.
    Stalled {
        /// Time since the height was first observed.
        delay: Duration,
        /// The observation the delay is measured from.
        anchor: Observation,
    },
}

impl Verdict {
    /// Returns true if recovery should run.
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        matches!(self, Self::Stalled { .. })
    }

    /// Returns true if the history was modified and must be persisted.
    #[must_use]
    pub fn history_changed(&self) -> bool {
        matches!(self, Self::Baseline | Self::Progressed { .. })
    }

    /// Short machine-friendly name of the state this run ended in.
    #[must_use]
    pub fn state(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline_established",
            Self::Progressed { .. } => "progressed",
            Self::Waiting { .. } => "stalled_below_threshold",
            Self::Stalled { .. } => "stalled_above_threshold",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Baseline => write!(f, "baseline established"),
            Self::Progressed { previous, .. } => write!(f, "progressed from {previous}"),
            Self::Waiting { delay } => {
                write!(f, "unchanged for {} (below threshold)", format_duration(*delay))
            }
            Self::Stalled { delay, anchor } => write!(
                f,
                "stalled at {} for {}",
                anchor.height,
                format_duration(*delay)
            ),
        }
    }
}

/// Decides stalled/not-stalled from the history and a fresh observation.
#[derive(Debug, Clone, Copy)]
pub struct StallDetector {
    check_interval: Duration,
}

impl StallDetector {
    /// Creates a detector that declares a stall after `check_interval`.
    #[must_use]
    pub fn new(check_interval: Duration) -> Self {
        Self { check_interval }
    }

    /// Evaluates `observation` against `history`, updating it in place.
    ///
    /// The history is only modified on [`Verdict::Baseline`] and
    /// [`Verdict::Progressed`].
    pub fn evaluate(&self, history: &mut History, observation: Observation) -> Verdict {
        if history.is_empty() {
            history.push(observation);
            return Verdict::Baseline;
        }

        history.sort();
        let Some(last) = history.last() else {
            history.push(observation);
            return Verdict::Baseline;
        };

        if last.height == observation.height {
            let elapsed = observation.timestamp.saturating_sub(last.timestamp).max(0);
            let delay = Duration::from_secs(elapsed.unsigned_abs());
            debug!(
                height = %last.height,
                delay_secs = delay.as_secs(),
                interval_secs = self.check_interval.as_secs(),
                "Height unchanged"
            );

            if delay >= self.check_interval {
                return Verdict::Stalled {
                    delay,
                    anchor: last.clone(),
                };
            }
            return Verdict::Waiting { delay };
        }

        let previous = last.height.clone();
        let evicted = history.push(observation);
        Verdict::Progressed { previous, evicted }
    }
}

/// Formats a duration as hours, minutes and seconds, e.g. `1h2m3s`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: u64 = 300;

    fn detector() -> StallDetector {
        StallDetector::new(Duration::from_secs(INTERVAL))
    }

    fn obs(height: &str, timestamp: i64) -> Observation {
        Observation::new(height, timestamp, "")
    }

    #[test]
    fn test_empty_history_establishes_baseline() {
        let mut history = History::new(5);
        let verdict = detector().evaluate(&mut history, obs("100", 1_000));

        assert_eq!(verdict, Verdict::Baseline);
        assert!(!verdict.is_stalled());
        assert!(verdict.history_changed());
        assert_eq!(history.to_vec(), vec![obs("100", 1_000)]);
    }

    #[test]
    fn test_baseline_never_stalls_even_with_zero_interval() {
        let mut history = History::new(5);
        let verdict = StallDetector::new(Duration::ZERO).evaluate(&mut history, obs("1", 0));
        assert_eq!(verdict, Verdict::Baseline);
    }

    #[test]
    fn test_progress_appends_new_anchor() {
        let mut history = History::from_observations(vec![obs("h1", 100)], 5);
        let verdict = detector().evaluate(&mut history, obs("h2", 200));

        assert_eq!(
            verdict,
            Verdict::Progressed {
                previous: "h1".into(),
                evicted: 0
            }
        );
        assert!(verdict.history_changed());
        assert_eq!(history.to_vec(), vec![obs("h1", 100), obs("h2", 200)]);
    }

    #[test]
    fn test_progress_is_equality_not_ordering() {
        // A lower or non-numeric height still counts as movement.
        let mut history = History::from_observations(vec![obs("0xbeef", 100)], 5);
        let verdict = detector().evaluate(&mut history, obs("0xaaaa", 10_000));
        assert!(matches!(verdict, Verdict::Progressed { .. }));
    }

    #[test]
    fn test_threshold_boundary_below() {
        let mut history = History::from_observations(vec![obs("h1", 1_000)], 5);
        let before = history.clone();
        let now = 1_000 + INTERVAL as i64 - 1;

        let verdict = detector().evaluate(&mut history, obs("h1", now));

        assert_eq!(
            verdict,
            Verdict::Waiting {
                delay: Duration::from_secs(INTERVAL - 1)
            }
        );
        assert!(!verdict.is_stalled());
        assert!(!verdict.history_changed());
        assert_eq!(history, before);
    }

    #[test]
    fn test_threshold_boundary_at_interval() {
        let mut history = History::from_observations(vec![obs("h1", 1_000)], 5);
        let now = 1_000 + INTERVAL as i64;

        let verdict = detector().evaluate(&mut history, obs("h1", now));

        assert!(verdict.is_stalled());
        assert_eq!(
            verdict,
            Verdict::Stalled {
                delay: Duration::from_secs(INTERVAL),
                anchor: obs("h1", 1_000)
            }
        );
    }

    #[test]
    fn test_stall_leaves_history_identical() {
        let mut history =
            History::from_observations(vec![obs("a", 10), obs("b", 20), obs("c", 30)], 3);
        let before = history.clone();

        let verdict = detector().evaluate(&mut history, obs("c", 30 + 10 * INTERVAL as i64));

        assert!(verdict.is_stalled());
        assert_eq!(history, before);
    }

    #[test]
    fn test_repeated_stall_measures_from_original_anchor() {
        let mut history = History::from_observations(vec![obs("h", 0)], 5);
        let detector = detector();

        let first = detector.evaluate(&mut history, obs("h", 400));
        let second = detector.evaluate(&mut history, obs("h", 900));

        assert!(first.is_stalled());
        assert!(second.is_stalled());
        match second {
            Verdict::Stalled { delay, anchor } => {
                assert_eq!(delay, Duration::from_secs(900));
                assert_eq!(anchor.timestamp, 0);
            }
            other => panic!("expected stall, got {other:?}"),
        }
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_uses_latest_entry_of_unsorted_history() {
        let mut history = History::new(5);
        history.push(obs("new", 500));
        history.push(obs("old", 100));

        let verdict = detector().evaluate(&mut history, obs("new", 500 + INTERVAL as i64));
        assert!(verdict.is_stalled());
    }

    #[test]
    fn test_clock_skew_counts_as_zero_delay() {
        let mut history = History::from_observations(vec![obs("h", 1_000)], 5);
        let verdict = detector().evaluate(&mut history, obs("h", 900));
        assert_eq!(
            verdict,
            Verdict::Waiting {
                delay: Duration::ZERO
            }
        );
    }

    #[test]
    fn test_retention_bound_under_progress() {
        let max = 4;
        let mut history = History::new(max);
        let detector = detector();

        for t in 0..10_i64 {
            detector.evaluate(&mut history, obs(&format!("h{t}"), t * 10));
            assert!(history.len() <= max);
        }

        let timestamps: Vec<i64> = history.iter().map(|o| o.timestamp).collect();
        assert_eq!(timestamps, vec![60, 70, 80, 90]);
    }

    #[test]
    fn test_progress_reports_evictions() {
        let mut history = History::from_observations(vec![obs("a", 1), obs("b", 2)], 2);
        let verdict = detector().evaluate(&mut history, obs("c", 3));
        assert_eq!(
            verdict,
            Verdict::Progressed {
                previous: "b".into(),
                evicted: 1
            }
        );
    }

    #[test]
    fn test_verdict_state_names() {
        assert_eq!(Verdict::Baseline.state(), "baseline_established");
        assert_eq!(
            Verdict::Waiting {
                delay: Duration::ZERO
            }
            .state(),
            "stalled_below_threshold"
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(300)), "5m0s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h2m3s");
    }
}
