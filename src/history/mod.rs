//! Bounded, time-ordered history of height observations.
//!
//! A [`History`] is the only state that survives between runs. It is kept
//! sorted by timestamp, grows only by appending, and sheds its oldest
//! entries once it holds more than `max_records` observations.

pub mod store;

use std::collections::VecDeque;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

pub use store::{FileHistoryStore, HistoryStore, RecordLock};

/// A single timestamped height sample.
///
/// Field names on disk match the record files written by earlier releases
/// of the monitor (`Height`, `Timestamp`, `Time`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Observation {
    /// Opaque progress token, compared by equality only.
    #[serde(rename = "Height", alias = "height")]
    pub height: String,
    /// Unix seconds at which the height was observed.
    #[serde(rename = "Timestamp", alias = "timestamp")]
    pub timestamp: i64,
    /// Human-readable form of `timestamp`.
    #[serde(rename = "Time", alias = "time", default)]
    pub time: String,
}

impl Observation {
    /// Creates an observation from raw parts.
    #[must_use]
    pub fn new(height: impl Into<String>, timestamp: i64, time: impl Into<String>) -> Self {
        Self {
            height: height.into(),
            timestamp,
            time: time.into(),
        }
    }

    /// Creates an observation of `height` taken at `at`.
    #[must_use]
    pub fn observed_at<Tz>(height: impl Into<String>, at: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        Self {
            height: height.into(),
            timestamp: at.timestamp(),
            time: at.format("%Y-%m-%d %H:%M:%S%.3f %:z").to_string(),
        }
    }
}

/// Ordered observations with a retention bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: VecDeque<Observation>,
    max_records: usize,
}

impl History {
    /// Creates an empty history holding at most `max_records` entries.
    ///
    /// A bound of zero is raised to one so the stall anchor always fits.
    #[must_use]
    pub fn new(max_records: usize) -> Self {
        let max_records = max_records.max(1);
        Self {
            entries: VecDeque::with_capacity(max_records),
            max_records,
        }
    }

    /// Builds a history from persisted observations.
    ///
    /// The input is stable-sorted by timestamp so out-of-order writes are
    /// tolerated. Entries beyond the bound are kept until the next append.
    #[must_use]
    pub fn from_observations<I>(observations: I, max_records: usize) -> Self
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut history = Self::new(max_records);
        history.entries.extend(observations);
        history.sort();
        history
    }

    /// Returns the retention bound.
    #[must_use]
    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Returns the number of stored observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been observed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the most recent observation.
    #[must_use]
    pub fn last(&self) -> Option<&Observation> {
        self.entries.back()
    }

    /// Iterates observations oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.entries.iter()
    }

    /// Copies the observations out, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Observation> {
        self.entries.iter().cloned().collect()
    }

    /// Re-establishes timestamp order. Equal timestamps keep their order.
    pub fn sort(&mut self) {
        self.entries
            .make_contiguous()
            .sort_by_key(|observation| observation.timestamp);
    }

    /// Appends an observation and drops the oldest entries beyond the bound.
    ///
    /// Returns how many entries were evicted.
    pub fn push(&mut self, observation: Observation) -> usize {
        self.entries.push_back(observation);
        let mut evicted = 0;
        while self.entries.len() > self.max_records {
            self.entries.pop_front();
            evicted += 1;
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn obs(height: &str, timestamp: i64) -> Observation {
        Observation::new(height, timestamp, "")
    }

    #[test]
    fn test_new_raises_zero_bound_to_one() {
        let history = History::new(0);
        assert_eq!(history.max_records(), 1);
        assert!(history.is_empty());
    }

    #[test]
    fn test_push_keeps_most_recent_entries() {
        let mut history = History::new(3);
        for t in 1..=5 {
            history.push(obs(&t.to_string(), t));
        }

        assert_eq!(history.len(), 3);
        let timestamps: Vec<i64> = history.iter().map(|o| o.timestamp).collect();
        assert_eq!(timestamps, vec![3, 4, 5]);
    }

    #[test]
    fn test_push_reports_evictions() {
        let mut history = History::new(2);
        assert_eq!(history.push(obs("a", 1)), 0);
        assert_eq!(history.push(obs("b", 2)), 0);
        assert_eq!(history.push(obs("c", 3)), 1);
    }

    #[test]
    fn test_from_observations_sorts_stably() {
        let history = History::from_observations(
            vec![obs("c", 30), obs("a", 10), obs("b1", 20), obs("b2", 20)],
            10,
        );
        let heights: Vec<&str> = history.iter().map(|o| o.height.as_str()).collect();
        assert_eq!(heights, vec!["a", "b1", "b2", "c"]);
        assert_eq!(history.last().map(|o| o.height.as_str()), Some("c"));
    }

    #[test]
    fn test_from_observations_does_not_truncate() {
        let history = History::from_observations((1..=5).map(|t| obs("h", t)), 2);
        assert_eq!(history.len(), 5);
    }

    #[test]
    fn test_oversized_history_shrinks_on_next_push() {
        let mut history = History::from_observations((1..=5).map(|t| obs("h", t)), 2);
        history.push(obs("new", 6));
        let timestamps: Vec<i64> = history.iter().map(|o| o.timestamp).collect();
        assert_eq!(timestamps, vec![5, 6]);
    }

    #[test]
    fn test_observed_at_labels_timestamp() {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let at = offset.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let observation = Observation::observed_at("100", &at);

        assert_eq!(observation.height, "100");
        assert_eq!(observation.timestamp, at.timestamp());
        assert_eq!(observation.time, "2024-03-01 12:30:00.000 +08:00");
    }

    #[test]
    fn test_observed_at_utc() {
        let at = Utc.timestamp_opt(0, 0).unwrap();
        let observation = Observation::observed_at("0x0", &at);
        assert_eq!(observation.timestamp, 0);
        assert!(observation.time.starts_with("1970-01-01 00:00:00"));
    }
}
