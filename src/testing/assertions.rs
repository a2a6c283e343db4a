//! Custom assertions for domain-specific testing.
//!
//! Provides expressive assertions for observation histories and verdicts.

use crate::detector::Verdict;
use crate::error::WatchError;
use crate::history::{History, Observation};

/// Assert that a history holds exactly `expected` heights, oldest first.
///
/// # Panics
///
/// Panics with both height lists if they differ.
///
/// # Example
///
/// ```rust,ignore
/// assert_heights(&history, &["100", "101"]);
/// ```
pub fn assert_heights(history: &History, expected: &[&str]) {
    let actual: Vec<&str> = history.iter().map(|o| o.height.as_str()).collect();
    assert_eq!(
        actual, expected,
        "Expected history heights {expected:?}, got {actual:?}"
    );
}

/// Assert that persisted observations carry exactly `expected` heights.
///
/// # Panics
///
/// Panics if the heights differ.
pub fn assert_saved_heights(observations: &[Observation], expected: &[&str]) {
    let actual: Vec<&str> = observations.iter().map(|o| o.height.as_str()).collect();
    assert_eq!(
        actual, expected,
        "Expected saved heights {expected:?}, got {actual:?}"
    );
}

/// Assert that a verdict reports a stall.
///
/// # Panics
///
/// Panics if the verdict is anything but [`Verdict::Stalled`].
pub fn assert_stalled(verdict: &Verdict) {
    assert!(
        verdict.is_stalled(),
        "Expected a stalled verdict, got {verdict:?}"
    );
}

/// Assert that an error is an exec failure of the command at `index`.
///
/// # Panics
///
/// Panics if the error is of another kind or names another index.
pub fn assert_exec_failure(error: &WatchError, expected_index: usize) {
    match error {
        WatchError::Exec { index, .. } => assert_eq!(
            *index, expected_index,
            "Expected command #{expected_index} to fail, but #{index} did"
        ),
        other => panic!("Expected an exec failure, got {other:?}"),
    }
}
