//! Testing infrastructure for stallwatch.
//!
//! This module provides mocks, fixtures, and assertions for testing a
//! monitoring run without a real node, webhook or shell.
//!
//! # Architecture
//!
//! The testing infrastructure is organized into:
//! - **Mocks**: Test doubles for [`HeightSource`](crate::source::HeightSource),
//!   [`Notifier`](crate::notify::Notifier),
//!   [`CommandRunner`](crate::recovery::CommandRunner) and
//!   [`HistoryStore`](crate::history::HistoryStore)
//! - **Fixtures**: Temporary config and record files (test-only)
//! - **Assertions**: Custom assertions for histories, verdicts and errors
//!
//! # Example
//!
//! ```rust,ignore
//! use stallwatch::testing::{MockHeightSource, MockCommandRunner, RecordingNotifier};
//!
//! let source = MockHeightSource::new("100");
//! let runner = MockCommandRunner::new().with_failure("systemctl", 1, "denied");
//! let notifier = RecordingNotifier::new();
//! ```

pub mod assertions;
#[cfg(test)]
pub mod fixtures;
pub mod mocks;

// Re-export commonly used types
pub use assertions::*;
#[cfg(test)]
pub use fixtures::*;
pub use mocks::*;
