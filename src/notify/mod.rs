//! Alert delivery.
//!
//! The monitor talks to a single [`Notifier`]. In production that is a
//! [`FanoutNotifier`] forwarding to every enabled chat webhook; tests use
//! the recording double from [`crate::testing`].

pub mod dingtalk;
pub mod lark;
mod sign;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::config::Config;
use crate::error::{IntoWatchError, Result, WatchError};

pub use dingtalk::DingTalkNotifier;
pub use lark::LarkNotifier;

/// Timeout applied to every webhook request.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// How loudly an alert should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Color tag understood by the chat cards.
    #[must_use]
    pub fn color(&self) -> &'static str {
        match self {
            Self::Info => "green",
            Self::Warning => "yellow",
            Self::Critical => "red",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.color())
    }
}

/// A human-readable alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub severity: Severity,
    pub body: String,
    /// Mention everyone in the channel.
    pub urgent: bool,
}

impl Alert {
    #[must_use]
    pub fn new(title: impl Into<String>, severity: Severity, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            severity,
            body: body.into(),
            urgent: false,
        }
    }

    #[must_use]
    pub fn urgent(mut self) -> Self {
        self.urgent = true;
        self
    }
}

/// Capability to deliver an alert through some channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short channel name used in logs and errors.
    fn channel(&self) -> &str;

    /// Delivers `alert`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Notify`] if the channel rejects or never
    /// receives the alert.
    async fn send(&self, alert: &Alert) -> Result<()>;
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn channel(&self) -> &str {
        (**self).channel()
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        (**self).send(alert).await
    }
}

/// Sends every alert to all configured channels in turn.
///
/// Every channel is attempted even if an earlier one fails. With no
/// channels, alerts are written to the log instead.
#[derive(Default)]
pub struct FanoutNotifier {
    channels: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_channel(mut self, channel: impl Notifier + 'static) -> Self {
        self.channels.push(Box::new(channel));
        self
    }

    /// Builds the channels enabled in `config`.
    ///
    /// A channel whose webhook URL does not parse is skipped with a warning,
    /// so a broken alert setup never blocks the check itself.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .into_watch_notify("http")?;

        let mut notifier = Self::new();
        if config.ding.enable {
            match DingTalkNotifier::new(client.clone(), &config.ding) {
                Ok(channel) => notifier = notifier.with_channel(channel),
                Err(e) => warn!(channel = "dingtalk", error = %e, "Skipping alert channel"),
            }
        }
        if config.lark.enable {
            match LarkNotifier::new(client, &config.lark) {
                Ok(channel) => notifier = notifier.with_channel(channel),
                Err(e) => warn!(channel = "lark", error = %e, "Skipping alert channel"),
            }
        }
        Ok(notifier)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    fn channel(&self) -> &str {
        "fanout"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        if self.channels.is_empty() {
            warn!(
                title = %alert.title,
                severity = %alert.severity,
                body = %alert.body,
                "No alert channel configured"
            );
            return Ok(());
        }

        let mut failures = Vec::new();
        for channel in &self.channels {
            if let Err(e) = channel.send(alert).await {
                error!(channel = channel.channel(), error = %e, "Alert delivery failed");
                failures.push((channel.channel().to_string(), e.to_string()));
            }
        }

        if failures.is_empty() {
            return Ok(());
        }

        let (names, messages): (Vec<_>, Vec<_>) = failures.into_iter().unzip();
        Err(WatchError::notify(names.join(","), messages.join("; ")))
    }
}
