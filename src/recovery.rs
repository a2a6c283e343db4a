//! Stall alerts and recovery command execution.
//!
//! When a run ends in a stall, [`ActionRunner`] sends the stall alert,
//! announces the recovery plan, and then runs the configured commands one
//! after another. The first command that fails stops the sequence.
//! Alerts are best-effort: a failed alert is logged and never keeps the
//! recovery commands from running.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::detector::format_duration;
use crate::error::{Result, WatchError};
use crate::notify::{Alert, Notifier, Severity};

/// One external program invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl RecoveryCommand {
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a command from an argv list; `None` if the list is empty.
    #[must_use]
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.iter().cloned()))
    }

    /// Program and arguments joined by spaces.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for RecoveryCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Result of a process that was started.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout followed by stderr.
    pub output: String,
}

impl CommandOutput {
    #[must_use]
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            output: output.into(),
        }
    }

    #[must_use]
    pub fn failure(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            output: output.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    fn status_text(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit status: {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Capability to run one external command.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command` to completion and captures its output.
    ///
    /// A process that starts and exits non-zero is still `Ok`; callers
    /// inspect [`CommandOutput::is_success`].
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started.
    async fn run(&self, command: &RecoveryCommand) -> Result<CommandOutput>;
}

/// Runs commands as child processes of the monitor.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, command: &RecoveryCommand) -> Result<CommandOutput> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            exit_code: output.status.code(),
            output: combined,
        })
    }
}

/// What happened during one recovery attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Whether the restart announcement reached its channels.
    pub announced: bool,
    /// Commands that ran successfully, in order.
    pub completed: Vec<(RecoveryCommand, CommandOutput)>,
}

/// Builds the stall alert body, e.g. `stopped for 6m0s >= 5m0s`.
#[must_use]
pub fn stall_message(delay: Duration, interval: Duration) -> String {
    format!(
        "stopped for {} >= {}",
        format_duration(delay),
        format_duration(interval)
    )
}

/// Builds the restart announcement body: one command line per line.
#[must_use]
pub fn recovery_plan(commands: &[RecoveryCommand]) -> String {
    commands
        .iter()
        .map(|command| format!("{}\n", command.command_line()))
        .collect()
}

/// Sends stall alerts and runs the recovery sequence.
pub struct ActionRunner<'a> {
    name: &'a str,
    notifier: &'a dyn Notifier,
    runner: &'a dyn CommandRunner,
}

impl<'a> ActionRunner<'a> {
    #[must_use]
    pub fn new(name: &'a str, notifier: &'a dyn Notifier, runner: &'a dyn CommandRunner) -> Self {
        Self {
            name,
            notifier,
            runner,
        }
    }

    /// Sends the stall alert. Returns whether it was delivered.
    pub async fn notify_stall(&self, delay: Duration, interval: Duration) -> bool {
        let alert = Alert::new(
            format!("node : {}", self.name),
            Severity::Warning,
            stall_message(delay, interval),
        );
        self.send_best_effort(&alert).await
    }

    /// Announces and runs `commands` in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Exec`] for the first command that cannot be
    /// started or exits unsuccessfully; later commands are not attempted.
    pub async fn run_recovery(&self, commands: &[RecoveryCommand]) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();
        if commands.is_empty() {
            warn!("Stall detected but no recovery commands are configured");
            return Ok(report);
        }

        let alert = Alert::new(
            format!("restart : {}", self.name),
            Severity::Warning,
            recovery_plan(commands),
        );
        report.announced = self.send_best_effort(&alert).await;

        for (index, command) in commands.iter().enumerate() {
            info!(index, command = %command, "Running recovery command");

            let outcome = match self.runner.run(command).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(index, command = %command, error = %e, "Recovery command did not start");
                    return Err(WatchError::Exec {
                        index,
                        command: command.command_line(),
                        message: e.to_string(),
                        output: String::new(),
                    });
                }
            };

            info!(index, output = %outcome.output.trim_end(), "Recovery command output");

            if !outcome.is_success() {
                error!(index, command = %command, status = %outcome.status_text(), "Recovery command failed");
                return Err(WatchError::Exec {
                    index,
                    command: command.command_line(),
                    message: outcome.status_text(),
                    output: outcome.output,
                });
            }

            report.completed.push((command.clone(), outcome));
        }

        Ok(report)
    }

    async fn send_best_effort(&self, alert: &Alert) -> bool {
        match self.notifier.send(alert).await {
            Ok(()) => true,
            Err(e) => {
                error!(title = %alert.title, error = %e, "Failed to send alert");
                false
            }
        }
    }
}
