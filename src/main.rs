//! Stallwatch - single-shot liveness monitor
//!
//! Run it from cron or a systemd timer. Each invocation performs one check
//! and exits.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::info;

use stallwatch::config::DEFAULT_CONFIG_FILE;
use stallwatch::logging::init_logging;
use stallwatch::{
    Config, ConfigValidator, FanoutNotifier, FileHistoryStore, HistoryStore, HttpHeightSource,
    Monitor, MonitorSettings, RecordLock, SystemCommandRunner, Verdict, WatchError,
};

#[derive(Parser)]
#[command(name = "stallwatch")]
#[command(version)]
#[command(about = "Detects a stalled node and runs recovery commands", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, env = "STALLWATCH_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Fetch the height once, update the record and act on a stall (default)
    Check,

    /// Validate the configuration file
    Validate,

    /// Print the stored observations, oldest first
    History,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            if let WatchError::Exec { output, .. } = &e {
                if !output.trim().is_empty() {
                    eprintln!("{}", output.trim_end().dimmed());
                }
            }
            e.exit_code()
        }
    };

    std::process::exit(code);
}

async fn run(cli: &Cli) -> stallwatch::Result<i32> {
    let config = Config::load(&cli.config)?;

    match cli.command.unwrap_or(Commands::Check) {
        Commands::Check => {
            init_logging(cli.verbose, cli.json_logs, config.log.file.path.as_deref())?;
            check(config).await?;
            Ok(0)
        }
        Commands::Validate => Ok(validate(&config, &cli.config, cli.verbose)),
        Commands::History => {
            init_logging(cli.verbose, cli.json_logs, None)?;
            history(&config)?;
            Ok(0)
        }
    }
}

async fn check(config: Config) -> stallwatch::Result<()> {
    config.ensure_valid()?;

    let _lock = RecordLock::acquire(config.record_path())?;

    let monitor = Monitor::new(
        MonitorSettings::from_config(&config),
        HttpHeightSource::from_config(&config.node_check)?,
        FanoutNotifier::from_config(&config)?,
        SystemCommandRunner,
        FileHistoryStore::new(config.record_path(), config.max_records()),
    );

    let outcome = monitor.run().await?;
    info!(state = outcome.verdict.state(), "Check complete");

    let state = match &outcome.verdict {
        Verdict::Baseline | Verdict::Progressed { .. } => outcome.verdict.state().green(),
        Verdict::Waiting { .. } => outcome.verdict.state().yellow(),
        Verdict::Stalled { .. } => outcome.verdict.state().red().bold(),
    };
    println!("{} {}", state, outcome);

    if let Some(report) = &outcome.recovery {
        for (command, _) in &report.completed {
            println!("  {} {}", "ran".cyan(), command);
        }
    }

    Ok(())
}

fn validate(config: &Config, path: &Path, verbose: bool) -> i32 {
    let report = ConfigValidator::new(config).validate();

    println!("{}", format!("Validating {}", path.display()).bold());
    if verbose {
        println!("{}", report.verbose_report());
        return report.exit_code();
    }

    for error in &report.errors {
        println!("  {} {}", "error:".red().bold(), error);
    }
    for warning in &report.warnings {
        println!("  {} {}", "warning:".yellow(), warning);
    }
    if report.is_valid() {
        println!("{}", report.summary().green());
    } else {
        println!("{}", report.summary().red());
    }

    report.exit_code()
}

fn history(config: &Config) -> stallwatch::Result<()> {
    let path = config.record_path();
    if !path.exists() {
        println!("No record at {}", path.display());
        return Ok(());
    }

    let history = FileHistoryStore::new(path, config.max_records()).load()?;
    if history.is_empty() {
        println!("Record {} is empty", path.display());
        return Ok(());
    }

    println!(
        "{}",
        format!("{} observation(s) in {}", history.len(), path.display()).bold()
    );
    for observation in history.iter() {
        println!(
            "  {}  {:>12}  {}",
            observation.time.dimmed(),
            observation.timestamp,
            observation.height.cyan()
        );
    }

    Ok(())
}
