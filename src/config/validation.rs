//! Configuration validation for stallwatch.
//!
//! # Example
//!
//! ```rust,ignore
//! use stallwatch::config::{Config, ConfigValidator};
//!
//! let config = Config::load(Path::new("config.toml"))?;
//! let report = ConfigValidator::new(&config).validate();
//!
//! if !report.is_valid() {
//!     for error in &report.errors {
//!         eprintln!("Error: {}", error);
//!     }
//!     std::process::exit(report.exit_code());
//! }
//! ```

use reqwest::Url;

use super::Config;

/// HTTP methods accepted for the height request.
pub const SUPPORTED_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Result of configuration validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Errors that prevent the configuration from being used.
    pub errors: Vec<String>,
    /// Warnings that don't prevent use but indicate potential issues.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Create a new empty validation report.
    ///
    /// An empty report is considered valid.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the configuration is valid (no errors).
    ///
    /// Warnings do not affect validity.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the process exit code for the validation: 0 if valid,
    /// otherwise the configuration error code.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.is_valid() {
            0
        } else {
            5
        }
    }

    /// Generate a human-readable summary of the validation result.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_valid() {
            if self.warnings.is_empty() {
                "Configuration is valid.".to_string()
            } else {
                format!(
                    "Configuration is valid with {} warning(s).",
                    self.warnings.len()
                )
            }
        } else {
            format!(
                "Configuration is invalid with {} error(s).",
                self.errors.len()
            )
        }
    }

    /// Full report: errors, warnings, then the summary line.
    #[must_use]
    pub fn verbose_report(&self) -> String {
        let mut lines = Vec::new();

        if !self.errors.is_empty() {
            lines.push(format!("Errors ({}):", self.errors.len()));
            for error in &self.errors {
                lines.push(format!("  \u{2717} {}", error));
            }
            lines.push(String::new());
        }

        if !self.warnings.is_empty() {
            lines.push(format!("Warnings ({}):", self.warnings.len()));
            for warning in &self.warnings {
                lines.push(format!("  \u{26a0} {}", warning));
            }
            lines.push(String::new());
        }

        lines.push(format!("Status: {}", self.summary()));
        lines.join("\n")
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Checks a parsed [`Config`] for values the monitor cannot work with.
#[derive(Debug)]
pub struct ConfigValidator<'a> {
    config: &'a Config,
}

impl<'a> ConfigValidator<'a> {
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Runs every check and collects the findings.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        self.check_node(&mut report);
        self.check_commands(&mut report);
        self.check_channels(&mut report);
        report
    }

    fn check_node(&self, report: &mut ValidationReport) {
        let node = &self.config.node_check;

        if node.check_interval_s <= 0 {
            report.error(format!(
                "node_check.check_interval_s must be positive (got {})",
                node.check_interval_s
            ));
        }

        if node.max_record_num < 1 {
            report.warning(format!(
                "node_check.max_record_num is {}; using 1",
                node.max_record_num
            ));
        }

        if node.url.trim().is_empty() {
            report.error("node_check.url is empty");
        } else if !(node.url.starts_with("http://") || node.url.starts_with("https://")) {
            report.error(format!(
                "node_check.url must be an http(s) URL (got '{}')",
                node.url
            ));
        }

        let method = node.method.to_uppercase();
        if !SUPPORTED_METHODS.contains(&method.as_str()) {
            report.error(format!("node_check.method '{}' is not supported", node.method));
        }

        if node.height_json_path.trim().is_empty() {
            report.error("node_check.height_json_path is empty");
        }

        if node.file.as_os_str().is_empty() {
            report.error("node_check.file is empty");
        }

        if node.timeout_s == Some(0) {
            report.error("node_check.timeout_s must be positive when set");
        }
    }

    fn check_commands(&self, report: &mut ValidationReport) {
        let content = &self.config.commands.content;
        if content.is_empty() {
            report.warning("no recovery commands configured; stalls will only be reported");
        }
        for (index, argv) in content.iter().enumerate() {
            if argv.first().is_none_or(|program| program.trim().is_empty()) {
                report.error(format!("commands.content[{index}] has no program"));
            }
        }
    }

    fn check_channels(&self, report: &mut ValidationReport) {
        let ding = &self.config.ding;
        let lark = &self.config.lark;

        let channels = [("ding", ding.enable, &ding.url), ("lark", lark.enable, &lark.url)];
        for (channel, enable, url) in channels {
            if !enable {
                continue;
            }
            if url.trim().is_empty() {
                report.error(format!("{channel}.enable is set but {channel}.url is empty"));
            } else if let Err(e) = Url::parse(url) {
                report.error(format!("{channel}.url is not a valid URL ({e}): '{url}'"));
            }
        }
        if !ding.enable && !lark.enable {
            report.warning("no alert channel enabled; alerts will only be logged");
        }
    }
}
