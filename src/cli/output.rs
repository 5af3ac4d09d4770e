//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::batch::{BatchReport, SiteStatus};
use crate::config::{ConfigHasher, ValidationResult};
use crate::resolver::EffectiveSettings;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Site outcome row for table display.
#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "Site")]
    site: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Files")]
    files: usize,
    #[tabled(rename = "Settings")]
    fingerprint: String,
    #[tabled(rename = "Error")]
    error: String,
}

/// Host listing row for table display.
#[derive(Tabled)]
struct HostSitesRow {
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "Sites")]
    sites: String,
}

/// JSON shape of `show`. Settings keys that are not strings fail to serialize.
#[derive(Serialize)]
struct SettingsJson<'a> {
    site: &'a str,
    host: &'a str,
    fingerprint: String,
    settings: &'a serde_yaml::Mapping,
}

/// Sites deployed on one host.
#[derive(Debug, Clone, Serialize)]
pub struct HostSites {
    /// Host short name.
    pub host: String,
    /// Fully qualified hostname.
    pub hostname: String,
    /// Applicable site keys, in declaration order.
    pub sites: Vec<String>,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a batch report for display.
    #[must_use]
    pub fn format_report(&self, report: &BatchReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    /// Formats a report as text.
    fn format_report_text(report: &BatchReport) -> String {
        let mut output = String::new();

        let _ = write!(
            output,
            "\n{} {} on {} (run {})\n\n",
            "▶".cyan(),
            report.operation.bold(),
            report.host,
            ConfigHasher::new().short_hash(&report.run_id.to_string())
        );

        if report.sites.is_empty() {
            output.push_str("   No sites to run.\n");
        } else {
            let rows: Vec<SiteRow> = report
                .sites
                .iter()
                .map(|s| SiteRow {
                    site: s.site.clone(),
                    status: Self::format_site_status(s.status),
                    files: s.artifacts.len(),
                    fingerprint: ConfigHasher::new().short_hash(&s.settings_fingerprint),
                    error: s
                        .error
                        .as_deref()
                        .map(|e| Self::truncate(e, 60))
                        .unwrap_or_default(),
                })
                .collect();
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        if !report.skipped.is_empty() {
            let _ = write!(output, "\n{} Skipped:\n", "⚠".yellow());
            for skipped in &report.skipped {
                let _ = writeln!(output, "   - {}: {}", skipped.site, skipped.reason);
            }
        }

        let restart = if report.restart.success {
            "reloaded".green().to_string()
        } else {
            format!(
                "{} ({})",
                "reload failed".red(),
                report.restart.error.as_deref().unwrap_or("unknown error")
            )
        };
        let _ = writeln!(output, "\nWeb server: {restart}");

        let summary = if report.success() {
            format!("{} {report}", "✓".green())
        } else {
            format!("{} {report}", "✗".red())
        };
        let _ = writeln!(output, "{summary}");

        output
    }

    /// Formats validation results.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid\n", "✓".green())
                } else {
                    let mut output = format!(
                        "{} Configuration has {} error(s):\n",
                        "✗".red(),
                        result.error_count()
                    );
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                    output
                };

                if show_warnings && result.warning_count() > 0 {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                } else if result.warning_count() > 0 {
                    let _ = writeln!(
                        output,
                        "   ({} warning(s), use --warnings to show)",
                        result.warning_count()
                    );
                }

                output
            }
        }
    }

    /// Formats the site listing of one or more hosts.
    #[must_use]
    pub fn format_sites(&self, hosts: &[HostSites]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(hosts).unwrap_or_default(),
            OutputFormat::Text => {
                let rows: Vec<HostSitesRow> = hosts
                    .iter()
                    .map(|h| HostSitesRow {
                        host: h.host.clone(),
                        hostname: h.hostname.clone(),
                        sites: if h.sites.is_empty() {
                            "-".dimmed().to_string()
                        } else {
                            h.sites.join(", ")
                        },
                    })
                    .collect();
                format!("{}\n", Table::new(rows))
            }
        }
    }

    /// Formats the effective settings of a site.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be serialized.
    pub fn format_settings(&self, settings: &EffectiveSettings) -> crate::error::Result<String> {
        match self.format {
            OutputFormat::Json => {
                let json = SettingsJson {
                    site: &settings.site,
                    host: &settings.host,
                    fingerprint: settings.fingerprint(),
                    settings: &settings.values,
                };
                serde_json::to_string_pretty(&json).map_err(|e| {
                    crate::error::StitchError::internal(format!("Failed to serialize settings: {e}"))
                })
            }
            OutputFormat::Text => {
                let mut output = format!(
                    "# {} on {} (settings {})\n",
                    settings.site.bold(),
                    settings.host,
                    ConfigHasher::new().short_hash(&settings.fingerprint())
                );
                output.push_str(&settings.to_yaml()?);
                Ok(output)
            }
        }
    }

    /// Formats a site status with color.
    fn format_site_status(status: SiteStatus) -> String {
        match status {
            SiteStatus::Succeeded => "ok".green().to_string(),
            SiteStatus::Failed => "failed".red().to_string(),
            SiteStatus::NotRun => "not run".dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.message("success", &format!("{} {message}", "✓".green()), message)
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.message("error", &format!("{} {message}", "✗".red()), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.message("warning", &format!("{} {message}", "⚠".yellow()), message)
    }

    fn message(&self, status: &str, text: &str, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": status, "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => text.to_string(),
        }
    }
}
