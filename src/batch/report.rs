//! Batch reports.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::ConfigHasher;
use crate::session::{SessionContext, SkippedSite};

/// A file written to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Path on the host.
    pub path: String,
    /// SHA-256 of the content.
    pub sha256: String,
}

impl Artifact {
    /// Records `content` written to `path`.
    #[must_use]
    pub fn new(path: impl Into<String>, content: &[u8]) -> Self {
        Self {
            path: path.into(),
            sha256: ConfigHasher::new().hash_content(content),
        }
    }
}

/// What happened to one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    /// The operation completed.
    Succeeded,
    /// The operation failed.
    Failed,
    /// The batch stopped before reaching the site.
    NotRun,
}

/// Outcome of the operation on one site.
#[derive(Debug, Clone, Serialize)]
pub struct SiteOutcome {
    /// Site key.
    pub site: String,
    /// Final status.
    pub status: SiteStatus,
    /// Error message when the operation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Files written.
    pub artifacts: Vec<Artifact>,
    /// Fingerprint of the effective settings used.
    pub settings_fingerprint: String,
}

impl SiteOutcome {
    /// A completed site.
    #[must_use]
    pub fn succeeded(ctx: &SessionContext, artifacts: Vec<Artifact>) -> Self {
        Self::new(ctx, SiteStatus::Succeeded, None, artifacts)
    }

    /// A failed site.
    #[must_use]
    pub fn failed(ctx: &SessionContext, error: impl Into<String>) -> Self {
        Self::new(ctx, SiteStatus::Failed, Some(error.into()), Vec::new())
    }

    /// A site the batch never reached.
    #[must_use]
    pub fn not_run(ctx: &SessionContext) -> Self {
        Self::new(ctx, SiteStatus::NotRun, None, Vec::new())
    }

    fn new(
        ctx: &SessionContext,
        status: SiteStatus,
        error: Option<String>,
        artifacts: Vec<Artifact>,
    ) -> Self {
        Self {
            site: ctx.site.clone(),
            status,
            error,
            artifacts,
            settings_fingerprint: ctx.settings.fingerprint(),
        }
    }
}

/// Outcome of the closing web server reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestartOutcome {
    /// Whether the reload succeeded.
    pub success: bool,
    /// Error message when it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one batch on one host.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// Host short name.
    pub host: String,
    /// Operation name.
    pub operation: String,
    /// When the batch started.
    pub started_at: DateTime<Utc>,
    /// When the restart finished.
    pub finished_at: DateTime<Utc>,
    /// Per-site outcomes, in execution order.
    pub sites: Vec<SiteOutcome>,
    /// Requested sites that are not on this host.
    pub skipped: Vec<SkippedSite>,
    /// The closing reload.
    pub restart: RestartOutcome,
}

impl BatchReport {
    /// Returns true if every site ran and succeeded and the reload worked.
    #[must_use]
    pub fn success(&self) -> bool {
        self.restart.success && self.sites.iter().all(|s| s.status == SiteStatus::Succeeded)
    }

    /// Number of sites with the given status.
    #[must_use]
    pub fn count(&self, status: SiteStatus) -> usize {
        self.sites.iter().filter(|s| s.status == status).count()
    }

    /// Elapsed wall time in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} on {}: {} succeeded, {} failed, {} not run, {} skipped, restart {}",
            self.operation,
            self.host,
            self.count(SiteStatus::Succeeded),
            self.count(SiteStatus::Failed),
            self.count(SiteStatus::NotRun),
            self.skipped.len(),
            if self.restart.success { "ok" } else { "failed" }
        )
    }
}
