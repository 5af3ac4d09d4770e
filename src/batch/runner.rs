//! Batch runner.
//!
//! Applies one operation to every site of a batch in order, then reloads
//! the web server exactly once, whatever happened to the sites.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::exec::Executor;
use crate::session::{Batch, SessionContext};

use super::report::{Artifact, BatchReport, RestartOutcome, SiteOutcome};

/// An operation applied to one site.
#[async_trait]
pub trait SiteOperation: Send + Sync {
    /// Name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Applies the operation, returning the files it wrote.
    async fn apply(&self, ctx: &SessionContext, exec: &dyn Executor) -> Result<Vec<Artifact>>;
}

/// Runs an operation over a batch.
pub struct BatchRunner<'a> {
    /// Executor for the batch's host.
    exec: &'a dyn Executor,
    /// Whether to keep going after a site fails.
    continue_on_error: bool,
}

impl std::fmt::Debug for BatchRunner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("continue_on_error", &self.continue_on_error)
            .finish_non_exhaustive()
    }
}

impl<'a> BatchRunner<'a> {
    /// Creates a runner that continues after failures.
    #[must_use]
    pub const fn new(exec: &'a dyn Executor) -> Self {
        Self {
            exec,
            continue_on_error: true,
        }
    }

    /// Stops at the first failing site when `fail_fast` is set.
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.continue_on_error = !fail_fast;
        self
    }

    /// Runs `operation` over `batch`.
    ///
    /// Site failures are recorded in the report rather than returned. The
    /// reload runs once at the end, also for an empty batch.
    pub async fn run(&self, batch: &Batch, operation: &dyn SiteOperation) -> BatchReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let host = batch.host.shortname.clone();

        info!(
            run_id = %run_id,
            host = host.as_str(),
            operation = operation.name(),
            "Running {} on {} sites",
            operation.name(),
            batch.contexts.len()
        );

        let mut sites = Vec::with_capacity(batch.contexts.len());
        let mut stopped = false;

        for ctx in &batch.contexts {
            if stopped {
                sites.push(SiteOutcome::not_run(ctx));
                continue;
            }

            info!("[{}] {}", ctx.site, operation.name());
            match operation.apply(ctx, self.exec).await {
                Ok(artifacts) => {
                    info!("[{}] Done", ctx.site);
                    sites.push(SiteOutcome::succeeded(ctx, artifacts));
                }
                Err(e) => {
                    error!("[{}] {} failed: {e}", ctx.site, operation.name());
                    sites.push(SiteOutcome::failed(ctx, e.to_string()));
                    if !self.continue_on_error {
                        warn!("Stopping batch after failure of {}", ctx.site);
                        stopped = true;
                    }
                }
            }
        }

        let restart = match self.exec.restart().await {
            Ok(()) => {
                info!(host = host.as_str(), "Web server reloaded");
                RestartOutcome {
                    success: true,
                    error: None,
                }
            }
            Err(e) => {
                error!(host = host.as_str(), "Reload failed: {e}");
                RestartOutcome {
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        };

        let report = BatchReport {
            run_id,
            host,
            operation: operation.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            sites,
            skipped: batch.skipped.clone(),
            restart,
        };
        info!(run_id = %run_id, duration_ms = report.duration_ms(), "{report}");
        report
    }
}
