//! Environment and source checkout provisioning.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ResolveError, Result};
use crate::exec::{Executor, shell_quote};
use crate::session::SessionContext;

/// How an existing checkout is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionMode {
    /// First-time setup: an existing checkout is left alone.
    Initial,
    /// Deployment: an existing checkout is pulled from its upstream.
    Update,
}

/// Creates the site environment and checkout.
///
/// When the repository is missing it is cloned, its branch is checked out
/// and the settings directory and repository are added to the environment's
/// import path. When it exists, `Initial` does nothing more and `Update`
/// pulls the configured branch.
///
/// # Errors
///
/// Returns `MissingSiteField` when a clone is needed but `clone_url` is not
/// set, or the first failing command.
pub async fn provision(
    ctx: &SessionContext,
    exec: &dyn Executor,
    mode: ProvisionMode,
) -> Result<()> {
    ensure_environment(ctx, exec).await?;

    if exec.exists(&ctx.repository_path).await? {
        match mode {
            ProvisionMode::Initial => {
                debug!(site = ctx.site.as_str(), "Repository present, nothing to provision");
            }
            ProvisionMode::Update => {
                let (parent, branch) = ctx.upstream();
                info!("[{}] Pulling {parent}/{branch}", ctx.site);
                exec.run(&ctx.in_environment(&format!(
                    "cd {} && git pull {} {}",
                    shell_quote(&ctx.repository_path),
                    shell_quote(parent),
                    shell_quote(branch)
                )))
                .await?;
            }
        }
        return Ok(());
    }

    let clone_url = ctx.settings.settings.clone_url.as_deref().ok_or_else(|| {
        ResolveError::MissingSiteField {
            site: ctx.site.clone(),
            field: "clone_url",
        }
    })?;

    info!("[{}] Cloning {clone_url}", ctx.site);
    exec.run(&ctx.in_environment(&format!(
        "git clone {} {}",
        shell_quote(clone_url),
        shell_quote(&ctx.repository_path)
    )))
    .await?;

    checkout(ctx, exec).await?;
    register_paths(ctx, exec).await
}

/// Creates the virtualenv unless its directory already exists.
async fn ensure_environment(ctx: &SessionContext, exec: &dyn Executor) -> Result<()> {
    if exec.exists(&ctx.environment_path).await? {
        return Ok(());
    }
    info!("[{}] Creating environment {}", ctx.site, ctx.environment_path);
    exec.run(&ctx.with_wrapper(&format!("mkvirtualenv {}", shell_quote(&ctx.site))))
        .await?;
    Ok(())
}

/// Checks out the configured branch, creating it from the upstream when
/// it does not exist locally.
async fn checkout(ctx: &SessionContext, exec: &dyn Executor) -> Result<()> {
    let (parent, branch) = ctx.upstream();
    let repo = shell_quote(&ctx.repository_path);

    let probe = exec
        .run(&format!(
            "cd {repo} && git rev-parse --verify --quiet {} >/dev/null && echo yes || echo no",
            shell_quote(&format!("refs/heads/{branch}"))
        ))
        .await?;

    let command = if probe.last_line() == Some("yes") {
        format!(
            "cd {repo} && git checkout {b} && git pull {p} {b}",
            b = shell_quote(branch),
            p = shell_quote(parent)
        )
    } else {
        format!(
            "cd {repo} && git checkout -b {} {}",
            shell_quote(branch),
            shell_quote(&format!("{parent}/{branch}"))
        )
    };
    exec.run(&ctx.in_environment(&command)).await?;
    Ok(())
}

/// Adds the settings root, the repository and the shared code directory
/// to the environment's import path.
async fn register_paths(ctx: &SessionContext, exec: &dyn Executor) -> Result<()> {
    let mut paths = vec![ctx.settings_root.as_str(), ctx.repository_path.as_str()];
    if let Some(code_dir) = &ctx.host.code_dir {
        paths.push(code_dir);
    }
    for path in paths {
        exec.run(&ctx.in_environment(&format!("add2virtualenv {}", shell_quote(path))))
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::fake::RecordingExecutor;
    use crate::ops::testing::{context, context_on_host};

    #[tokio::test]
    async fn test_fresh_provision_clones_and_registers() {
        let ctx = context("");
        let exec = RecordingExecutor::new()
            .creates_on("mkvirtualenv", "/srv/envs/blog")
            .creates_on("git clone", "/srv/envs/blog/blog")
            .responds("rev-parse", "no\n");

        provision(&ctx, &exec, ProvisionMode::Initial).await.unwrap();

        assert_eq!(exec.count("mkvirtualenv blog"), 1);
        assert_eq!(exec.count("git clone git@example.com:team/blog.git /srv/envs/blog/blog"), 1);
        assert_eq!(exec.count("git checkout -b master origin/master"), 1);
        assert_eq!(exec.count("add2virtualenv"), 2);
        assert_eq!(exec.count("add2virtualenv /srv/staging_settings"), 1);
        assert_eq!(exec.count("add2virtualenv /srv/envs/blog/blog"), 1);
    }

    #[tokio::test]
    async fn test_provision_twice_is_idempotent() {
        let ctx = context("");
        let exec = RecordingExecutor::new()
            .creates_on("mkvirtualenv", "/srv/envs/blog")
            .creates_on("git clone", "/srv/envs/blog/blog");

        provision(&ctx, &exec, ProvisionMode::Initial).await.unwrap();
        let after_first = exec.commands().len();
        provision(&ctx, &exec, ProvisionMode::Initial).await.unwrap();

        assert_eq!(exec.commands().len(), after_first);
        assert_eq!(exec.count("git clone"), 1);
        assert_eq!(exec.count("git checkout"), 1);
        assert_eq!(exec.count("mkvirtualenv"), 1);
    }

    #[tokio::test]
    async fn test_existing_branch_is_pulled() {
        let ctx = context("git_branch_name: next\ngit_parent: upstream");
        let exec = RecordingExecutor::new()
            .with_path("/srv/envs/blog")
            .responds("rev-parse", "hook noise\nyes\n");

        provision(&ctx, &exec, ProvisionMode::Initial).await.unwrap();

        assert_eq!(exec.count("git checkout next && git pull upstream next"), 1);
        assert_eq!(exec.count("checkout -b"), 0);
        assert_eq!(exec.count("mkvirtualenv"), 0);
    }

    #[tokio::test]
    async fn test_update_pulls_existing_checkout() {
        let ctx = context("");
        let exec = RecordingExecutor::new()
            .with_path("/srv/envs/blog")
            .with_path("/srv/envs/blog/blog");

        provision(&ctx, &exec, ProvisionMode::Update).await.unwrap();

        assert_eq!(exec.count("cd /srv/envs/blog/blog && git pull origin master"), 1);
        assert_eq!(exec.count("git clone"), 0);
    }

    #[tokio::test]
    async fn test_code_dir_is_registered() {
        let ctx = context_on_host("", "code_dir: /srv/code");
        let exec = RecordingExecutor::new().with_path("/srv/envs/blog");

        provision(&ctx, &exec, ProvisionMode::Initial).await.unwrap();
        assert_eq!(exec.count("add2virtualenv /srv/code"), 1);
    }

    #[tokio::test]
    async fn test_clone_failure_propagates() {
        let ctx = context("");
        let exec = RecordingExecutor::new()
            .with_path("/srv/envs/blog")
            .fails_on("git clone");

        assert!(provision(&ctx, &exec, ProvisionMode::Initial).await.is_err());
        assert_eq!(exec.count("add2virtualenv"), 0);
    }

    #[tokio::test]
    async fn test_missing_clone_url() {
        let ctx = context("clone_url: ~");
        let exec = RecordingExecutor::new().with_path("/srv/envs/blog");

        let err = provision(&ctx, &exec, ProvisionMode::Initial).await.unwrap_err();
        assert!(err.to_string().contains("clone_url"));
    }
}
