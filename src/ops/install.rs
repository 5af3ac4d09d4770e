//! Dependency installation.

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::exec::{Executor, join_path, shell_quote};
use crate::session::SessionContext;

/// Options passed to the installer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallOptions {
    /// Reinstall every requirement.
    pub reinstall: bool,
    /// Packages upgraded after the requirements are installed.
    pub upgrade: Vec<String>,
}

/// Installs the site's requirements inside its environment.
///
/// # Errors
///
/// Returns the installer's failure.
pub async fn install_dependencies(
    ctx: &SessionContext,
    exec: &dyn Executor,
    options: &InstallOptions,
) -> Result<()> {
    let requirements = join_path(
        &ctx.repository_path,
        &ctx.settings.settings.requirements_file,
    );
    info!("[{}] Installing {requirements}", ctx.site);

    let force = if options.reinstall { " --force-reinstall" } else { "" };
    exec.run(&ctx.in_environment(&format!(
        "pip install{force} -r {}",
        shell_quote(&requirements)
    )))
    .await?;

    if !options.upgrade.is_empty() {
        let packages: Vec<String> = options.upgrade.iter().map(|p| shell_quote(p)).collect();
        info!("[{}] Upgrading {}", ctx.site, options.upgrade.join(", "));
        exec.run(&ctx.in_environment(&format!(
            "pip install --upgrade {}",
            packages.join(" ")
        )))
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::fake::RecordingExecutor;
    use crate::ops::testing::context;

    #[tokio::test]
    async fn test_installs_requirements_in_environment() {
        let ctx = context("");
        let exec = RecordingExecutor::new();

        install_dependencies(&ctx, &exec, &InstallOptions::default())
            .await
            .unwrap();

        let commands = exec.commands();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].contains("workon blog && cdvirtualenv"));
        assert!(commands[0].ends_with("pip install -r /srv/envs/blog/blog/requirements.txt"));
    }

    #[tokio::test]
    async fn test_reinstall_and_upgrade() {
        let ctx = context("requirements_file: deploy/requirements.txt");
        let exec = RecordingExecutor::new();
        let options = InstallOptions {
            reinstall: true,
            upgrade: vec![String::from("Django"), String::from("south")],
        };

        install_dependencies(&ctx, &exec, &options).await.unwrap();

        assert_eq!(
            exec.count("pip install --force-reinstall -r /srv/envs/blog/blog/deploy/requirements.txt"),
            1
        );
        assert_eq!(exec.count("pip install --upgrade Django south"), 1);
    }
}
