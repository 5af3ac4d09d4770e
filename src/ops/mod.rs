//! Per-site operations.
//!
//! - [`provision`]: virtualenv creation, clone and checkout
//! - [`install_dependencies`]: pip requirements
//! - [`ConfigGenerator`]: vhost, WSGI and settings files
//!
//! [`SiteOperations`] chains them into the `setup`, `deploy` and `stage`
//! commands.

mod fetch;
mod generate;
mod install;
mod provision;
mod templates;

pub use fetch::Fetcher;
pub use generate::{ConfigGenerator, SITE_PACKAGES_QUERY};
pub use install::{InstallOptions, install_dependencies};
pub use provision::{ProvisionMode, provision};
pub use templates::{
    APACHE_TEMPLATE, CONFIG_TEMPLATE, MANAGE_TEMPLATE, SETTINGS_TEMPLATE, TemplateRenderer,
    WSGI_TEMPLATE, builtin, python_literal, template_vars,
};

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::batch::{Artifact, SiteOperation};
use crate::error::Result;
use crate::exec::{Executor, shell_quote};
use crate::session::SessionContext;

/// The commands that run over a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Output directories, fresh environment and checkout, configs, requirements.
    Setup,
    /// Source update, configs, requirements.
    Deploy,
    /// Configs and requirements without touching the source.
    Stage,
}

impl OperationKind {
    /// Command name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Deploy => "deploy",
            Self::Stage => "stage",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A batch command bound to its renderer, fetcher and install options.
#[derive(Debug)]
pub struct SiteOperations {
    kind: OperationKind,
    renderer: TemplateRenderer,
    fetcher: Fetcher,
    install: InstallOptions,
}

impl SiteOperations {
    /// Creates the operation.
    #[must_use]
    pub const fn new(
        kind: OperationKind,
        renderer: TemplateRenderer,
        fetcher: Fetcher,
        install: InstallOptions,
    ) -> Self {
        Self {
            kind,
            renderer,
            fetcher,
            install,
        }
    }
}

#[async_trait]
impl SiteOperation for SiteOperations {
    fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    async fn apply(&self, ctx: &SessionContext, exec: &dyn Executor) -> Result<Vec<Artifact>> {
        let generator = ConfigGenerator::new(&self.renderer, &self.fetcher);

        match self.kind {
            OperationKind::Setup => {
                ensure_output_dirs(ctx, exec).await?;
                provision(ctx, exec, ProvisionMode::Initial).await?;
            }
            OperationKind::Deploy => provision(ctx, exec, ProvisionMode::Update).await?,
            OperationKind::Stage => {}
        }

        let artifacts = generator.generate(ctx, exec).await?;
        install_dependencies(ctx, exec, &self.install).await?;
        Ok(artifacts)
    }
}

/// Creates the output directories that do not exist yet.
///
/// # Errors
///
/// Returns the failing check or `mkdir`.
pub async fn ensure_output_dirs(ctx: &SessionContext, exec: &dyn Executor) -> Result<()> {
    let mut missing = Vec::new();
    for dir in ctx.output_dirs() {
        if !exec.exists(dir).await? {
            missing.push(shell_quote(dir));
        }
    }
    if !missing.is_empty() {
        info!("[{}] Creating {}", ctx.site, missing.join(", "));
        exec.run(&format!("mkdir -p {}", missing.join(" "))).await?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use serde_yaml::{Mapping, Value};

    use crate::config::{StitchConfig, merge_into};
    use crate::resolver::Resolver;
    use crate::session::{SessionBuilder, SessionContext};

    const FIXTURE: &str = r"
hosts_defaults:
  virtualenv_dir: /srv/envs
  apache_dir: /etc/apache2/stitch
  wsgi_dir: /srv/wsgi
  staging_settings: /srv/staging_settings
  staging_domain: staging.example.com
hosts:
  h1:
    hostname: h1.example.com
sites:
  blog:
    on_hosts: h1
    project_name: blog
    clone_url: git@example.com:team/blog.git
    original_settings: blog.settings
    settings_overrides:
      DEBUG: true
roles: {}
";

    /// Context of site `blog` on host `h1`, with extra site fields.
    pub fn context(site_fields: &str) -> SessionContext {
        context_on_host(site_fields, "")
    }

    /// Context of site `blog` on host `h1`, with extra site and host fields.
    pub fn context_on_host(site_fields: &str, host_fields: &str) -> SessionContext {
        let mut config: StitchConfig = serde_yaml::from_str(FIXTURE).unwrap();
        overlay(&mut config.sites, "blog", site_fields);
        overlay(&mut config.hosts, "h1", host_fields);

        let resolver = Resolver::new(&config).unwrap();
        let host = resolver.effective_host("h1").unwrap();
        SessionBuilder::new(&resolver)
            .build_context("blog", &host)
            .unwrap()
    }

    fn overlay(table: &mut Mapping, key: &str, fields: &str) {
        if fields.is_empty() {
            return;
        }
        let fields: Mapping = serde_yaml::from_str(fields).unwrap();
        if let Some(Value::Mapping(entry)) = table.get_mut(key) {
            merge_into(entry, &fields);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::fake::RecordingExecutor;
    use super::testing::context;

    fn operations(kind: OperationKind) -> SiteOperations {
        SiteOperations::new(
            kind,
            TemplateRenderer::new(),
            Fetcher::new().unwrap(),
            InstallOptions::default(),
        )
    }

    fn recording() -> RecordingExecutor {
        RecordingExecutor::new()
            .responds("sysconfig", "/srv/envs/blog/lib/python3.11/site-packages\n")
            .creates_on("mkvirtualenv", "/srv/envs/blog")
            .creates_on("git clone", "/srv/envs/blog/blog")
    }

    fn position(commands: &[String], needle: &str) -> usize {
        commands
            .iter()
            .position(|c| c.contains(needle))
            .unwrap_or_else(|| panic!("no command containing {needle}"))
    }

    #[tokio::test]
    async fn test_setup_runs_steps_in_order() {
        let ctx = context("");
        let exec = recording();

        let artifacts = operations(OperationKind::Setup)
            .apply(&ctx, &exec)
            .await
            .unwrap();
        assert_eq!(artifacts.len(), 6);

        let commands = exec.commands();
        assert!(commands[0].starts_with("mkdir -p /srv/envs /etc/apache2/stitch/h1 /srv/wsgi"));
        let clone = position(&commands, "git clone");
        let generate = position(&commands, "sysconfig");
        let install = position(&commands, "pip install -r");
        assert!(clone < generate && generate < install);
        assert_eq!(exec.restarts(), 0);
    }

    #[tokio::test]
    async fn test_deploy_pulls_existing_checkout() {
        let ctx = context("");
        let exec = recording()
            .with_path("/srv/envs/blog")
            .with_path("/srv/envs/blog/blog");

        operations(OperationKind::Deploy)
            .apply(&ctx, &exec)
            .await
            .unwrap();

        assert_eq!(exec.count("git pull origin master"), 1);
        assert_eq!(exec.count("git clone"), 0);
        assert_eq!(exec.count("pip install -r"), 1);
    }

    #[tokio::test]
    async fn test_stage_leaves_source_alone() {
        let ctx = context("");
        let exec = recording();

        operations(OperationKind::Stage)
            .apply(&ctx, &exec)
            .await
            .unwrap();

        assert_eq!(exec.count("git "), 0);
        assert_eq!(exec.count("mkvirtualenv"), 0);
        assert_eq!(exec.count("pip install -r"), 1);
        assert!(exec.uploaded("/srv/staging_settings/blog/settings.py").is_some());
    }

    #[tokio::test]
    async fn test_failed_step_stops_site() {
        let ctx = context("");
        let exec = recording().fails_on("git clone");

        assert!(operations(OperationKind::Setup).apply(&ctx, &exec).await.is_err());
        assert_eq!(exec.count("pip install"), 0);
        assert!(exec.upload_paths().is_empty());
    }
}
