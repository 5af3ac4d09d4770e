//! Generation of the web server, WSGI and settings files.

use serde_yaml::Mapping;
use tracing::{debug, info};

use crate::batch::Artifact;
use crate::error::{Result, StitchError};
use crate::exec::{Executor, join_path, shell_quote};
use crate::session::SessionContext;

use super::fetch::Fetcher;
use super::templates::{
    APACHE_TEMPLATE, MANAGE_TEMPLATE, SETTINGS_TEMPLATE, TemplateRenderer, WSGI_TEMPLATE,
    template_vars,
};

/// Prints the environment's site-packages directory.
pub const SITE_PACKAGES_QUERY: &str =
    r#"python -c "import sysconfig; print(sysconfig.get_paths()['purelib'])""#;

/// Renders and uploads a site's generated files.
#[derive(Debug)]
pub struct ConfigGenerator<'a> {
    renderer: &'a TemplateRenderer,
    fetcher: &'a Fetcher,
}

impl<'a> ConfigGenerator<'a> {
    /// Creates a generator.
    #[must_use]
    pub const fn new(renderer: &'a TemplateRenderer, fetcher: &'a Fetcher) -> Self {
        Self { renderer, fetcher }
    }

    /// Renders the vhost, WSGI entry point and settings module and uploads
    /// them, then makes sure the settings package is importable.
    ///
    /// Returns every file written, with its digest.
    ///
    /// # Errors
    ///
    /// Returns the first template, command or upload failure.
    pub async fn generate(
        &self,
        ctx: &SessionContext,
        exec: &dyn Executor,
    ) -> Result<Vec<Artifact>> {
        let sitepackages = site_packages(ctx, exec).await?;
        let vars = template_vars(ctx, &sitepackages);

        let targets = [
            (APACHE_TEMPLATE, &ctx.apache_dir, &ctx.apache_conf_path),
            (WSGI_TEMPLATE, &ctx.wsgi_dir, &ctx.wsgi_conf_path),
            (SETTINGS_TEMPLATE, &ctx.settings_dir, &ctx.settings_path),
        ];

        let mut artifacts = Vec::new();
        for (template, dir, path) in targets {
            let content = self.renderer.render(template, &vars)?;
            ensure_dir(exec, dir).await?;
            artifacts.push(put(exec, content.as_bytes(), path).await?);
        }

        artifacts.extend(self.init_settings_package(ctx, exec, &vars).await?);
        info!("[{}] Generated {} files", ctx.site, artifacts.len());
        Ok(artifacts)
    }

    /// Writes the package markers and `manage.py` that are missing.
    async fn init_settings_package(
        &self,
        ctx: &SessionContext,
        exec: &dyn Executor,
        vars: &Mapping,
    ) -> Result<Vec<Artifact>> {
        let mut artifacts = Vec::new();

        for dir in [&ctx.settings_root, &ctx.settings_dir] {
            let marker = join_path(dir, "__init__.py");
            if !exec.exists(&marker).await? {
                artifacts.push(put(exec, b"", &marker).await?);
            }
        }

        let manage = join_path(&ctx.settings_dir, "manage.py");
        if !exec.exists(&manage).await? {
            let content = match &ctx.host.manage_py_url {
                Some(url) => self.fetcher.fetch(url).await?,
                None => self.renderer.render(MANAGE_TEMPLATE, vars)?.into_bytes(),
            };
            artifacts.push(put(exec, &content, &manage).await?);
        }

        Ok(artifacts)
    }
}

/// Asks the site's interpreter where its packages live.
async fn site_packages(ctx: &SessionContext, exec: &dyn Executor) -> Result<String> {
    let output = exec.run(&ctx.in_environment(SITE_PACKAGES_QUERY)).await?;
    output.last_line().map(str::to_string).ok_or_else(|| {
        StitchError::internal(format!(
            "Could not determine site-packages for {}",
            ctx.site
        ))
    })
}

async fn ensure_dir(exec: &dyn Executor, dir: &str) -> Result<()> {
    if !exec.exists(dir).await? {
        exec.run(&format!("mkdir -p {}", shell_quote(dir))).await?;
    }
    Ok(())
}

async fn put(exec: &dyn Executor, content: &[u8], path: &str) -> Result<Artifact> {
    exec.upload(content, path).await?;
    let artifact = Artifact::new(path, content);
    debug!(path, sha256 = artifact.sha256.as_str(), "Uploaded");
    Ok(artifact)
}
