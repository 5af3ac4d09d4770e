//! Per-site session context.

use serde::Serialize;

use crate::config::HostEntry;
use crate::exec::shell_quote;
use crate::resolver::EffectiveSettings;

/// Everything an operation needs to act on one site on one host.
///
/// Built fresh for every site in a batch and passed explicitly to each
/// operation. All paths are absolute paths on the target host.
#[derive(Debug, Clone, Serialize)]
pub struct SessionContext {
    /// Site key.
    pub site: String,
    /// Effective host record.
    pub host: HostEntry,
    /// Effective site settings on this host.
    pub settings: EffectiveSettings,
    /// Root holding every site environment (`WORKON_HOME`).
    pub virtualenv_root: String,
    /// The site's environment directory.
    pub environment_path: String,
    /// The source checkout inside the environment.
    pub repository_path: String,
    /// Directory receiving this host's Apache vhosts.
    pub apache_dir: String,
    /// Generated Apache vhost.
    pub apache_conf_path: String,
    /// Directory receiving WSGI entry points.
    pub wsgi_dir: String,
    /// Generated WSGI entry point.
    pub wsgi_conf_path: String,
    /// Root of the generated settings packages.
    pub settings_root: String,
    /// This site's settings package.
    pub settings_dir: String,
    /// Generated settings module.
    pub settings_path: String,
    /// Module the generated settings star-import.
    pub original_settings: String,
}

impl SessionContext {
    /// Wraps `command` so it runs inside the site's virtualenv.
    #[must_use]
    pub fn in_environment(&self, command: &str) -> String {
        let home = shell_quote(&self.virtualenv_root);
        format!(
            "export WORKON_HOME={home}; export PIP_VIRTUALENV_BASE={home}; \
             export PIP_RESPECT_VIRTUALENV=true; \
             source \"$(which virtualenvwrapper.sh)\" && workon {site} && cdvirtualenv && {command}",
            site = shell_quote(&self.site),
        )
    }

    /// Wraps `command` so it can create environments without entering one.
    #[must_use]
    pub fn with_wrapper(&self, command: &str) -> String {
        let home = shell_quote(&self.virtualenv_root);
        format!(
            "export WORKON_HOME={home}; export PIP_VIRTUALENV_BASE={home}; \
             export PIP_RESPECT_VIRTUALENV=true; \
             source \"$(which virtualenvwrapper.sh)\" && {command}"
        )
    }

    /// Directories the generated files are written to.
    #[must_use]
    pub fn output_dirs(&self) -> Vec<&str> {
        vec![
            self.virtualenv_root.as_str(),
            self.apache_dir.as_str(),
            self.wsgi_dir.as_str(),
            self.settings_dir.as_str(),
        ]
    }

    /// Upstream remote and branch of the checkout.
    #[must_use]
    pub fn upstream(&self) -> (&str, &str) {
        (
            self.settings.settings.git_parent.as_str(),
            self.settings.settings.git_branch_name.as_str(),
        )
    }
}
