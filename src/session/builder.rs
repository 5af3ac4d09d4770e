//! Session context builder.
//!
//! Turns a host and a list of requested site keys into the ordered batch of
//! [`SessionContext`]s an operation runs over. Sites that are not deployed on
//! the host are skipped with a diagnostic instead of failing the batch.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::config::HostEntry;
use crate::error::{ResolveError, Result};
use crate::exec::join_path;
use crate::resolver::Resolver;

use super::context::SessionContext;

/// A requested site that was left out of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSite {
    /// Site key.
    pub site: String,
    /// Why the site was skipped.
    pub reason: String,
}

/// The sites one invocation runs on one host.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Effective host record.
    pub host: HostEntry,
    /// Contexts in execution order.
    pub contexts: Vec<SessionContext>,
    /// Requested sites that are not deployed on this host.
    pub skipped: Vec<SkippedSite>,
}

impl Batch {
    /// Site keys in execution order.
    #[must_use]
    pub fn site_keys(&self) -> Vec<&str> {
        self.contexts.iter().map(|c| c.site.as_str()).collect()
    }

    /// Returns true if no site will run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// Builds session contexts from resolved settings.
#[derive(Debug)]
pub struct SessionBuilder<'r, 'a> {
    resolver: &'r Resolver<'a>,
}

impl<'r, 'a> SessionBuilder<'r, 'a> {
    /// Creates a builder over a resolver.
    #[must_use]
    pub const fn new(resolver: &'r Resolver<'a>) -> Self {
        Self { resolver }
    }

    /// Builds the batch for `host` (a short name).
    ///
    /// With no requested sites, every site applicable on the host is used.
    /// Duplicate requests collapse to their first occurrence.
    ///
    /// # Errors
    ///
    /// Fails before building anything if a requested site is not declared
    /// or any `based_on` chain is broken. Also fails if the host or a site
    /// lacks a field needed to derive paths.
    pub fn build_batch(&self, host: &str, requested: &[String]) -> Result<Batch> {
        let host_entry = self.resolver.effective_host(host)?;

        let keys = if requested.is_empty() {
            self.resolver.applicable_sites(host)?
        } else {
            let mut seen = BTreeSet::new();
            let keys: Vec<String> = requested
                .iter()
                .filter(|key| seen.insert(key.as_str()))
                .cloned()
                .collect();
            for key in &keys {
                if !self.resolver.config().has_site(key) {
                    return Err(ResolveError::UnknownSite { name: key.clone() }.into());
                }
            }
            keys
        };

        let mut contexts = Vec::new();
        let mut skipped = Vec::new();
        for key in keys {
            if self.resolver.is_site_on_host(&key, host)? {
                info!("Valid site: {key}");
                contexts.push(self.build_context(&key, &host_entry)?);
            } else {
                warn!("Site {key} is not on host {host}, skipping");
                skipped.push(SkippedSite {
                    reason: format!("not on host {host}"),
                    site: key,
                });
            }
        }

        debug!(
            host,
            sites = contexts.len(),
            skipped = skipped.len(),
            "Built batch"
        );
        Ok(Batch {
            host: host_entry,
            contexts,
            skipped,
        })
    }

    /// Builds the context of one site on an already resolved host.
    ///
    /// # Errors
    ///
    /// Returns `MissingHostField` or `MissingSiteField` when a path cannot
    /// be derived.
    pub fn build_context(&self, site: &str, host: &HostEntry) -> Result<SessionContext> {
        let settings = self.resolver.effective_site(site, &host.shortname)?;

        let virtualenv_root = required(host, "virtualenv_dir", host.virtualenv_dir.as_ref())?;
        let apache_root = required(host, "apache_dir", host.apache_dir.as_ref())?;
        let wsgi_dir = required(host, "wsgi_dir", host.wsgi_dir.as_ref())?;
        let settings_root = required(host, "staging_settings", host.staging_settings.as_ref())?;
        let project_name = settings.settings.project_name.clone().ok_or_else(|| {
            ResolveError::MissingSiteField {
                site: site.to_string(),
                field: "project_name",
            }
        })?;
        let original_settings = settings.settings.original_settings.clone().ok_or_else(|| {
            ResolveError::MissingSiteField {
                site: site.to_string(),
                field: "original_settings",
            }
        })?;

        let environment_path = join_path(&virtualenv_root, site);
        let repository_path = join_path(&environment_path, &project_name);
        let apache_dir = join_path(&apache_root, &host.shortname);
        let apache_conf_path = join_path(&apache_dir, &format!("{site}.conf"));
        let wsgi_conf_path = join_path(&wsgi_dir, &format!("{site}.conf"));
        let settings_dir = join_path(&settings_root, site);
        let settings_path = join_path(&settings_dir, "settings.py");

        Ok(SessionContext {
            site: site.to_string(),
            host: host.clone(),
            settings,
            virtualenv_root,
            environment_path,
            repository_path,
            apache_dir,
            apache_conf_path,
            wsgi_dir,
            wsgi_conf_path,
            settings_root,
            settings_dir,
            settings_path,
            original_settings,
        })
    }
}

fn required(host: &HostEntry, field: &'static str, value: Option<&String>) -> Result<String> {
    value.cloned().ok_or_else(|| {
        ResolveError::MissingHostField {
            host: host.shortname.clone(),
            field,
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StitchConfig;
    use crate::error::StitchError;

    const FLEET: &str = r"
hosts_defaults:
  virtualenv_dir: /srv/envs
  apache_dir: /etc/apache2/sites
  wsgi_dir: /srv/wsgi
  staging_settings: /srv/staging_settings
hosts:
  h1: {hostname: h1.example.com}
  h2: {hostname: h2.example.com}
  bare: {hostname: bare.example.com, virtualenv_dir: ~}
sites_defaults:
  git_parent: origin
sites:
  base:
    on_hosts: h1
    project_name: base
    original_settings: base.settings
  child:
    based_on: base
    on_hosts: [h1, bare]
  missing:
    on_hosts: h2
    project_name: missing
    original_settings: missing.settings
  unnamed:
    on_hosts: h1
  unsettled:
    on_hosts: h1
    project_name: unsettled
roles: {}
";

    fn config() -> StitchConfig {
        serde_yaml::from_str(FLEET).unwrap()
    }

    #[test]
    fn test_inapplicable_site_is_skipped() {
        let config = config();
        let resolver = Resolver::new(&config).unwrap();
        let builder = SessionBuilder::new(&resolver);

        let requested = vec![
            String::from("base"),
            String::from("child"),
            String::from("missing"),
        ];
        let batch = builder.build_batch("h1", &requested).unwrap();

        assert_eq!(batch.site_keys(), vec!["base", "child"]);
        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].site, "missing");
    }

    #[test]
    fn test_paths_are_derived() {
        let config = config();
        let resolver = Resolver::new(&config).unwrap();
        let builder = SessionBuilder::new(&resolver);

        let batch = builder.build_batch("h1", &[String::from("child")]).unwrap();
        let ctx = &batch.contexts[0];
        assert_eq!(ctx.environment_path, "/srv/envs/child");
        assert_eq!(ctx.repository_path, "/srv/envs/child/base");
        assert_eq!(ctx.apache_conf_path, "/etc/apache2/sites/h1/child.conf");
        assert_eq!(ctx.wsgi_conf_path, "/srv/wsgi/child.conf");
        assert_eq!(ctx.settings_path, "/srv/staging_settings/child/settings.py");
        assert_eq!(ctx.upstream(), ("origin", "master"));
    }

    #[test]
    fn test_unknown_site_is_fatal() {
        let config = config();
        let resolver = Resolver::new(&config).unwrap();
        let builder = SessionBuilder::new(&resolver);

        let err = builder
            .build_batch("h1", &[String::from("base"), String::from("ghost")])
            .unwrap_err();
        assert!(matches!(
            err,
            StitchError::Resolve(ResolveError::UnknownSite { ref name }) if name == "ghost"
        ));
    }

    #[test]
    fn test_duplicates_collapse() {
        let config = config();
        let resolver = Resolver::new(&config).unwrap();
        let builder = SessionBuilder::new(&resolver);

        let requested = vec![String::from("child"), String::from("base"), String::from("child")];
        let batch = builder.build_batch("h1", &requested).unwrap();
        assert_eq!(batch.site_keys(), vec!["child", "base"]);
    }

    #[test]
    fn test_empty_request_uses_applicable_sites() {
        let config = config();
        let resolver = Resolver::new(&config).unwrap();
        let builder = SessionBuilder::new(&resolver);

        let batch = builder.build_batch("h2", &[]).unwrap();
        assert_eq!(batch.site_keys(), vec!["missing"]);
        assert!(batch.skipped.is_empty());
    }

    #[test]
    fn test_missing_fields_are_reported() {
        let config = config();
        let resolver = Resolver::new(&config).unwrap();
        let builder = SessionBuilder::new(&resolver);

        let err = builder.build_batch("h1", &[String::from("unnamed")]).unwrap_err();
        assert!(matches!(
            err,
            StitchError::Resolve(ResolveError::MissingSiteField { field: "project_name", .. })
        ));

        let err = builder.build_batch("h1", &[String::from("unsettled")]).unwrap_err();
        assert!(matches!(
            err,
            StitchError::Resolve(ResolveError::MissingSiteField { field: "original_settings", .. })
        ));

        let err = builder.build_batch("bare", &[String::from("child")]).unwrap_err();
        assert!(matches!(
            err,
            StitchError::Resolve(ResolveError::MissingHostField { field: "virtualenv_dir", .. })
        ));
    }
}
