//! Layered resolution of host and site settings.

use serde_yaml::{Mapping, Value};
use tracing::{debug, trace};

use crate::config::{HostEntry, SiteSettings, StitchConfig, merge_into, merged};
use crate::error::{ResolveError, Result};

use super::index::HostIndex;
use super::settings::EffectiveSettings;

const SETTINGS_OVERRIDES: &str = "settings_overrides";

/// Computes effective host and site settings from a loaded configuration.
#[derive(Debug)]
pub struct Resolver<'a> {
    /// The configuration being resolved.
    config: &'a StitchConfig,
    /// Hostname to short name index.
    index: HostIndex,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver, building the hostname index.
    ///
    /// # Errors
    ///
    /// Returns an error if two hosts share a hostname or a host has none.
    pub fn new(config: &'a StitchConfig) -> Result<Self> {
        let index = HostIndex::build(config)?;
        Ok(Self { config, index })
    }

    /// Returns the underlying configuration.
    #[must_use]
    pub const fn config(&self) -> &'a StitchConfig {
        self.config
    }

    /// Returns the short name of the host declaring `hostname`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownHostname` if the hostname is not declared.
    pub fn shortname_for(&self, hostname: &str) -> Result<&str> {
        self.index.shortname_for(hostname)
    }

    /// Finds a host by short name, falling back to hostname.
    ///
    /// # Errors
    ///
    /// Returns `UnknownHost` if neither matches.
    pub fn find_host(&self, name: &str) -> Result<HostEntry> {
        if self.config.hosts.contains_key(name) {
            return self.effective_host(name);
        }
        match self.index.shortname_for(name) {
            Ok(shortname) => self.effective_host(shortname),
            Err(_) => Err(ResolveError::UnknownHost {
                name: name.to_string(),
            }
            .into()),
        }
    }

    /// Returns host defaults merged with the host's own fields.
    ///
    /// # Errors
    ///
    /// Returns `UnknownHost` if absent, `InvalidEntry` if malformed.
    pub fn effective_host(&self, shortname: &str) -> Result<HostEntry> {
        let fields = merged(&self.config.hosts_defaults, &self.config.host(shortname)?);
        let mut host: HostEntry = serde_yaml::from_value(Value::Mapping(fields))
            .map_err(|e| ResolveError::invalid_host(shortname, e.to_string()))?;
        host.shortname = shortname.to_string();
        Ok(host)
    }

    /// Computes the effective settings of `site` on `host`.
    ///
    /// Layers, later winning: site defaults, the host's
    /// `settings_overrides` (under the `settings_overrides` key), every
    /// `based_on` ancestor from the most distant inward, and finally the
    /// site's own fields.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSite`, `UnknownParent` or `CyclicInheritance` for a
    /// bad site reference (before anything is merged), `UnknownHost` for a
    /// bad host.
    pub fn effective_site(&self, site: &str, host: &str) -> Result<EffectiveSettings> {
        let chain = lineage(self.config, site)?;
        let host_entry = self.effective_host(host)?;

        let mut values = self.config.sites_defaults.clone();

        if !host_entry.settings_overrides.is_empty() {
            let key = Value::from(SETTINGS_OVERRIDES);
            let mut layered = match values.get(&key) {
                Some(Value::Mapping(existing)) => existing.clone(),
                _ => Mapping::new(),
            };
            merge_into(&mut layered, &host_entry.settings_overrides);
            values.insert(key, Value::Mapping(layered));
        }

        for ancestor in chain.iter().skip(1).rev() {
            trace!(site, ancestor = ancestor.as_str(), "Applying based_on layer");
            merge_into(&mut values, &self.config.site(ancestor)?);
        }

        // The site's own fields are applied last so a parent never shadows them.
        merge_into(&mut values, &self.config.site(site)?);

        let settings: SiteSettings = serde_yaml::from_value(Value::Mapping(values.clone()))
            .map_err(|e| ResolveError::invalid_site(site, e.to_string()))?;

        debug!(site, host, layers = chain.len(), "Resolved site settings");
        Ok(EffectiveSettings {
            site: site.to_string(),
            host: host.to_string(),
            values,
            settings,
        })
    }

    /// Returns true if `site` lists `host` in its resolved `on_hosts`.
    ///
    /// A site without `on_hosts` is applicable nowhere.
    ///
    /// # Errors
    ///
    /// Propagates resolution errors for the site or host.
    pub fn is_site_on_host(&self, site: &str, host: &str) -> Result<bool> {
        let effective = self.effective_site(site, host)?;
        Ok(effective
            .settings
            .on_hosts
            .as_ref()
            .is_some_and(|hosts| hosts.contains(host)))
    }

    /// Returns every site applicable on `host`, in declaration order.
    ///
    /// # Errors
    ///
    /// Propagates resolution errors for any declared site.
    pub fn applicable_sites(&self, host: &str) -> Result<Vec<String>> {
        let mut sites = Vec::new();
        for site in self.config.all_site_keys() {
            if self.is_site_on_host(site, host)? {
                sites.push(site.to_string());
            }
        }
        Ok(sites)
    }
}

/// Walks the `based_on` chain of `site`.
///
/// Returns `[site, parent, grandparent, ...]`.
///
/// # Errors
///
/// Returns `UnknownSite` if `site` is not declared, `UnknownParent` if a
/// link points nowhere, and `CyclicInheritance` as soon as a key repeats.
pub fn lineage(config: &StitchConfig, site: &str) -> Result<Vec<String>> {
    let mut chain = vec![site.to_string()];
    let mut current = config.site(site)?;

    loop {
        let parent = match current.get("based_on") {
            None | Some(Value::Null) => return Ok(chain),
            Some(Value::String(parent)) => parent.clone(),
            Some(other) => {
                return Err(ResolveError::invalid_site(
                    chain.last().map_or(site, String::as_str),
                    format!(
                        "based_on must be a site key, found {}",
                        crate::config::value_kind(other)
                    ),
                )
                .into());
            }
        };

        if chain.contains(&parent) {
            chain.push(parent);
            return Err(ResolveError::CyclicInheritance {
                chain: chain.join(" -> "),
            }
            .into());
        }

        if !config.has_site(&parent) {
            return Err(ResolveError::UnknownParent {
                site: chain.last().cloned().unwrap_or_default(),
                parent,
            }
            .into());
        }

        current = config.site(&parent)?;
        chain.push(parent);
    }
}
