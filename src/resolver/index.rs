//! Reverse index from hostname to host short name.

use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{StitchConfig, merged};
use crate::error::{ConfigError, ResolveError, Result};

/// Hostname to short name lookup, built once per configuration.
#[derive(Debug, Clone, Default)]
pub struct HostIndex {
    by_hostname: BTreeMap<String, String>,
}

impl HostIndex {
    /// Builds the index from every declared host.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateHostname` if two hosts share a hostname and
    /// `MissingHostField` if a host has no hostname even after defaults.
    pub fn build(config: &StitchConfig) -> Result<Self> {
        let mut by_hostname: BTreeMap<String, String> = BTreeMap::new();

        for shortname in config.host_names() {
            let fields = merged(&config.hosts_defaults, &config.host(shortname)?);
            let hostname = fields
                .get("hostname")
                .and_then(serde_yaml::Value::as_str)
                .ok_or_else(|| ResolveError::MissingHostField {
                    host: shortname.to_string(),
                    field: "hostname",
                })?;

            if let Some(first) = by_hostname.get(hostname) {
                return Err(ConfigError::DuplicateHostname {
                    hostname: hostname.to_string(),
                    first: first.clone(),
                    second: shortname.to_string(),
                }
                .into());
            }
            by_hostname.insert(hostname.to_string(), shortname.to_string());
        }

        debug!("Indexed {} hostnames", by_hostname.len());
        Ok(Self { by_hostname })
    }

    /// Returns the short name declaring `hostname`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownHostname` if no host declares it.
    pub fn shortname_for(&self, hostname: &str) -> Result<&str> {
        self.by_hostname
            .get(hostname)
            .map(String::as_str)
            .ok_or_else(|| {
                ResolveError::UnknownHostname {
                    hostname: hostname.to_string(),
                }
                .into()
            })
    }

    /// Number of indexed hosts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_hostname.len()
    }

    /// Returns true if no hosts are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_hostname.is_empty()
    }
}
