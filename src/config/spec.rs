//! Typed configuration model for stitch.
//!
//! `StitchConfig` maps the top level of `stitch.yml`. Host and site entries
//! stay as order-preserving YAML mappings until they have been merged with
//! their defaults; `HostEntry` and `SiteSettings` are the typed views of the
//! merged result.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ResolveError, Result};

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StitchConfig {
    /// Hosts keyed by short name.
    pub hosts: Mapping,
    /// Base layer merged under every host.
    #[serde(default, deserialize_with = "mapping_or_null")]
    pub hosts_defaults: Mapping,
    /// Sites keyed by site key, in declaration order.
    pub sites: Mapping,
    /// Base layer merged under every site.
    #[serde(default, deserialize_with = "mapping_or_null")]
    pub sites_defaults: Mapping,
    /// Role name to host short names (or hostnames).
    pub roles: BTreeMap<String, OneOrMany>,
}

/// A YAML field that may be a single string or a list of strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneOrMany {
    /// A single value, e.g. `on_hosts: alpha`.
    One(String),
    /// A list, e.g. `on_hosts: [alpha, beta]`.
    Many(Vec<String>),
}

/// Effective host record: host defaults merged with the host's own fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostEntry {
    /// Short name (the key under `hosts`).
    #[serde(skip)]
    pub shortname: String,
    /// Fully qualified hostname.
    pub hostname: String,
    /// Directory holding generated Apache vhosts (one subdirectory per host).
    #[serde(default)]
    pub apache_dir: Option<String>,
    /// Directory holding generated WSGI entry points.
    #[serde(default)]
    pub wsgi_dir: Option<String>,
    /// Directory holding generated settings packages.
    #[serde(default)]
    pub staging_settings: Option<String>,
    /// Root of the per-site virtualenvs.
    #[serde(default)]
    pub virtualenv_dir: Option<String>,
    /// Optional shared code directory added to every site's path.
    #[serde(default)]
    pub code_dir: Option<String>,
    /// Domain suffix for staged vhosts.
    #[serde(default)]
    pub staging_domain: Option<String>,
    /// Base directory of the deployment on this host.
    #[serde(default)]
    pub base_dir: Option<String>,
    /// Run everything on this machine instead of over SSH.
    #[serde(default)]
    pub local: bool,
    /// Command that reloads the web server.
    #[serde(default)]
    pub restart_command: Option<String>,
    /// SSH login user.
    #[serde(default)]
    pub ssh_user: Option<String>,
    /// SSH port.
    #[serde(default)]
    pub ssh_port: Option<u16>,
    /// Where to download `manage.py` from; rendered from a template when unset.
    #[serde(default)]
    pub manage_py_url: Option<String>,
    /// Host-level layer applied to every site's `settings_overrides`.
    #[serde(default, deserialize_with = "mapping_or_null")]
    pub settings_overrides: Mapping,
}

/// Typed view of a site's effective settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteSettings {
    /// Parent site whose fields are inherited.
    #[serde(default)]
    pub based_on: Option<String>,
    /// Source repository URL.
    #[serde(default)]
    pub clone_url: Option<String>,
    /// Upstream remote name.
    #[serde(default = "default_git_parent")]
    pub git_parent: String,
    /// Branch to check out.
    #[serde(default = "default_git_branch")]
    pub git_branch_name: String,
    /// Directory name of the checkout inside the environment.
    #[serde(default)]
    pub project_name: Option<String>,
    /// Hosts this site is deployed on.
    #[serde(default)]
    pub on_hosts: Option<OneOrMany>,
    /// Extra import paths, keyed by host short name.
    #[serde(default)]
    pub pythonpath: BTreeMap<String, OneOrMany>,
    /// Values written into the generated settings module.
    #[serde(default, deserialize_with = "mapping_or_null")]
    pub settings_overrides: Mapping,
    /// Module the generated settings import from.
    #[serde(default)]
    pub original_settings: Option<String>,
    /// Requirements manifest, relative to the checkout.
    #[serde(default = "default_requirements_file")]
    pub requirements_file: String,
}

fn default_git_parent() -> String {
    String::from("origin")
}

fn default_git_branch() -> String {
    String::from("master")
}

fn default_requirements_file() -> String {
    String::from("requirements.txt")
}

/// Accepts a mapping or an explicit null (`key: ~`), which maps to empty.
fn mapping_or_null<'de, D>(deserializer: D) -> std::result::Result<Mapping, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Mapping>::deserialize(deserializer)?.unwrap_or_default())
}

impl OneOrMany {
    /// Returns the values as a slice-like list.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value.clone()],
            Self::Many(values) => values.clone(),
        }
    }

    /// Returns the values as a set.
    #[must_use]
    pub fn to_set(&self) -> BTreeSet<String> {
        self.to_vec().into_iter().collect()
    }

    /// Returns true if `value` is one of the values.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::One(one) => one == value,
            Self::Many(values) => values.iter().any(|v| v == value),
        }
    }
}

impl StitchConfig {
    /// Returns the raw fields of a host.
    ///
    /// # Errors
    ///
    /// Returns `UnknownHost` if no host has this short name.
    pub fn host(&self, shortname: &str) -> Result<Mapping> {
        entry_mapping(&self.hosts, shortname)
            .ok_or_else(|| ResolveError::UnknownHost {
                name: shortname.to_string(),
            })?
            .map_err(|message| ResolveError::invalid_host(shortname, message).into())
    }

    /// Returns the raw fields of a site.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSite` if no site has this key.
    pub fn site(&self, key: &str) -> Result<Mapping> {
        entry_mapping(&self.sites, key)
            .ok_or_else(|| ResolveError::UnknownSite {
                name: key.to_string(),
            })?
            .map_err(|message| ResolveError::invalid_site(key, message).into())
    }

    /// Returns true if a site with this key is declared.
    #[must_use]
    pub fn has_site(&self, key: &str) -> bool {
        self.sites.contains_key(key)
    }

    /// Returns host short names in declaration order.
    #[must_use]
    pub fn host_names(&self) -> Vec<&str> {
        self.hosts.keys().filter_map(Value::as_str).collect()
    }

    /// Returns site keys in declaration order.
    #[must_use]
    pub fn all_site_keys(&self) -> Vec<&str> {
        self.sites.keys().filter_map(Value::as_str).collect()
    }

    /// Maps each role to the hostnames of its members.
    ///
    /// Members naming a declared host are replaced by that host's
    /// `hostname`; anything else is taken to be a hostname already.
    #[must_use]
    pub fn roles_to_hostnames(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.roles
            .iter()
            .map(|(role, members)| {
                let hostnames = members
                    .to_vec()
                    .into_iter()
                    .map(|member| self.declared_hostname(&member).unwrap_or(member))
                    .collect();
                (role.clone(), hostnames)
            })
            .collect()
    }

    /// Returns the `hostname` declared directly on a host entry, or in the
    /// host defaults.
    fn declared_hostname(&self, shortname: &str) -> Option<String> {
        let fields = self.host(shortname).ok()?;
        fields
            .get("hostname")
            .or_else(|| self.hosts_defaults.get("hostname"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Looks up an entry that must be a mapping; `key: ~` counts as empty.
fn entry_mapping(
    table: &Mapping,
    key: &str,
) -> Option<std::result::Result<Mapping, String>> {
    table.get(key).map(|value| match value {
        Value::Mapping(fields) => Ok(fields.clone()),
        Value::Null => Ok(Mapping::new()),
        other => Err(format!("expected a mapping, found {}", value_kind(other))),
    })
}

/// Short name of a YAML value's type, for messages.
pub(crate) const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
