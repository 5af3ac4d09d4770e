//! Effective settings for a (site, host) pair.

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::config::{ConfigHasher, SiteSettings};
use crate::error::{StitchError, Result};

/// The fully merged configuration of one site on one host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveSettings {
    /// Site key.
    pub site: String,
    /// Host short name the settings were resolved for.
    pub host: String,
    /// Every merged key, in merge order. Used as template variables.
    pub values: Mapping,
    /// Typed view of `values`.
    #[serde(skip)]
    pub settings: SiteSettings,
}

impl EffectiveSettings {
    /// Returns a merged value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the `settings_overrides` mapping.
    #[must_use]
    pub const fn settings_overrides(&self) -> &Mapping {
        &self.settings.settings_overrides
    }

    /// Returns the extra import paths declared for this host.
    #[must_use]
    pub fn pythonpath(&self) -> Vec<String> {
        self.settings
            .pythonpath
            .get(&self.host)
            .map(crate::config::OneOrMany::to_vec)
            .unwrap_or_default()
    }

    /// Renders the merged values as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.values)
            .map_err(|e| StitchError::internal(format!("Failed to serialize settings: {e}")))
    }

    /// Returns a stable fingerprint of the merged values.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        ConfigHasher::new().hash_settings(&self.values)
    }
}
