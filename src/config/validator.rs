//! Configuration validation.
//!
//! Everything that can be checked without contacting a host is checked
//! here, so a broken configuration fails before any command runs.

use crate::error::{ConfigError, StitchError, Result};
use crate::resolver::{HostIndex, Resolver, lineage};
use serde_yaml::Value;
use std::collections::BTreeSet;
use tracing::debug;

use super::spec::{OneOrMany, StitchConfig, value_kind};

/// Validator for stitch configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all problems found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error found; warnings never fail validation.
    pub fn validate(&self, config: &StitchConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(StitchError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Collects every error and warning without failing.
    #[must_use]
    pub fn check(&self, config: &StitchConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_hosts(config, &mut result);
        Self::validate_sites(config, &mut result);
        Self::validate_roles(config, &mut result);
        Self::validate_resolution(config, &mut result);

        result
    }

    /// Validates host entries and the hostname index.
    fn validate_hosts(config: &StitchConfig, result: &mut ValidationResult) {
        for (key, value) in &config.hosts {
            let Some(name) = key.as_str() else {
                result.errors.push(ValidationError {
                    field: String::from("hosts"),
                    message: format!("Host names must be strings, found {}", value_kind(key)),
                });
                continue;
            };
            if !matches!(value, Value::Mapping(_) | Value::Null) {
                result.errors.push(ValidationError {
                    field: format!("hosts.{name}"),
                    message: format!("Host entry must be a mapping, found {}", value_kind(value)),
                });
            }
        }

        if let Err(e) = HostIndex::build(config) {
            result.errors.push(ValidationError {
                field: String::from("hosts"),
                message: e.to_string(),
            });
        }
    }

    /// Validates site entries and their `based_on` chains.
    fn validate_sites(config: &StitchConfig, result: &mut ValidationResult) {
        let hosts: BTreeSet<&str> = config.host_names().into_iter().collect();

        if config.sites.is_empty() {
            result.warnings.push(String::from("No sites defined in configuration"));
        }

        for (key, value) in &config.sites {
            let Some(site) = key.as_str() else {
                result.errors.push(ValidationError {
                    field: String::from("sites"),
                    message: format!("Site keys must be strings, found {}", value_kind(key)),
                });
                continue;
            };
            let prefix = format!("sites.{site}");

            if !is_valid_site_key(site) {
                result.errors.push(ValidationError {
                    field: prefix.clone(),
                    message: format!(
                        "Site key '{site}' is invalid. It names a Python package, so it must be letters, digits and underscores, not starting with a digit."
                    ),
                });
            }

            let fields = match value {
                Value::Mapping(fields) => fields.clone(),
                Value::Null => serde_yaml::Mapping::new(),
                other => {
                    result.errors.push(ValidationError {
                        field: prefix,
                        message: format!("Site entry must be a mapping, found {}", value_kind(other)),
                    });
                    continue;
                }
            };

            if let Err(e) = lineage(config, site) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.based_on"),
                    message: e.to_string(),
                });
                continue;
            }

            match fields.get("on_hosts") {
                None | Some(Value::Null) => {
                    if !fields.contains_key("based_on") {
                        result
                            .warnings
                            .push(format!("{prefix}.on_hosts: site is not deployed on any host"));
                    }
                }
                Some(on_hosts) => {
                    match serde_yaml::from_value::<OneOrMany>(on_hosts.clone()) {
                        Ok(names) => {
                            for name in names.to_vec() {
                                if !hosts.contains(name.as_str()) {
                                    result.warnings.push(format!(
                                        "{prefix}.on_hosts: unknown host '{name}'"
                                    ));
                                }
                            }
                        }
                        Err(_) => result.errors.push(ValidationError {
                            field: format!("{prefix}.on_hosts"),
                            message: String::from("on_hosts must be a host name or a list of host names"),
                        }),
                    }
                }
            }
        }
    }

    /// Resolves every host, and every site on every host, so a malformed
    /// typed field fails here rather than in the middle of a batch.
    ///
    /// Entries that already carry an error are not resolved again.
    fn validate_resolution(config: &StitchConfig, result: &mut ValidationResult) {
        let Ok(resolver) = Resolver::new(config) else {
            return;
        };
        let reported = |result: &ValidationResult, field: &str| {
            result.errors.iter().any(|e| {
                e.field == field || e.field.strip_prefix(field).is_some_and(|rest| rest.starts_with('.'))
            })
        };

        let mut hosts = Vec::new();
        for host in config.host_names() {
            let field = format!("hosts.{host}");
            if reported(result, &field) {
                continue;
            }
            match resolver.effective_host(host) {
                Ok(_) => hosts.push(host),
                Err(e) => result.errors.push(ValidationError {
                    field,
                    message: e.to_string(),
                }),
            }
        }

        for site in config.all_site_keys() {
            let field = format!("sites.{site}");
            if reported(result, &field) {
                continue;
            }
            if let Some(e) = hosts
                .iter()
                .find_map(|host| resolver.effective_site(site, host).err())
            {
                result.errors.push(ValidationError {
                    field,
                    message: e.to_string(),
                });
            }
        }
    }

    /// Validates that role members name hosts.
    fn validate_roles(config: &StitchConfig, result: &mut ValidationResult) {
        let Ok(index) = HostIndex::build(config) else {
            // Already reported by validate_hosts
            return;
        };

        for (role, members) in &config.roles {
            for member in members.to_vec() {
                let known = config.hosts.contains_key(member.as_str())
                    || index.shortname_for(&member).is_ok();
                if !known {
                    result.errors.push(ValidationError {
                        field: format!("roles.{role}"),
                        message: format!("Role '{role}' refers to unknown host '{member}'"),
                    });
                }
            }
        }
    }
}

/// Site keys become Python package names in the generated settings tree.
fn is_valid_site_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(yaml: &str) -> ValidationResult {
        let config: StitchConfig = serde_yaml::from_str(yaml).unwrap();
        ConfigValidator::new().check(&config)
    }

    #[test]
    fn test_valid_site_key() {
        assert!(is_valid_site_key("blog"));
        assert!(is_valid_site_key("blog_dev2"));
        assert!(is_valid_site_key("_private"));
    }

    #[test]
    fn test_invalid_site_key() {
        assert!(!is_valid_site_key(""));
        assert!(!is_valid_site_key("blog-dev"));
        assert!(!is_valid_site_key("2blog"));
        assert!(!is_valid_site_key("blog.dev"));
    }

    #[test]
    fn test_clean_config_passes() {
        let result = check(
            r"
hosts:
  h1: {hostname: h1.example.com}
sites:
  base: {on_hosts: h1}
  child: {based_on: base}
roles:
  staging: h1
",
        );
        assert!(result.is_valid(), "{:?}", result.errors);
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_cycle_reported() {
        let result = check(
            r"
hosts:
  h1: {hostname: h1.example.com}
sites:
  a: {based_on: b, on_hosts: h1}
  b: {based_on: a, on_hosts: h1}
roles: {}
",
        );
        assert_eq!(result.error_count(), 2);
        assert!(result.errors[0].message.contains("Cyclic"));
    }

    #[test]
    fn test_duplicate_hostname_and_bad_role() {
        let result = check(
            r"
hosts:
  a: {hostname: same.example.com}
  b: {hostname: same.example.com}
sites: {}
roles:
  staging: c
",
        );
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("same.example.com")));
    }

    #[test]
    fn test_role_accepts_hostname() {
        let result = check(
            r"
hosts:
  a: {hostname: a.example.com}
sites: {}
roles:
  staging: a.example.com
  testing: [a, nope]
",
        );
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.errors[0].field, "roles.testing");
    }

    #[test]
    fn test_warnings_for_hostless_sites() {
        let result = check(
            r"
hosts:
  a: {hostname: a.example.com}
sites:
  idle: {project_name: idle}
  lost: {on_hosts: [a, ghost]}
roles: {}
",
        );
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 2);
    }

    #[test]
    fn test_malformed_field_on_other_host_reported() {
        let result = check(
            r"
hosts:
  h1: {hostname: h1.example.com}
  h2: {hostname: h2.example.com}
sites:
  good: {on_hosts: h1}
  broken: {on_hosts: h2, git_branch_name: [a, b]}
roles: {}
",
        );
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.errors[0].field, "sites.broken");
        assert!(result.errors[0].message.contains("broken"));
    }

    #[test]
    fn test_malformed_host_field_reported() {
        let result = check(
            r"
hosts:
  h1: {hostname: h1.example.com, ssh_port: seventy}
sites:
  good: {on_hosts: h1}
roles: {}
",
        );
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.errors[0].field, "hosts.h1");
    }

    #[test]
    fn test_validate_returns_first_error() {
        let config: StitchConfig = serde_yaml::from_str(
            r"
hosts: {}
sites:
  bad-key: {}
roles: {}
",
        )
        .unwrap();
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("bad-key"));
    }
}
