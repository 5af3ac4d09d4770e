//! Configuration parser for loading `stitch.yml`.
//!
//! This module handles locating and reading the configuration file and
//! the optional `.env` file next to it.

use crate::error::{ConfigError, StitchError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::StitchConfig;

/// Top-level keys every configuration declares.
pub const REQUIRED_KEYS: &[&str] = &["hosts", "sites", "roles"];

/// Reads `stitch.yml` into a [`StitchConfig`].
#[derive(Debug, Default)]
pub struct ConfigParser;

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `FileNotFound` if there is no such file and `ParseError` if
    /// it cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<StitchConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            },
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the YAML is invalid or one of
    /// [`REQUIRED_KEYS`] is missing.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<StitchConfig> {
        let config: StitchConfig = serde_yaml::from_str(content).map_err(|e| {
            let message = if e.to_string().contains("missing field") {
                format!(
                    "{e}; a configuration must declare {}",
                    REQUIRED_KEYS.join(", ")
                )
            } else {
                format!("YAML parse error: {e}")
            };
            StitchError::Config(ConfigError::ParseError {
                message,
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        debug!(
            hosts = config.hosts.len(),
            sites = config.sites.len(),
            roles = config.roles.len(),
            "Parsed configuration"
        );
        Ok(config)
    }
}

/// Loads the `.env` file next to `config_file`, if there is one.
///
/// Variables already set in the environment are kept. Returns whether a
/// file was loaded.
///
/// # Errors
///
/// Returns `ParseError` if the file exists but cannot be loaded.
pub fn load_dotenv(config_file: &Path) -> Result<bool> {
    let env_path = config_file
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(".env");

    if !env_path.is_file() {
        debug!(".env file not found at: {}", env_path.display());
        return Ok(false);
    }

    info!("Loading environment from: {}", env_path.display());
    dotenvy::from_path(&env_path).map_err(|e| {
        StitchError::Config(ConfigError::ParseError {
            message: format!("Failed to load .env file: {e}"),
            location: Some(env_path.display().to_string()),
        })
    })?;
    Ok(true)
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["stitch.yml", "stitch.yaml", "staging.yml"];

/// Finds the configuration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(StitchError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}
