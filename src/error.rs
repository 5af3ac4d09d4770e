//! Error types for the stitch deployment tool.
//!
//! Errors are grouped by the stage that raises them: loading the
//! configuration, resolving hosts and sites, executing commands on a host,
//! and rendering templates.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for stitch.
#[derive(Debug, Error)]
pub enum StitchError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A host or site reference could not be resolved.
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// A command, upload or restart failed on the target host.
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    /// A template failed to render.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Two hosts declare the same hostname.
    #[error("Hostname {hostname} is declared by both '{first}' and '{second}'")]
    DuplicateHostname {
        /// The shared hostname.
        hostname: String,
        /// First host declaring it.
        first: String,
        /// Second host declaring it.
        second: String,
    },
}

/// Errors raised while resolving hosts and sites.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No host with this short name.
    #[error("Unknown host: {name}")]
    UnknownHost {
        /// The requested short name.
        name: String,
    },

    /// No host declares this hostname.
    #[error("No host is declared with hostname {hostname}")]
    UnknownHostname {
        /// The requested hostname.
        hostname: String,
    },

    /// No site with this key.
    #[error("Unknown site: {name}")]
    UnknownSite {
        /// The requested site key.
        name: String,
    },

    /// A site is based on a site that does not exist.
    #[error("Site '{site}' is based on unknown site '{parent}'")]
    UnknownParent {
        /// The site declaring `based_on`.
        site: String,
        /// The missing parent.
        parent: String,
    },

    /// The `based_on` chain loops back on itself.
    #[error("Cyclic based_on inheritance: {chain}")]
    CyclicInheritance {
        /// The chain of site keys, ending with the repeated key.
        chain: String,
    },

    /// An entry has the wrong shape once merged.
    #[error("Invalid {kind} '{name}': {message}")]
    InvalidEntry {
        /// Entry kind (host or site).
        kind: &'static str,
        /// Entry name.
        name: String,
        /// What went wrong.
        message: String,
    },

    /// A host lacks a field an operation needs.
    #[error("Host '{host}' does not define {field}")]
    MissingHostField {
        /// Host short name.
        host: String,
        /// Missing field.
        field: &'static str,
    },

    /// A site lacks a field an operation needs.
    #[error("Site '{site}' does not define {field}")]
    MissingSiteField {
        /// Site key.
        site: String,
        /// Missing field.
        field: &'static str,
    },
}

/// Errors raised by the execution layer.
#[derive(Debug, Error)]
pub enum ExecError {
    /// A command exited with a non-zero status.
    #[error("Command failed on {target} (exit {status}): {command}: {stderr}")]
    CommandFailed {
        /// Where the command ran.
        target: String,
        /// The command line.
        command: String,
        /// Exit code, -1 when killed by a signal.
        status: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The command could not be started at all.
    #[error("Failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Description of the failure.
        message: String,
    },

    /// Uploading a file failed.
    #[error("Failed to upload {path}: {message}")]
    Upload {
        /// Destination path.
        path: String,
        /// Description of the failure.
        message: String,
    },

    /// The web server reload failed.
    #[error("Restart failed on {target}: {message}")]
    Restart {
        /// Where the restart ran.
        target: String,
        /// Description of the failure.
        message: String,
    },

    /// Downloading a resource failed.
    #[error("Failed to fetch {url}: {message}")]
    Fetch {
        /// The requested URL.
        url: String,
        /// Description of the failure.
        message: String,
    },
}

/// Template rendering errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template is missing, malformed, or references an undefined variable.
    #[error("Failed to render {template}: {message}")]
    Render {
        /// Template name.
        template: String,
        /// Renderer message.
        message: String,
    },
}

/// Result type alias for stitch operations.
pub type Result<T> = std::result::Result<T, StitchError>;

impl StitchError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if the error happened before any host was contacted.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Resolve(_))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl ResolveError {
    /// Creates an invalid entry error for a host.
    #[must_use]
    pub fn invalid_host(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEntry {
            kind: "host",
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid entry error for a site.
    #[must_use]
    pub fn invalid_site(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEntry {
            kind: "site",
            name: name.into(),
            message: message.into(),
        }
    }
}

impl TemplateError {
    /// Creates a render error.
    #[must_use]
    pub fn render(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            template: template.into(),
            message: message.into(),
        }
    }
}
