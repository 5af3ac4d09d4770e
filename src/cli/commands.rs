//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::ops::{InstallOptions, OperationKind};

/// Stitch - multi-site Django deployment over SSH.
#[derive(Parser, Debug)]
#[command(name = "stitch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "STITCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Target host, by short name or hostname.
    #[arg(short = 'H', long, global = true, env = "STITCH_HOST", conflicts_with = "role")]
    pub host: Option<String>,

    /// Run on every host of a role, one after another.
    #[arg(short, long, global = true)]
    pub role: Option<String>,

    /// Directory whose templates replace the built-in ones.
    #[arg(long, global = true, value_name = "DIR")]
    pub templates: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create output directories, environments and checkouts, then deploy.
    Setup(BatchArgs),

    /// Pull the source, regenerate configuration and install requirements.
    Deploy(BatchArgs),

    /// Regenerate configuration and install requirements without touching
    /// the source.
    Stage(BatchArgs),

    /// Validate the configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// List the sites deployed on the selected hosts.
    Sites,

    /// Show the effective settings of a site.
    Show {
        /// Site key.
        site: String,
    },

    /// Write a starter configuration.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
}

/// Arguments shared by the batch commands.
#[derive(Args, Debug, Clone, Default)]
pub struct BatchArgs {
    /// Sites to run (defaults to every site on the host).
    #[arg(value_name = "SITE")]
    pub sites: Vec<String>,

    /// Stop at the first failing site.
    #[arg(long)]
    pub fail_fast: bool,

    /// Reinstall every requirement.
    #[arg(long)]
    pub reinstall: bool,

    /// Upgrade these packages after installing requirements (repeatable or
    /// comma separated).
    #[arg(long, value_name = "PKG", value_delimiter = ',')]
    pub upgrade: Vec<String>,
}

impl BatchArgs {
    /// Installer options selected on the command line.
    #[must_use]
    pub fn install_options(&self) -> InstallOptions {
        InstallOptions {
            reinstall: self.reinstall,
            upgrade: self.upgrade.clone(),
        }
    }
}

impl Commands {
    /// Returns the batch operation and its arguments, if this is one.
    #[must_use]
    pub const fn batch(&self) -> Option<(OperationKind, &BatchArgs)> {
        match self {
            Self::Setup(args) => Some((OperationKind::Setup, args)),
            Self::Deploy(args) => Some((OperationKind::Deploy, args)),
            Self::Stage(args) => Some((OperationKind::Stage, args)),
            _ => None,
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Finds the `--config` value in raw arguments, before clap runs.
    ///
    /// Used to locate the `.env` file whose variables feed the
    /// environment-backed options.
    #[must_use]
    pub fn config_from_args(args: &[OsString]) -> Option<PathBuf> {
        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            let Some(arg) = arg.to_str() else {
                continue;
            };
            if arg == "--" {
                break;
            }
            if arg == "-c" || arg == "--config" {
                return iter.next().map(PathBuf::from);
            }
            if let Some(value) = arg.strip_prefix("--config=") {
                return Some(PathBuf::from(value));
            }
            if let Some(value) = arg.strip_prefix("-c").filter(|v| !v.is_empty()) {
                return Some(PathBuf::from(value.strip_prefix('=').unwrap_or(value)));
            }
        }
        None
    }
}
