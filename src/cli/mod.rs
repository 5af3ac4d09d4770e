//! CLI module for the stitch deployment tool.
//!
//! This module provides the command-line interface for deploying sites
//! to the hosts declared in `stitch.yml`.

mod commands;
mod output;

pub use commands::{BatchArgs, Cli, Commands, OutputFormat};
pub use output::{HostSites, OutputFormatter};
