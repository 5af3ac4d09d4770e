// ============================================================================
// Linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stitch
//!
//! Provision and update Django sites across a small fleet of hosts.
//!
//! ## Overview
//!
//! One YAML file declares hosts, sites and roles. For every site deployed on
//! a host, stitch:
//!
//! - Creates a virtualenv and a checkout of the site's repository
//! - Renders the Apache vhost, the WSGI entry point and a settings module
//! - Installs the site's requirements
//! - Reloads the web server once, after the whole batch
//!
//! ## Architecture
//!
//! 1. **Configuration**: raw host and site tables loaded from `stitch.yml`
//! 2. **Resolution**: defaults, host overrides and `based_on` ancestors are
//!    merged into one effective settings mapping per (site, host)
//! 3. **Session**: each effective mapping becomes a [`session::SessionContext`]
//!    carrying every path an operation needs
//! 4. **Batch**: an operation runs over the contexts of a host through an
//!    [`exec::Executor`], local or over SSH
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing, merging and validation
//! - [`resolver`]: Effective host and site settings
//! - [`session`]: Per-site session contexts and batches
//! - [`exec`]: Local and SSH execution backends
//! - [`ops`]: Provisioning, dependency installation and file generation
//! - [`batch`]: Batch runner and reports
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! hosts_defaults:
//!   virtualenv_dir: /srv/envs
//!   apache_dir: /etc/apache2/stitch
//!   wsgi_dir: /srv/wsgi
//!   staging_settings: /srv/staging_settings
//!
//! hosts:
//!   staging:
//!     hostname: staging.example.com
//!
//! sites:
//!   blog:
//!     on_hosts: staging
//!     project_name: blog
//!     original_settings: blog.settings
//!     clone_url: git@github.com:example/blog.git
//!   blog_next:
//!     based_on: blog
//!     git_branch_name: next
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod ops;
pub mod resolver;
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use batch::{BatchReport, BatchRunner, SiteOperation};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigHasher, ConfigParser, ConfigValidator, StitchConfig};
pub use error::{Result, StitchError};
pub use exec::{Executor, LocalExecutor, SshExecutor, executor_for};
pub use ops::{OperationKind, SiteOperations, TemplateRenderer};
pub use resolver::{EffectiveSettings, Resolver};
pub use session::{Batch, SessionBuilder, SessionContext};
