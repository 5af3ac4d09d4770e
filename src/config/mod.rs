//! Configuration module for stitch.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `stitch.yml`
//! - Recursive merging of layered settings
//! - Validation before any host is contacted
//! - Hashing of settings and generated files

mod hash;
mod merge;
mod parser;
mod spec;
mod validator;

pub use hash::ConfigHasher;
pub use merge::{merge_into, merged};
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, REQUIRED_KEYS, find_config_file, load_dotenv};
pub use spec::{HostEntry, OneOrMany, SiteSettings, StitchConfig};
pub(crate) use spec::value_kind;
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
