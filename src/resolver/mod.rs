//! Resolution of effective host and site settings.
//!
//! This module turns the raw declarations of a `StitchConfig` into the
//! merged settings every operation works from:
//! - hostname to short name translation
//! - host defaults merged into each host
//! - site defaults, host overrides and `based_on` parents merged into each site
//! - which sites apply to which host

mod index;
mod resolve;
mod settings;

pub use index::HostIndex;
pub use resolve::{Resolver, lineage};
pub use settings::EffectiveSettings;
