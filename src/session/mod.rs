//! Per-site session contexts.
//!
//! A [`SessionContext`] carries the resolved settings and derived paths of
//! one site on one host. The [`SessionBuilder`] produces them in batch order.

mod builder;
mod context;

pub use builder::{Batch, SessionBuilder, SkippedSite};
pub use context::SessionContext;
