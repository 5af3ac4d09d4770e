//! Batch execution and reporting.
//!
//! This module handles running one operation across the sites of a batch:
//! - Sequential per-site application with continue or fail-fast policy
//! - A single web server reload at the end of every batch
//! - Per-site outcomes with artifact digests and settings fingerprints

mod report;
mod runner;

pub use report::{Artifact, BatchReport, RestartOutcome, SiteOutcome, SiteStatus};
pub use runner::{BatchRunner, SiteOperation};
