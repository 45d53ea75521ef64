// src/models/mod.rs

//! Domain models for the harvester application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod package;
mod record;

// Re-export all public types
pub use config::{Config, DumpConfig, FeedConfig, LoadConfig};
pub use package::{
    parse_dependencies, Package, PackageAuthor, PackageDependency, PackageVersion, Suggest,
};
pub use record::{parse_feed_date, unlisted_date, StringPool, VersionRecord};
