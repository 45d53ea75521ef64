//! Pipeline entry points for harvester operations.
//!
//! - `run_harvest`: Crawl the feed into dump partitions on disk
//! - `run_index`: Aggregate dump partitions and bulk-load packages

pub mod aggregate;
pub mod harvest;
pub mod index;

pub use aggregate::{aggregate_packages, PackageAggregator};
pub use harvest::{run_harvest, HarvestStats};
pub use index::{run_index, IndexStats};
