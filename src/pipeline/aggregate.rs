// src/pipeline/aggregate.rs

//! Grouping of version records into packages.
//!
//! The feed is version-oriented: one entry per published version. Search
//! wants one document per package, so records are bucketed by package id
//! and each bucket is folded into a [`Package`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Package, VersionRecord};

/// Accumulates version records grouped by package id.
pub struct PackageAggregator {
    buckets: HashMap<Arc<str>, Vec<VersionRecord>>,
    order: Vec<Arc<str>>,
}

impl PackageAggregator {
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Add one version record to its package bucket.
    ///
    /// Buckets are emitted in the order their id was first seen, so a
    /// dump replayed through the aggregator produces a stable output
    /// ordering.
    pub fn add(&mut self, record: VersionRecord) {
        if let Some(bucket) = self.buckets.get_mut(&record.id) {
            bucket.push(record);
        } else {
            let id = Arc::clone(&record.id);
            self.order.push(Arc::clone(&id));
            self.buckets.insert(id, vec![record]);
        }
    }

    pub fn add_records(&mut self, records: impl IntoIterator<Item = VersionRecord>) {
        for record in records {
            self.add(record);
        }
    }

    /// Number of distinct package ids seen so far.
    pub fn package_count(&self) -> usize {
        self.order.len()
    }

    /// Fold every bucket into a package.
    pub fn finish(mut self) -> Vec<Package> {
        self.order
            .iter()
            .filter_map(|id| self.buckets.remove(id))
            .filter_map(Package::from_versions)
            .collect()
    }
}

impl Default for PackageAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold a fallible record stream into packages.
///
/// The first failed record aborts the fold, matching how a dump read
/// pass surfaces a broken partition.
pub fn aggregate_packages(
    records: impl IntoIterator<Item = Result<VersionRecord>>,
) -> Result<Vec<Package>> {
    let mut aggregator = PackageAggregator::new();
    for record in records {
        aggregator.add(record?);
    }
    Ok(aggregator.finish())
}
