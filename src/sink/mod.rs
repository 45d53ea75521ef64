// src/sink/mod.rs

//! Bulk-load boundary for aggregated packages.
//!
//! Indexing hands packages over in batches; what happens on the other
//! side of this trait is a deployment concern. The crate ships a line
//! delimited JSON sink, which is also the bulk wire shape most search
//! backends accept directly.

pub mod jsonl;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Package;

pub use jsonl::JsonLinesSink;

/// One package a sink refused to take.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub id: String,
    pub reason: String,
}

/// Destination for aggregated packages.
///
/// Implementations take whole batches and report item-level rejections
/// in the returned list. Transport problems that invalidate the entire
/// batch surface as errors instead.
#[async_trait]
pub trait BulkSink: Send + Sync {
    async fn load(&self, batch: &[Package]) -> Result<Vec<LoadFailure>>;
}
