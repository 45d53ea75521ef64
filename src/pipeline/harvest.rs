// src/pipeline/harvest.rs

//! Feed harvesting pipeline.

use std::sync::atomic::AtomicBool;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dump::DumpWriter;
use crate::error::Result;
use crate::feed::{FeedClient, FeedCrawler, FeedQuery};
use crate::models::Config;

/// Outcome of one harvest run, persisted next to the partitions.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Count reported by the feed before the crawl started.
    pub total_reported: usize,
    pub pages: usize,
    pub records: usize,
    pub partitions: usize,
}

/// Crawl the whole feed into dump partitions.
///
/// When `count` is `None` the feed is asked for its own total first;
/// passing a count skips that request and bounds the crawl, which is
/// how partial harvests are driven.
pub async fn run_harvest(
    config: &Config,
    count: Option<usize>,
    cancel: &AtomicBool,
) -> Result<HarvestStats> {
    let started_at = Utc::now();
    let client = FeedClient::from_config(&config.feed)?;
    let query = FeedQuery::enumerate_all();

    let total = match count {
        Some(n) => n,
        None => client.get_count(&query).await?,
    };
    log::info!(
        "Harvesting {} package versions from {}",
        total,
        client.base_url()
    );

    let writer = Mutex::new(DumpWriter::new(
        &config.dump.data_dir,
        config.dump.partition_size,
    ));
    let crawler = FeedCrawler::new(client, config.feed.max_concurrent);
    let summary = crawler
        .crawl_pages(&query, total, config.feed.page_size, &writer, cancel)
        .await?;

    let dump = writer
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .finish()?;

    let stats = HarvestStats {
        started_at,
        finished_at: Utc::now(),
        total_reported: total,
        pages: summary.pages,
        records: dump.records,
        partitions: dump.partitions,
    };
    write_stats(config, &stats).await?;

    let elapsed = stats.finished_at - stats.started_at;
    log::info!(
        "Harvest complete: {} records across {} partitions in {:.1}s",
        stats.records,
        stats.partitions,
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    Ok(stats)
}

async fn write_stats(config: &Config, stats: &HarvestStats) -> Result<()> {
    let path = std::path::Path::new(&config.dump.data_dir).join("stats.json");
    let bytes = serde_json::to_vec_pretty(stats)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, bytes).await?;
    Ok(())
}
