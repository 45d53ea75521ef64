// src/pipeline/index.rs

//! Dump indexing pipeline.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::dump::DumpReader;
use crate::error::{AppError, Result};
use crate::models::Config;
use crate::pipeline::PackageAggregator;
use crate::sink::BulkSink;

/// Outcome of one index run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexStats {
    /// Version records read from the dump.
    pub records: usize,
    /// Distinct packages after aggregation.
    pub packages: usize,
    /// Packages accepted by the sink.
    pub loaded: usize,
    pub batches: usize,
}

/// Replay the dump, aggregate it and push packages into the sink.
///
/// One rejected item fails the whole run. A partially loaded target is
/// visible in the error, which names the batch that broke.
pub async fn run_index(
    config: &Config,
    sink: &dyn BulkSink,
    cancel: &AtomicBool,
) -> Result<IndexStats> {
    let reader = DumpReader::new(&config.dump.data_dir)?;
    log::info!(
        "Indexing {} dump partitions from {}",
        reader.partition_count(),
        config.dump.data_dir
    );

    let mut aggregator = PackageAggregator::new();
    let mut records = 0usize;
    for record in reader.records() {
        aggregator.add(record?);
        records += 1;
    }

    let packages = aggregator.finish();
    log::info!(
        "Aggregated {} version records into {} packages",
        records,
        packages.len()
    );

    let mut stats = IndexStats {
        records,
        packages: packages.len(),
        ..IndexStats::default()
    };
    let batch_size = config.load.batch_size.max(1);
    for (index, batch) in packages.chunks(batch_size).enumerate() {
        if cancel.load(Ordering::Relaxed) {
            log::warn!(
                "Cancellation requested, stopping after {} batches",
                stats.batches
            );
            break;
        }
        let failures = sink.load(batch).await?;
        if !failures.is_empty() {
            for failure in &failures {
                log::error!("Failed to load package {}: {}", failure.id, failure.reason);
            }
            return Err(AppError::BulkLoad {
                batch: index,
                failed: failures.len(),
            });
        }
        stats.batches += 1;
        stats.loaded += batch.len();
        log::info!("Loaded {}/{} packages", stats.loaded, stats.packages);
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::DumpWriter;
    use crate::models::{Package, StringPool, VersionRecord};
    use crate::sink::{JsonLinesSink, LoadFailure};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct RecordingSink {
        batches: Mutex<Vec<Vec<String>>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BulkSink for RecordingSink {
        async fn load(&self, batch: &[Package]) -> Result<Vec<LoadFailure>> {
            let ids = batch.iter().map(|p| p.id.clone()).collect();
            self.batches.lock().unwrap().push(ids);
            Ok(Vec::new())
        }
    }

    struct RejectingSink;

    #[async_trait]
    impl BulkSink for RejectingSink {
        async fn load(&self, batch: &[Package]) -> Result<Vec<LoadFailure>> {
            Ok(batch
                .iter()
                .map(|p| LoadFailure {
                    id: p.id.clone(),
                    reason: "mapping rejected".into(),
                })
                .collect())
        }
    }

    fn write_dump(dir: &Path, specs: &[(&str, &str)]) {
        let mut pool = StringPool::new();
        let mut writer = DumpWriter::new(dir, 2);
        for (id, version) in specs {
            let mut record = VersionRecord::default();
            record.id = pool.get(id);
            record.version = pool.get(version);
            writer.push(record).unwrap();
        }
        writer.finish().unwrap();
    }

    fn index_config(dir: &Path, batch_size: usize) -> Config {
        let mut config = Config::default();
        config.dump.data_dir = dir.to_string_lossy().into_owned();
        config.load.batch_size = batch_size;
        config
    }

    #[tokio::test]
    async fn test_index_aggregates_and_batches_packages() {
        let dir = TempDir::new().unwrap();
        write_dump(
            dir.path(),
            &[("A", "1.0.0"), ("B", "1.0.0"), ("A", "2.0.0")],
        );
        let config = index_config(dir.path(), 1);
        let sink = RecordingSink::new();
        let cancel = AtomicBool::new(false);

        let stats = run_index(&config, &sink, &cancel).await.unwrap();
        assert_eq!(stats.records, 3);
        assert_eq!(stats.packages, 2);
        assert_eq!(stats.loaded, 2);
        assert_eq!(stats.batches, 2);

        let batches = sink.batches.lock().unwrap();
        assert_eq!(*batches, vec![vec!["A".to_string()], vec!["B".to_string()]]);
    }

    #[tokio::test]
    async fn test_index_into_json_lines_sink() {
        let dir = TempDir::new().unwrap();
        write_dump(
            dir.path(),
            &[("A", "1.0.0"), ("B", "1.0.0"), ("A", "2.0.0")],
        );
        let config = index_config(dir.path(), 100);
        let out = dir.path().join("packages.ndjson");
        let sink = JsonLinesSink::new(&out);
        let cancel = AtomicBool::new(false);

        run_index(&config, &sink, &cancel).await.unwrap();

        let raw = std::fs::read_to_string(&out).unwrap();
        let documents: Vec<serde_json::Value> = raw
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0]["id"], "A");
        assert_eq!(documents[0]["versions"].as_array().unwrap().len(), 2);
        assert_eq!(documents[1]["id"], "B");
        assert_eq!(documents[1]["versions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_items_abort_with_the_failing_batch() {
        let dir = TempDir::new().unwrap();
        write_dump(dir.path(), &[("A", "1.0.0"), ("B", "1.0.0")]);
        let config = index_config(dir.path(), 10);
        let cancel = AtomicBool::new(false);

        let err = run_index(&config, &RejectingSink, &cancel)
            .await
            .unwrap_err();
        match err {
            AppError::BulkLoad { batch, failed } => {
                assert_eq!(batch, 0);
                assert_eq!(failed, 2);
            }
            other => panic!("expected a bulk load error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_index_loads_nothing() {
        let dir = TempDir::new().unwrap();
        write_dump(dir.path(), &[("A", "1.0.0")]);
        let config = index_config(dir.path(), 10);
        let sink = RecordingSink::new();
        let cancel = AtomicBool::new(true);

        let stats = run_index(&config, &sink, &cancel).await.unwrap();
        assert_eq!(stats.records, 1);
        assert_eq!(stats.packages, 1);
        assert_eq!(stats.loaded, 0);
        assert!(sink.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_dump_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let config = index_config(&dir.path().join("absent"), 10);
        let cancel = AtomicBool::new(false);

        assert!(run_index(&config, &RecordingSink::new(), &cancel)
            .await
            .is_err());
    }
}
