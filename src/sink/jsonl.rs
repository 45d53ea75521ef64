// src/sink/jsonl.rs

//! Line delimited JSON sink.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::models::Package;
use crate::sink::{BulkSink, LoadFailure};

/// Writes each package as one JSON object per line.
///
/// The first batch truncates the target file, later batches append, so
/// one index run produces exactly one document stream a bulk importer
/// can replay, regardless of batch count.
pub struct JsonLinesSink {
    path: PathBuf,
    started: AtomicBool,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            started: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl BulkSink for JsonLinesSink {
    async fn load(&self, batch: &[Package]) -> Result<Vec<LoadFailure>> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut options = OpenOptions::new();
        options.create(true);
        if self.started.swap(true, Ordering::Relaxed) {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let mut file = options.open(&self.path).await?;

        let mut lines = Vec::new();
        let mut failures = Vec::new();
        for package in batch {
            match serde_json::to_vec(package) {
                Ok(bytes) => {
                    lines.extend_from_slice(&bytes);
                    lines.push(b'\n');
                }
                Err(err) => failures.push(LoadFailure {
                    id: package.id.clone(),
                    reason: err.to_string(),
                }),
            }
        }
        file.write_all(&lines).await?;
        file.flush().await?;
        Ok(failures)
    }
}
