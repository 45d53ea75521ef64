//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Feed endpoint and HTTP behavior settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Dump partition settings
    #[serde(default)]
    pub dump: DumpConfig,

    /// Bulk load settings
    #[serde(default)]
    pub load: LoadConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.feed.base_url.trim().is_empty() {
            return Err(AppError::validation("feed.base_url is empty"));
        }
        if self.feed.user_agent.trim().is_empty() {
            return Err(AppError::validation("feed.user_agent is empty"));
        }
        if self.feed.timeout_secs == 0 {
            return Err(AppError::validation("feed.timeout_secs must be > 0"));
        }
        if self.feed.max_concurrent == 0 {
            return Err(AppError::validation("feed.max_concurrent must be > 0"));
        }
        if self.feed.page_size == 0 {
            return Err(AppError::validation("feed.page_size must be > 0"));
        }
        if self.dump.partition_size == 0 {
            return Err(AppError::validation("dump.partition_size must be > 0"));
        }
        if self.load.batch_size == 0 {
            return Err(AppError::validation("load.batch_size must be > 0"));
        }
        Ok(())
    }
}

/// Feed endpoint and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Base URL of the OData v2 package feed
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent page fetches
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Records requested per feed page
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Whether search queries include prerelease versions
    #[serde(default = "defaults::include_prerelease")]
    pub include_prerelease: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            page_size: defaults::page_size(),
            include_prerelease: defaults::include_prerelease(),
        }
    }
}

/// Dump file layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    /// Directory the partition files are written to
    #[serde(default = "defaults::data_dir")]
    pub data_dir: String,

    /// Records per partition file
    #[serde(default = "defaults::partition_size")]
    pub partition_size: usize,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            partition_size: defaults::partition_size(),
        }
    }
}

/// Bulk load settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Packages per bulk-load batch
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Output file for the line-delimited JSON sink
    #[serde(default = "defaults::output")]
    pub output: String,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::batch_size(),
            output: defaults::output(),
        }
    }
}

mod defaults {
    // Feed defaults
    pub fn base_url() -> String {
        "https://www.nuget.org/api/v2".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; nusearch/1.0)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn page_size() -> usize {
        100
    }
    pub fn include_prerelease() -> bool {
        true
    }

    // Dump defaults
    pub fn data_dir() -> String {
        "nuget-data".into()
    }
    pub fn partition_size() -> usize {
        1000
    }

    // Load defaults
    pub fn batch_size() -> usize {
        1000
    }
    pub fn output() -> String {
        "packages.ndjson".into()
    }
}
