// src/models/package.rs

//! Aggregated package documents derived from version records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::record::{unlisted_date, VersionRecord};

/// One dependency of a package version.
///
/// Parsed from the feed's flattened `name:version:framework` chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDependency {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
}

impl PackageDependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            framework: None,
        }
    }
}

/// Parse a pipe-delimited dependency specification.
///
/// Each chunk is `name`, `name:version` or `name:version:framework`;
/// a chunk with more than three parts is kept whole as the dependency
/// name rather than dropped. Empty parts read as absent.
pub fn parse_dependencies(spec: &str) -> Vec<PackageDependency> {
    spec.split('|')
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| {
            let parts: Vec<&str> = chunk.split(':').collect();
            match parts.as_slice() {
                [name] => PackageDependency::new(*name),
                [name, version] => PackageDependency {
                    name: (*name).to_string(),
                    version: part(version),
                    framework: None,
                },
                [name, version, framework] => PackageDependency {
                    name: (*name).to_string(),
                    version: part(version),
                    framework: part(framework),
                },
                _ => PackageDependency::new(chunk),
            }
        })
        .collect()
}

fn part(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// One version of a package, carried inside the aggregated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageVersion {
    pub version: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub summary: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub release_notes: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub icon_url: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub project_url: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub license_url: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub download_url: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dependencies: Vec<PackageDependency>,
    pub download_count: u64,
    pub package_size: u64,
    pub created: DateTime<Utc>,
    pub published: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub is_latest: bool,
    pub is_prerelease: bool,
}

impl PackageVersion {
    /// Build a version document from one raw feed record.
    pub fn from_record(record: &VersionRecord) -> Self {
        Self {
            version: record.version.to_string(),
            title: record.title.to_string(),
            description: record.description.to_string(),
            summary: record.summary.to_string(),
            release_notes: record.release_notes.to_string(),
            icon_url: record.icon_url.to_string(),
            project_url: record.project_url.to_string(),
            license_url: record.license_url.to_string(),
            download_url: record.download_url.to_string(),
            dependencies: parse_dependencies(&record.dependencies),
            download_count: record.version_download_count,
            package_size: record.package_size,
            created: record.created,
            published: record.published,
            last_updated: record.last_updated,
            is_latest: record.is_latest_version,
            is_prerelease: record.is_prerelease,
        }
    }

    /// True when this version carries the unlisted sentinel publish date.
    pub fn is_unlisted(&self) -> bool {
        self.published == unlisted_date()
    }
}

/// One author of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageAuthor {
    pub name: String,
}

/// Search-as-you-type completion input derived from the identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggest {
    pub input: Vec<String>,
    pub weight: u64,
}

/// One package document, aggregating every version of an identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub summary: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub copyright: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub icon_url: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub authors: Vec<PackageAuthor>,
    pub versions: Vec<PackageVersion>,
    pub download_count: u64,
    pub all_versions_unlisted: bool,
    pub created: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub suggest: Suggest,
}

impl Package {
    /// Fold a package's version records into one document.
    ///
    /// Scalar attributes come from the last record to arrive, so a record
    /// seen later in the dump wins over an earlier one for the same
    /// identifier. Returns `None` for an empty slice of records, which an
    /// aggregated bucket never produces.
    pub fn from_versions(records: Vec<VersionRecord>) -> Option<Package> {
        let latest = records.last()?;
        let id = latest.id.to_string();

        let tags = latest
            .tags
            .split_whitespace()
            .map(|tag| tag.to_lowercase())
            .collect();
        let authors = latest
            .authors
            .split('|')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| PackageAuthor {
                name: name.to_string(),
            })
            .collect();

        let mut input: Vec<String> = id.split('.').map(str::to_string).collect();
        if !input.contains(&id) {
            input.push(id.clone());
        }
        let suggest = Suggest {
            input,
            weight: latest.download_count,
        };

        let package = Package {
            summary: latest.summary.to_string(),
            copyright: latest.copyright.to_string(),
            icon_url: latest.icon_url.to_string(),
            tags,
            authors,
            download_count: latest.download_count,
            all_versions_unlisted: records.iter().all(VersionRecord::is_unlisted),
            created: records
                .iter()
                .map(|record| record.created)
                .min()
                .unwrap_or_else(unlisted_date),
            last_update: records
                .iter()
                .map(|record| record.created)
                .max()
                .unwrap_or_else(unlisted_date),
            versions: records.iter().map(PackageVersion::from_record).collect(),
            suggest,
            id,
        };
        Some(package)
    }
}
