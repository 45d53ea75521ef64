// src/models/record.rs

//! Raw feed records and the shared-string pool they are built from.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Sentinel date the feed uses for versions that have been unlisted.
pub fn unlisted_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1901, 1, 1, 0, 0, 0)
        .single()
        .expect("sentinel date is valid")
}

/// Parse a feed timestamp.
///
/// The feed mixes zoned RFC 3339 values with naive `Edm.DateTime` values;
/// naive values are taken as UTC. Unparseable input falls back to the
/// unlisted sentinel so a malformed date never aborts a crawl.
pub fn parse_feed_date(raw: &str) -> DateTime<Utc> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Utc.from_utc_datetime(&parsed);
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Utc.from_utc_datetime(&parsed.and_time(NaiveTime::MIN));
    }
    unlisted_date()
}

fn parse_count(raw: &str) -> u64 {
    raw.trim().parse().unwrap_or(0)
}

fn parse_flag(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

/// Interning pool for the strings a crawl produces.
///
/// Feed pages repeat the same identifiers, author lists and license URLs
/// thousands of times; handing out clones of one `Arc<str>` per distinct
/// value keeps a full harvest from ballooning.
#[derive(Debug, Default)]
pub struct StringPool {
    pool: HashSet<Arc<str>>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the pooled copy of `value`, interning it on first sight.
    pub fn get(&mut self, value: &str) -> Arc<str> {
        if let Some(interned) = self.pool.get(value) {
            return Arc::clone(interned);
        }
        let interned: Arc<str> = Arc::from(value);
        self.pool.insert(Arc::clone(&interned));
        interned
    }

    /// Number of distinct strings currently interned.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

/// One version-level record as published by the package feed.
///
/// String fields hold pooled `Arc<str>` values; absent feed elements keep
/// their defaults (empty string, zero, `false`, sentinel date).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub id: Arc<str>,
    pub version: Arc<str>,
    pub title: Arc<str>,
    pub summary: Arc<str>,
    pub description: Arc<str>,
    /// Pipe-delimited author names.
    pub authors: Arc<str>,
    /// Whitespace-delimited tag list, as published.
    pub tags: Arc<str>,
    /// Raw dependency specification, `name:version:framework` chunks joined by `|`.
    pub dependencies: Arc<str>,
    pub copyright: Arc<str>,
    pub language: Arc<str>,
    pub release_notes: Arc<str>,
    pub min_client_version: Arc<str>,
    pub license_url: Arc<str>,
    pub license_names: Arc<str>,
    pub license_report_url: Arc<str>,
    pub icon_url: Arc<str>,
    pub project_url: Arc<str>,
    pub report_abuse_url: Arc<str>,
    pub download_url: Arc<str>,
    pub gallery_details_url: Arc<str>,
    pub package_url: Arc<str>,
    pub package_hash: Arc<str>,
    pub package_hash_algorithm: Arc<str>,
    pub package_size: u64,
    pub download_count: u64,
    pub version_download_count: u64,
    pub created: DateTime<Utc>,
    pub published: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub last_edited: DateTime<Utc>,
    pub is_latest_version: bool,
    pub is_absolute_latest_version: bool,
    pub is_prerelease: bool,
    pub require_license_acceptance: bool,
}

impl Default for VersionRecord {
    fn default() -> Self {
        Self {
            id: Arc::from(""),
            version: Arc::from(""),
            title: Arc::from(""),
            summary: Arc::from(""),
            description: Arc::from(""),
            authors: Arc::from(""),
            tags: Arc::from(""),
            dependencies: Arc::from(""),
            copyright: Arc::from(""),
            language: Arc::from(""),
            release_notes: Arc::from(""),
            min_client_version: Arc::from(""),
            license_url: Arc::from(""),
            license_names: Arc::from(""),
            license_report_url: Arc::from(""),
            icon_url: Arc::from(""),
            project_url: Arc::from(""),
            report_abuse_url: Arc::from(""),
            download_url: Arc::from(""),
            gallery_details_url: Arc::from(""),
            package_url: Arc::from(""),
            package_hash: Arc::from(""),
            package_hash_algorithm: Arc::from(""),
            package_size: 0,
            download_count: 0,
            version_download_count: 0,
            created: unlisted_date(),
            published: unlisted_date(),
            last_updated: unlisted_date(),
            last_edited: unlisted_date(),
            is_latest_version: false,
            is_absolute_latest_version: false,
            is_prerelease: false,
            require_license_acceptance: false,
        }
    }
}

impl VersionRecord {
    /// True when this version carries the unlisted sentinel publish date.
    pub fn is_unlisted(&self) -> bool {
        self.published == unlisted_date()
    }

    /// Assign one named field from its textual feed representation.
    ///
    /// The names are the feed's property vocabulary, shared by the dump
    /// files. Returns `false` for names this record does not know, which
    /// callers ignore so that new feed properties never break a crawl.
    pub(crate) fn set_field(&mut self, name: &[u8], raw: &str, pool: &mut StringPool) -> bool {
        match name {
            b"Id" => self.id = pool.get(raw),
            b"Version" => self.version = pool.get(raw),
            b"Title" => self.title = pool.get(raw),
            b"Summary" => self.summary = pool.get(raw),
            b"Description" => self.description = pool.get(raw),
            b"Authors" => self.authors = pool.get(raw),
            b"Tags" => self.tags = pool.get(raw),
            b"Dependencies" => self.dependencies = pool.get(raw),
            b"Copyright" => self.copyright = pool.get(raw),
            b"Language" => self.language = pool.get(raw),
            b"ReleaseNotes" => self.release_notes = pool.get(raw),
            b"MinClientVersion" => self.min_client_version = pool.get(raw),
            b"LicenseUrl" => self.license_url = pool.get(raw),
            b"LicenseNames" => self.license_names = pool.get(raw),
            b"LicenseReportUrl" => self.license_report_url = pool.get(raw),
            b"IconUrl" => self.icon_url = pool.get(raw),
            b"ProjectUrl" => self.project_url = pool.get(raw),
            b"ReportAbuseUrl" => self.report_abuse_url = pool.get(raw),
            b"DownloadUrl" => self.download_url = pool.get(raw),
            b"GalleryDetailsUrl" => self.gallery_details_url = pool.get(raw),
            b"PackageUrl" => self.package_url = pool.get(raw),
            b"PackageHash" => self.package_hash = pool.get(raw),
            b"PackageHashAlgorithm" => self.package_hash_algorithm = pool.get(raw),
            b"PackageSize" => self.package_size = parse_count(raw),
            b"DownloadCount" => self.download_count = parse_count(raw),
            b"VersionDownloadCount" => self.version_download_count = parse_count(raw),
            b"Created" => self.created = parse_feed_date(raw),
            b"Published" => self.published = parse_feed_date(raw),
            b"LastUpdated" => self.last_updated = parse_feed_date(raw),
            b"LastEdited" => self.last_edited = parse_feed_date(raw),
            b"IsLatestVersion" => self.is_latest_version = parse_flag(raw),
            b"IsAbsoluteLatestVersion" => self.is_absolute_latest_version = parse_flag(raw),
            b"IsPrerelease" => self.is_prerelease = parse_flag(raw),
            b"RequireLicenseAcceptance" => self.require_license_acceptance = parse_flag(raw),
            _ => return false,
        }
        true
    }
}
