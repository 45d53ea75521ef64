// src/dump/writer.rs

//! Threshold-flushed writer for dump partition files.

use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::dump::partition_file_name;
use crate::error::Result;
use crate::models::{unlisted_date, VersionRecord};

/// Totals for a finished dump.
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpStats {
    pub records: usize,
    pub partitions: usize,
}

/// Buffers records and writes one partition file per `partition_size`
/// records, numbering the files sequentially from zero.
pub struct DumpWriter {
    dir: PathBuf,
    partition_size: usize,
    buffer: Vec<VersionRecord>,
    partitions: usize,
    records: usize,
}

impl DumpWriter {
    pub fn new(dir: impl Into<PathBuf>, partition_size: usize) -> Self {
        Self {
            dir: dir.into(),
            partition_size: partition_size.max(1),
            buffer: Vec::with_capacity(partition_size.max(1)),
            partitions: 0,
            records: 0,
        }
    }

    /// Queue one record, flushing a partition once the buffer fills.
    pub fn push(&mut self, record: VersionRecord) -> Result<()> {
        self.buffer.push(record);
        if self.buffer.len() >= self.partition_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Queue a batch of records.
    pub fn append(&mut self, records: Vec<VersionRecord>) -> Result<()> {
        for record in records {
            self.push(record)?;
        }
        Ok(())
    }

    /// Partitions flushed to disk so far.
    pub fn partitions_written(&self) -> usize {
        self.partitions
    }

    /// Records flushed to disk so far, not counting the open buffer.
    pub fn records_written(&self) -> usize {
        self.records
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(partition_file_name(self.partitions));
        fs::write(&path, render_partition(&self.buffer)?)?;
        log::debug!("Wrote {} records to {}", self.buffer.len(), path.display());

        self.partitions += 1;
        self.records += self.buffer.len();
        self.buffer.clear();
        Ok(())
    }

    /// Flush the remaining buffer and return the dump totals.
    pub fn finish(mut self) -> Result<DumpStats> {
        self.flush()?;
        Ok(DumpStats {
            records: self.records,
            partitions: self.partitions,
        })
    }
}

fn render_partition(records: &[VersionRecord]) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("packages")))?;
    for record in records {
        write_record(&mut writer, record)?;
    }
    writer.write_event(Event::End(BytesEnd::new("packages")))?;

    Ok(writer.into_inner().into_inner())
}

/// Serialize one record using the feed's property vocabulary.
///
/// Fields holding their parse default (empty string, zero, `false`,
/// sentinel date) are omitted; the reader restores them on load.
fn write_record<W: std::io::Write>(writer: &mut Writer<W>, record: &VersionRecord) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("package")))?;

    text_element(writer, "Id", &record.id)?;
    text_element(writer, "Version", &record.version)?;
    text_element(writer, "Title", &record.title)?;
    text_element(writer, "Summary", &record.summary)?;
    text_element(writer, "Description", &record.description)?;
    text_element(writer, "Authors", &record.authors)?;
    text_element(writer, "Tags", &record.tags)?;
    text_element(writer, "Dependencies", &record.dependencies)?;
    text_element(writer, "Copyright", &record.copyright)?;
    text_element(writer, "Language", &record.language)?;
    text_element(writer, "ReleaseNotes", &record.release_notes)?;
    text_element(writer, "MinClientVersion", &record.min_client_version)?;
    text_element(writer, "LicenseUrl", &record.license_url)?;
    text_element(writer, "LicenseNames", &record.license_names)?;
    text_element(writer, "LicenseReportUrl", &record.license_report_url)?;
    text_element(writer, "IconUrl", &record.icon_url)?;
    text_element(writer, "ProjectUrl", &record.project_url)?;
    text_element(writer, "ReportAbuseUrl", &record.report_abuse_url)?;
    text_element(writer, "DownloadUrl", &record.download_url)?;
    text_element(writer, "GalleryDetailsUrl", &record.gallery_details_url)?;
    text_element(writer, "PackageUrl", &record.package_url)?;
    text_element(writer, "PackageHash", &record.package_hash)?;
    text_element(writer, "PackageHashAlgorithm", &record.package_hash_algorithm)?;

    number_element(writer, "PackageSize", record.package_size)?;
    number_element(writer, "DownloadCount", record.download_count)?;
    number_element(writer, "VersionDownloadCount", record.version_download_count)?;

    date_element(writer, "Created", record.created)?;
    date_element(writer, "Published", record.published)?;
    date_element(writer, "LastUpdated", record.last_updated)?;
    date_element(writer, "LastEdited", record.last_edited)?;

    flag_element(writer, "IsLatestVersion", record.is_latest_version)?;
    flag_element(
        writer,
        "IsAbsoluteLatestVersion",
        record.is_absolute_latest_version,
    )?;
    flag_element(writer, "IsPrerelease", record.is_prerelease)?;
    flag_element(
        writer,
        "RequireLicenseAcceptance",
        record.require_license_acceptance,
    )?;

    writer.write_event(Event::End(BytesEnd::new("package")))?;
    Ok(())
}

fn text_element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn number_element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Ok(());
    }
    text_element(writer, name, &value.to_string())
}

fn date_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: DateTime<Utc>,
) -> Result<()> {
    if value == unlisted_date() {
        return Ok(());
    }
    text_element(writer, name, &value.to_rfc3339())
}

fn flag_element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, value: bool) -> Result<()> {
    if !value {
        return Ok(());
    }
    text_element(writer, name, "true")
}
