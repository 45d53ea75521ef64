// src/feed/parser.rs

//! Streaming parser for OData v2 Atom feed pages.

use std::sync::Arc;

use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use crate::error::Result;
use crate::models::{StringPool, VersionRecord};

const ATOM_NS: Namespace<'static> = Namespace(b"http://www.w3.org/2005/Atom");
const DATA_NS: Namespace<'static> =
    Namespace(b"http://schemas.microsoft.com/ado/2007/08/dataservices");
const METADATA_NS: Namespace<'static> =
    Namespace(b"http://schemas.microsoft.com/ado/2007/08/dataservices/metadata");

/// One parsed feed page: its records in document order, plus the
/// pagination link to the following page when the feed advertises one.
#[derive(Debug, Default)]
pub struct FeedPage {
    pub records: Vec<VersionRecord>,
    pub next_uri: Option<String>,
}

/// Parse one feed page.
///
/// Accepts both page shapes the feed serves: a `<feed>` document with
/// `<entry>` children, and a bare single-`<entry>` document. Elements the
/// vocabulary does not cover are skipped, so a page with unknown
/// properties still parses. Strings are interned through `pool`, which
/// callers share across as many pages as they like.
pub fn parse_page(xml: &str, pool: &mut StringPool) -> Result<FeedPage> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parser = PageParser::new(pool);
    loop {
        match reader.read_resolved_event()? {
            (resolve, Event::Start(e)) => parser.handle_open(resolve, &e, false)?,
            (resolve, Event::Empty(e)) => parser.handle_open(resolve, &e, true)?,
            (resolve, Event::End(e)) => parser.handle_close(resolve, &e),
            (_, Event::Text(text)) => parser.handle_text(&text)?,
            (_, Event::CData(data)) => parser.handle_cdata(&data),
            (_, Event::Eof) => break,
            _ => {}
        }
    }
    Ok(parser.page)
}

/// Which textual element the parser is currently collecting.
enum Capture {
    AtomTitle,
    AtomSummary,
    AuthorName,
    Property(Vec<u8>),
}

impl Capture {
    fn closes(&self, local: &[u8]) -> bool {
        match self {
            Capture::AtomTitle => local == b"title",
            Capture::AtomSummary => local == b"summary",
            Capture::AuthorName => local == b"name",
            Capture::Property(name) => local == name.as_slice(),
        }
    }
}

struct PageParser<'p> {
    pool: &'p mut StringPool,
    page: FeedPage,
    record: VersionRecord,
    in_entry: bool,
    in_properties: bool,
    in_author: bool,
    authors: Vec<String>,
    capture: Option<Capture>,
    text: String,
}

impl<'p> PageParser<'p> {
    fn new(pool: &'p mut StringPool) -> Self {
        Self {
            pool,
            page: FeedPage::default(),
            record: VersionRecord::default(),
            in_entry: false,
            in_properties: false,
            in_author: false,
            authors: Vec::new(),
            capture: None,
            text: String::new(),
        }
    }

    fn handle_open(
        &mut self,
        resolve: ResolveResult<'_>,
        e: &BytesStart,
        self_closing: bool,
    ) -> Result<()> {
        let local = e.local_name();
        match resolve {
            ResolveResult::Bound(ns) if ns == ATOM_NS => match local.as_ref() {
                b"entry" if !self_closing => {
                    self.in_entry = true;
                    self.record = VersionRecord::default();
                    self.authors.clear();
                }
                b"title" if self.in_entry && !self_closing => self.begin(Capture::AtomTitle),
                b"summary" if self.in_entry && !self_closing => self.begin(Capture::AtomSummary),
                b"author" if self.in_entry && !self_closing => self.in_author = true,
                b"name" if self.in_author && !self_closing => self.begin(Capture::AuthorName),
                b"content" if self.in_entry => {
                    if let Some(src) = attribute(e, b"src")? {
                        self.record.download_url = self.pool.get(&src);
                    }
                }
                b"link" if !self.in_entry => self.handle_link(e)?,
                _ => {}
            },
            ResolveResult::Bound(ns) if ns == METADATA_NS => {
                if local.as_ref() == b"properties" && self.in_entry && !self_closing {
                    self.in_properties = true;
                }
            }
            ResolveResult::Bound(ns) if ns == DATA_NS => {
                if self.in_properties && !self_closing {
                    self.begin(Capture::Property(local.as_ref().to_vec()));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_close(&mut self, resolve: ResolveResult<'_>, e: &BytesEnd) {
        let local = e.local_name();

        // Close an open text capture only at its own end tag, so markup
        // nested inside a captured element contributes its text instead
        // of truncating the value.
        if self
            .capture
            .as_ref()
            .is_some_and(|capture| capture.closes(local.as_ref()))
        {
            let capture = self.capture.take();
            let value = std::mem::take(&mut self.text);
            if let Some(capture) = capture {
                self.apply(capture, &value);
            }
        }

        match resolve {
            ResolveResult::Bound(ns) if ns == ATOM_NS => match local.as_ref() {
                b"entry" => self.finish_entry(),
                b"author" => self.in_author = false,
                _ => {}
            },
            ResolveResult::Bound(ns) if ns == METADATA_NS => {
                if local.as_ref() == b"properties" {
                    self.in_properties = false;
                }
            }
            _ => {}
        }
    }

    fn handle_text(&mut self, text: &BytesText) -> Result<()> {
        if self.capture.is_some() {
            self.text.push_str(&text.unescape()?);
        }
        Ok(())
    }

    fn handle_cdata(&mut self, data: &BytesCData) {
        if self.capture.is_some() {
            self.text.push_str(&String::from_utf8_lossy(data));
        }
    }

    fn handle_link(&mut self, e: &BytesStart) -> Result<()> {
        // The feed advertises at most one next link; the first one wins.
        if self.page.next_uri.is_some() {
            return Ok(());
        }
        let rel = attribute(e, b"rel")?;
        if rel.is_some_and(|rel| rel.eq_ignore_ascii_case("next")) {
            self.page.next_uri = attribute(e, b"href")?;
        }
        Ok(())
    }

    fn begin(&mut self, capture: Capture) {
        self.capture = Some(capture);
        self.text.clear();
    }

    fn apply(&mut self, capture: Capture, value: &str) {
        match capture {
            Capture::AtomTitle => self.record.title = self.pool.get(value),
            Capture::AtomSummary => self.record.summary = self.pool.get(value),
            Capture::AuthorName => self.authors.push(value.to_string()),
            Capture::Property(name) => {
                self.record.set_field(&name, value, self.pool);
            }
        }
    }

    fn finish_entry(&mut self) {
        let mut record = std::mem::take(&mut self.record);
        if !self.authors.is_empty() {
            record.authors = self.pool.get(&self.authors.join("|"));
            self.authors.clear();
        }
        // Some feed views omit the Id property; the atom title carries
        // the identifier there.
        if record.id.is_empty() && !record.title.is_empty() {
            record.id = Arc::clone(&record.title);
        }
        self.in_entry = false;
        self.in_properties = false;
        self.in_author = false;
        self.capture = None;
        self.page.records.push(record);
    }
}

fn attribute(e: &BytesStart, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = match attr {
            Ok(attr) => attr,
            Err(err) => {
                log::warn!("Skipping malformed feed attribute: {}", err);
                continue;
            }
        };
        if attr.key.as_ref() == name {
            return Ok(Some(attr.unescape_value()?.to_string()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_feed_date;

    const FEED_HEADER: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xml:base="https://www.nuget.org/api/v2"
      xmlns="http://www.w3.org/2005/Atom"
      xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices"
      xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
  <title type="text">Packages</title>
  <id>https://www.nuget.org/api/v2/Packages</id>
  <link rel="self" title="Packages" href="Packages"/>"#;

    fn entry(id: &str, version: &str, extra_properties: &str) -> String {
        format!(
            r#"<entry>
    <id>https://www.nuget.org/api/v2/Packages(Id='{id}',Version='{version}')</id>
    <title type="text">{id}</title>
    <summary type="text">A test package</summary>
    <author><name>Example Author</name></author>
    <link rel="edit" title="V2FeedPackage" href="Packages(Id='{id}',Version='{version}')"/>
    <content type="application/zip" src="https://www.nuget.org/api/v2/package/{id}/{version}"/>
    <m:properties>
      <d:Id>{id}</d:Id>
      <d:Version>{version}</d:Version>
      {extra_properties}
    </m:properties>
  </entry>"#
        )
    }

    fn page(entries: &[String], next: Option<&str>) -> String {
        let mut xml = String::from(FEED_HEADER);
        for e in entries {
            xml.push_str("\n  ");
            xml.push_str(e);
        }
        if let Some(next) = next {
            xml.push_str(&format!("\n  <link rel=\"next\" href=\"{}\"/>", next));
        }
        xml.push_str("\n</feed>");
        xml
    }

    #[test]
    fn test_parse_page_extracts_records_in_document_order() {
        let xml = page(
            &[
                entry("Newtonsoft.Json", "9.0.1", ""),
                entry("NUnit", "3.6.1", ""),
            ],
            None,
        );
        let mut pool = StringPool::new();
        let parsed = parse_page(&xml, &mut pool).unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].id.as_ref(), "Newtonsoft.Json");
        assert_eq!(parsed.records[0].version.as_ref(), "9.0.1");
        assert_eq!(parsed.records[1].id.as_ref(), "NUnit");
        assert_eq!(parsed.next_uri, None);
    }

    #[test]
    fn test_parse_page_reads_typed_properties() {
        let xml = page(
            &[entry(
                "Newtonsoft.Json",
                "9.0.1",
                r#"<d:Description>Json.NET is a popular high-performance JSON framework</d:Description>
      <d:Tags>json serializer</d:Tags>
      <d:Dependencies></d:Dependencies>
      <d:DownloadCount m:type="Edm.Int64">631222965</d:DownloadCount>
      <d:VersionDownloadCount m:type="Edm.Int32">12345</d:VersionDownloadCount>
      <d:PackageSize m:type="Edm.Int64">2034687</d:PackageSize>
      <d:Created m:type="Edm.DateTime">2016-06-13T21:46:14.787</d:Created>
      <d:Published m:type="Edm.DateTime">2016-06-13T21:46:14.787</d:Published>
      <d:IsLatestVersion m:type="Edm.Boolean">true</d:IsLatestVersion>
      <d:IsPrerelease m:type="Edm.Boolean">false</d:IsPrerelease>"#,
            )],
            None,
        );
        let mut pool = StringPool::new();
        let parsed = parse_page(&xml, &mut pool).unwrap();
        let record = &parsed.records[0];

        assert_eq!(record.title.as_ref(), "Newtonsoft.Json");
        assert_eq!(record.summary.as_ref(), "A test package");
        assert_eq!(record.authors.as_ref(), "Example Author");
        assert_eq!(record.tags.as_ref(), "json serializer");
        assert_eq!(record.download_count, 631222965);
        assert_eq!(record.version_download_count, 12345);
        assert_eq!(record.package_size, 2034687);
        assert_eq!(record.created, parse_feed_date("2016-06-13T21:46:14.787"));
        assert!(record.is_latest_version);
        assert!(!record.is_prerelease);
        assert_eq!(
            record.download_url.as_ref(),
            "https://www.nuget.org/api/v2/package/Newtonsoft.Json/9.0.1"
        );
    }

    #[test]
    fn test_parse_page_joins_multiple_authors() {
        let xml = page(
            &[entry("FakeItEasy", "4.0.0", "").replace(
                "<author><name>Example Author</name></author>",
                "<author><name>Patrik Hägne</name></author><author><name>The contributors</name></author>",
            )],
            None,
        );
        let mut pool = StringPool::new();
        let parsed = parse_page(&xml, &mut pool).unwrap();
        assert_eq!(
            parsed.records[0].authors.as_ref(),
            "Patrik Hägne|The contributors"
        );
    }

    #[test]
    fn test_parse_page_takes_feed_level_next_link_only() {
        let xml = page(
            &[entry("NUnit", "3.6.1", "")],
            Some("https://www.nuget.org/api/v2/Packages?$skiptoken='NUnit','3.6.1'"),
        );
        let mut pool = StringPool::new();
        let parsed = parse_page(&xml, &mut pool).unwrap();
        assert_eq!(
            parsed.next_uri.as_deref(),
            Some("https://www.nuget.org/api/v2/Packages?$skiptoken='NUnit','3.6.1'")
        );
    }

    #[test]
    fn test_parse_page_unescapes_entities() {
        let xml = page(
            &[entry("Escaped", "1.0.0", "").replace(
                "<summary type=\"text\">A test package</summary>",
                "<summary type=\"text\">Tom &amp; Jerry &lt;3</summary>",
            )],
            Some("https://example.org/Packages?a=1&amp;b=2"),
        );
        let mut pool = StringPool::new();
        let parsed = parse_page(&xml, &mut pool).unwrap();
        assert_eq!(parsed.records[0].summary.as_ref(), "Tom & Jerry <3");
        assert_eq!(
            parsed.next_uri.as_deref(),
            Some("https://example.org/Packages?a=1&b=2")
        );
    }

    #[test]
    fn test_parse_page_defaults_missing_fields() {
        let xml = page(
            &[entry(
                "Sparse",
                "0.1.0",
                r#"<d:Summary m:null="true"/><d:LicenseUrl m:null="true"/>"#,
            )],
            None,
        );
        let mut pool = StringPool::new();
        let record = parse_page(&xml, &mut pool).unwrap().records.remove(0);

        assert_eq!(record.license_url.as_ref(), "");
        assert_eq!(record.dependencies.as_ref(), "");
        assert_eq!(record.package_size, 0);
        assert!(record.is_unlisted());
    }

    #[test]
    fn test_parse_page_ignores_unknown_properties() {
        let xml = page(
            &[entry(
                "Forward.Compat",
                "1.0.0",
                "<d:BrandNewProperty>whatever</d:BrandNewProperty>",
            )],
            None,
        );
        let mut pool = StringPool::new();
        let parsed = parse_page(&xml, &mut pool).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].id.as_ref(), "Forward.Compat");
    }

    #[test]
    fn test_parse_single_entry_document() {
        let xml = format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
{}"#,
            entry("Lonely.Package", "2.0.0", "").replace(
                "<entry>",
                r#"<entry xml:base="https://www.nuget.org/api/v2"
       xmlns="http://www.w3.org/2005/Atom"
       xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices"
       xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">"#
            )
        );
        let mut pool = StringPool::new();
        let parsed = parse_page(&xml, &mut pool).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].id.as_ref(), "Lonely.Package");
        assert_eq!(parsed.next_uri, None);
    }

    #[test]
    fn test_parse_page_falls_back_to_title_for_missing_id() {
        let xml = page(
            &[entry("Title.Only", "1.0.0", "")
                .replace("<d:Id>Title.Only</d:Id>", "")],
            None,
        );
        let mut pool = StringPool::new();
        let parsed = parse_page(&xml, &mut pool).unwrap();
        assert_eq!(parsed.records[0].id.as_ref(), "Title.Only");
    }

    #[test]
    fn test_parse_page_interns_repeated_strings() {
        let xml = page(
            &[
                entry("Twin.A", "1.0.0", "<d:Tags>shared tags</d:Tags>"),
                entry("Twin.B", "1.0.0", "<d:Tags>shared tags</d:Tags>"),
            ],
            None,
        );
        let mut pool = StringPool::new();
        let parsed = parse_page(&xml, &mut pool).unwrap();
        assert!(Arc::ptr_eq(
            &parsed.records[0].tags,
            &parsed.records[1].tags
        ));
        assert!(Arc::ptr_eq(
            &parsed.records[0].version,
            &parsed.records[1].version
        ));
    }

    #[test]
    fn test_parse_page_is_idempotent() {
        let xml = page(
            &[
                entry("Repeat.A", "1.0.0", "<d:DownloadCount>7</d:DownloadCount>"),
                entry("Repeat.B", "2.0.0", ""),
            ],
            Some("https://example.org/next"),
        );
        let mut pool = StringPool::new();
        let first = parse_page(&xml, &mut pool).unwrap();
        let second = parse_page(&xml, &mut pool).unwrap();
        assert_eq!(first.records, second.records);
        assert_eq!(first.next_uri, second.next_uri);
    }

    #[test]
    fn test_parse_tolerates_no_complete_record_in_truncated_page() {
        let mut pool = StringPool::new();
        match parse_page("<feed><entry>", &mut pool) {
            Ok(page) => assert!(page.records.is_empty()),
            Err(_) => {}
        }
    }
}
