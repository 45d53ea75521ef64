// src/dump/reader.rs

//! Lazy reading of dump partition files.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::dump::partition_index;
use crate::error::{AppError, Result};
use crate::models::{StringPool, VersionRecord};

/// Reads a dump directory back as version records.
///
/// Partitions are visited in numeric index order, so a dump written as
/// `nugetdump-0.xml` through `nugetdump-12.xml` replays in the exact
/// order it was flushed, not in lexicographic file-name order.
pub struct DumpReader {
    files: Vec<PathBuf>,
}

impl DumpReader {
    /// Open a dump directory.
    ///
    /// Files that do not match the partition naming scheme are ignored.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let mut indexed = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(index) = partition_index(name) {
                indexed.push((index, entry.path()));
            }
        }
        indexed.sort_unstable_by_key(|(index, _)| *index);
        Ok(Self {
            files: indexed.into_iter().map(|(_, path)| path).collect(),
        })
    }

    pub fn partition_count(&self) -> usize {
        self.files.len()
    }

    /// Partition paths in replay order.
    pub fn partitions(&self) -> &[PathBuf] {
        &self.files
    }

    /// Iterate every record in the dump, lazily.
    ///
    /// Each call starts a fresh pass over the files; nothing is held in
    /// memory beyond the record currently being decoded.
    pub fn records(&self) -> DumpRecords {
        DumpRecords {
            files: self.files.clone().into_iter(),
            current: None,
        }
    }

    /// Eagerly read one partition file.
    pub fn read_partition(path: impl AsRef<Path>) -> Result<Vec<VersionRecord>> {
        let mut stream = PartitionStream::open(path.as_ref())?;
        let mut records = Vec::new();
        while let Some(record) = stream.next_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

/// Lazy iterator over every record in a dump.
pub struct DumpRecords {
    files: std::vec::IntoIter<PathBuf>,
    current: Option<PartitionStream>,
}

impl Iterator for DumpRecords {
    type Item = Result<VersionRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(stream) = self.current.as_mut() {
                match stream.next_record() {
                    Ok(Some(record)) => return Some(Ok(record)),
                    Ok(None) => self.current = None,
                    Err(err) => {
                        self.current = None;
                        return Some(Err(err));
                    }
                }
            } else {
                let path = self.files.next()?;
                match PartitionStream::open(&path) {
                    Ok(stream) => self.current = Some(stream),
                    Err(err) => return Some(Err(err)),
                }
            }
        }
    }
}

/// Event-by-event decoder for one partition file.
struct PartitionStream {
    reader: Reader<BufReader<File>>,
    buf: Vec<u8>,
    pool: StringPool,
    path: PathBuf,
}

impl PartitionStream {
    fn open(path: &Path) -> Result<Self> {
        let mut reader = Reader::from_reader(BufReader::new(File::open(path)?));
        reader.config_mut().trim_text(true);
        Ok(Self {
            reader,
            buf: Vec::new(),
            pool: StringPool::new(),
            path: path.to_path_buf(),
        })
    }

    fn next_record(&mut self) -> Result<Option<VersionRecord>> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) if e.local_name().as_ref() == b"package" => {
                    return self.read_package().map(Some);
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }

    fn read_package(&mut self) -> Result<VersionRecord> {
        let mut record = VersionRecord::default();
        let mut field: Option<Vec<u8>> = None;
        let mut text = String::new();

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    field = Some(e.local_name().as_ref().to_vec());
                    text.clear();
                }
                Event::Text(t) => {
                    if field.is_some() {
                        text.push_str(&t.unescape()?);
                    }
                }
                Event::End(e) => {
                    if e.local_name().as_ref() == b"package" {
                        return Ok(record);
                    }
                    if let Some(name) = field.take() {
                        record.set_field(&name, &text, &mut self.pool);
                        text.clear();
                    }
                }
                Event::Empty(_) => field = None,
                Event::Eof => {
                    return Err(AppError::validation(format!(
                        "partition file {} ended inside a package element",
                        self.path.display()
                    )));
                }
                _ => {}
            }
        }
    }
}
