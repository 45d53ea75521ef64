// src/dump/mod.rs

//! Partitioned XML dump files.
//!
//! A harvest writes its records as a series of `nugetdump-<index>.xml`
//! partition files; the indexing side reads them back lazily, in numeric
//! partition order.

mod reader;
mod writer;

pub use reader::{DumpReader, DumpRecords};
pub use writer::{DumpStats, DumpWriter};

/// File name of the partition with the given index.
pub fn partition_file_name(index: usize) -> String {
    format!("nugetdump-{}.xml", index)
}

/// Parse a partition index back out of a file name.
///
/// Returns `None` for anything that is not a partition file, so foreign
/// files in the dump directory are skipped rather than misread.
pub(crate) fn partition_index(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix("nugetdump-")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}
