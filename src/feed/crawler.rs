// src/feed/crawler.rs

//! Paginated crawling of the package feed.
//!
//! Two modes: a serial crawl that follows the feed's own next links, and a
//! parallel crawl that addresses pages by skip/take and appends straight
//! into the partitioned dump.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use futures::stream::{self, StreamExt};

use crate::dump::DumpWriter;
use crate::error::{AppError, Result};
use crate::feed::client::{FeedClient, FeedQuery};
use crate::feed::parser::parse_page;
use crate::models::{StringPool, VersionRecord};

/// Summary of a parallel page crawl.
#[derive(Debug, Default)]
pub struct CrawlSummary {
    pub pages: usize,
    pub records: usize,
}

/// Crawler over a feed client.
pub struct FeedCrawler {
    client: FeedClient,
    max_concurrent: usize,
}

impl FeedCrawler {
    pub fn new(client: FeedClient, max_concurrent: usize) -> Self {
        Self {
            client,
            max_concurrent,
        }
    }

    /// Crawl the feed serially by following its next links.
    ///
    /// Stops at the first page without a next link, at an empty-page
    /// short-circuit, when `max` records have accumulated (the result is
    /// truncated to exactly `max`), or when `cancel` is raised, in which
    /// case the records gathered so far are returned. A next link that
    /// was already fetched (compared case-insensitively) aborts the crawl
    /// instead of looping forever.
    pub async fn crawl(
        &self,
        query: &FeedQuery,
        page_size: usize,
        max: Option<usize>,
        cancel: &AtomicBool,
    ) -> Result<Vec<VersionRecord>> {
        if max == Some(0) {
            return Ok(Vec::new());
        }
        let take = match max {
            Some(limit) => page_size.min(limit).max(1),
            None => page_size.max(1),
        };

        let mut pool = StringPool::new();
        let mut records = Vec::new();
        let mut visited = HashSet::new();

        let first = self.client.page_uri(query, 0, take);
        visited.insert(first.to_lowercase());
        let mut next = Some(first);

        while let Some(uri) = next {
            if cancel.load(Ordering::Relaxed) {
                log::warn!(
                    "Cancellation requested, stopping crawl after {} records",
                    records.len()
                );
                break;
            }

            let Some(body) = self.client.get_page(&uri, false).await? else {
                break;
            };
            let page = parse_page(&body, &mut pool)?;
            log::debug!("Parsed {} records from {}", page.records.len(), uri);
            records.extend(page.records);

            if let Some(limit) = max {
                if records.len() >= limit {
                    records.truncate(limit);
                    break;
                }
            }

            next = match page.next_uri {
                Some(link) => {
                    if !visited.insert(link.to_lowercase()) {
                        return Err(AppError::pagination_cycle(link));
                    }
                    Some(link)
                }
                None => None,
            };
        }

        Ok(records)
    }

    /// Crawl `total` records as skip/take pages, in parallel, appending
    /// each fetched page into `writer`.
    ///
    /// Page fetches run with bounded concurrency; every finished page is
    /// appended under the writer lock, so partition flushes happen inside
    /// the same critical section as the append that triggered them. A
    /// protocol or parse failure on any page aborts the crawl; pages that
    /// have not started when `cancel` is raised are skipped.
    pub async fn crawl_pages(
        &self,
        query: &FeedQuery,
        total: usize,
        page_size: usize,
        writer: &Mutex<DumpWriter>,
        cancel: &AtomicBool,
    ) -> Result<CrawlSummary> {
        if total == 0 {
            return Ok(CrawlSummary::default());
        }
        let take = page_size.min(total).max(1);
        let pages = total.div_ceil(take);
        log::info!(
            "Fetching {} records as {} pages of up to {} records",
            total,
            pages,
            take
        );

        let progress = &AtomicUsize::new(0);
        let mut page_stream = stream::iter(0..pages)
            .map(|index| async move {
                if cancel.load(Ordering::Relaxed) {
                    return Ok(0);
                }

                let skip = index * take;
                let top = take.min(total - skip);
                let uri = self.client.page_uri(query, skip, top);
                let records = match self.client.get_page(&uri, false).await? {
                    Some(body) => {
                        let mut pool = StringPool::new();
                        parse_page(&body, &mut pool)?.records
                    }
                    None => Vec::new(),
                };
                let count = records.len();

                let partitions = {
                    let mut dump = writer.lock().unwrap_or_else(PoisonError::into_inner);
                    dump.append(records)?;
                    dump.partitions_written()
                };

                let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
                log::info!(
                    "Downloaded {}/{} pages, written {} partitions",
                    done,
                    pages,
                    partitions
                );
                Ok::<usize, AppError>(count)
            })
            .buffer_unordered(self.max_concurrent.max(1));

        let mut records = 0;
        while let Some(result) = page_stream.next().await {
            records += result?;
        }

        Ok(CrawlSummary {
            pages: progress.load(Ordering::Relaxed),
            records,
        })
    }
}
