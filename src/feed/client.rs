// src/feed/client.rs

//! HTTP access to the OData v2 package feed.

use reqwest::header;
use reqwest::StatusCode;

use crate::error::{AppError, Result};
use crate::models::FeedConfig;
use crate::utils::http::create_async_client;

/// Media types the feed serves pages as.
const FEED_ACCEPT: &str = "application/atom+xml, application/xml";

/// Query shape for a crawl: plain enumeration or a server-side search.
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    /// Server-side search term; `None` enumerates the whole feed.
    pub search_term: Option<String>,

    /// Whether search results include prerelease versions.
    pub include_prerelease: bool,
}

impl FeedQuery {
    /// Enumerate every record the feed publishes.
    pub fn enumerate_all() -> Self {
        Self::default()
    }

    /// Search the feed server-side for `term`.
    pub fn search(term: impl Into<String>, include_prerelease: bool) -> Self {
        Self {
            search_term: Some(term.into()),
            include_prerelease,
        }
    }
}

/// Thin client over the feed endpoints.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: reqwest::Client,
    base_url: String,
}

impl FeedClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build a client from feed configuration.
    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        Ok(Self::new(create_async_client(config)?, &config.base_url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Address of one feed page for `query`, using skip/take paging.
    pub fn page_uri(&self, query: &FeedQuery, skip: usize, take: usize) -> String {
        match &query.search_term {
            Some(term) => format!(
                "{}/Search()?searchTerm='{}'&targetFramework=''&includePrerelease={}&$skip={}&$top={}",
                self.base_url,
                encode_term(term),
                query.include_prerelease,
                skip,
                take
            ),
            None => format!("{}/Packages()?$skip={}&$top={}", self.base_url, skip, take),
        }
    }

    /// Address of the record-count endpoint for `query`.
    pub fn count_uri(&self, query: &FeedQuery) -> String {
        match &query.search_term {
            Some(term) => format!(
                "{}/Search()/$count?searchTerm='{}'&targetFramework=''&includePrerelease={}",
                self.base_url,
                encode_term(term),
                query.include_prerelease
            ),
            None => format!("{}/Packages/$count", self.base_url),
        }
    }

    /// Fetch one feed page.
    ///
    /// Returns the page body on success and `None` when the feed answers
    /// with an empty-page short-circuit: 204, or 404 when the caller opts
    /// in via `ignore_not_found`. Every other status is a protocol error.
    pub async fn get_page(&self, uri: &str, ignore_not_found: bool) -> Result<Option<String>> {
        log::debug!("GET {}", uri);
        let response = self
            .client
            .get(uri)
            .header(header::ACCEPT, FEED_ACCEPT)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(Some(response.text().await?));
        }
        if status == StatusCode::NO_CONTENT || (ignore_not_found && status == StatusCode::NOT_FOUND)
        {
            log::debug!("Empty page for {} ({})", uri, status);
            return Ok(None);
        }
        Err(AppError::protocol(uri, status))
    }

    /// Resolve the total record count for `query`.
    ///
    /// Only a success response is tolerated here.
    pub async fn get_count(&self, query: &FeedQuery) -> Result<usize> {
        let uri = self.count_uri(query);
        log::debug!("GET {}", uri);
        let response = self.client.get(&uri).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AppError::protocol(&uri, status));
        }
        let body = response.text().await?;
        body.trim().parse().map_err(|_| {
            AppError::validation(format!(
                "count endpoint at '{}' returned a non-numeric payload",
                uri
            ))
        })
    }
}

/// Percent-encode a search term, doubling single quotes the OData way.
fn encode_term(term: &str) -> String {
    let quoted = term.replace('\'', "''");
    url::form_urlencoded::byte_serialize(quoted.as_bytes()).collect()
}
