// src/feed/mod.rs

//! OData feed access: query building, page parsing and crawling.

pub mod client;
pub mod crawler;
pub mod parser;

pub use client::{FeedClient, FeedQuery};
pub use crawler::{CrawlSummary, FeedCrawler};
pub use parser::{parse_page, FeedPage};
