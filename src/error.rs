// src/error.rs

//! Unified error handling for the harvester application.

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// XML parsing or writing failed
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// XML text or attribute could not be unescaped
    #[error("XML escape error: {0}")]
    XmlEscape(#[from] quick_xml::escape::EscapeError),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// The feed answered with a status the protocol does not allow
    #[error("the feed at '{uri}' returned an unexpected status code '{status} {reason}'")]
    Protocol {
        uri: String,
        status: u16,
        reason: String,
    },

    /// A next link pointed back at a page that was already fetched
    #[error(
        "'{uri}' is a duplicate url which has already been downloaded and would lead to a \
         pagination cycle; please correct from server"
    )]
    PaginationCycle { uri: String },

    /// The bulk sink rejected one or more packages in a batch
    #[error("bulk load batch {batch} rejected {failed} package(s)")]
    BulkLoad { batch: usize, failed: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a protocol error for an unexpected HTTP response.
    pub fn protocol(uri: impl Into<String>, status: reqwest::StatusCode) -> Self {
        Self::Protocol {
            uri: uri.into(),
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
        }
    }

    /// Create a pagination cycle error for a duplicate next link.
    pub fn pagination_cycle(uri: impl Into<String>) -> Self {
        Self::PaginationCycle { uri: uri.into() }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
