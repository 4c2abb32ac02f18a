// src/error.rs

//! Error taxonomy for feed ingestion, scoring and configuration.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum ScanError {
    /// The per-fetch error budget ran out. No partial results are returned.
    #[error("ingestion failed after {errors} errors (last delay {last_delay:?})")]
    Ingestion { errors: u32, last_delay: Duration },

    /// A record or cursor did not have the expected shape (protocol drift).
    #[error("parse error: {0}")]
    Parse(String),

    /// Non-success HTTP status that is not retried.
    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    /// Non-recoverable transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// In-band error reported by the query API.
    #[error("feed API error: {0}")]
    Api(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid rule pattern: {0}")]
    Regex(#[from] regex::Error),
}

impl ScanError {
    pub fn parse(message: impl fmt::Display) -> Self {
        Self::Parse(message.to_string())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn transport(message: impl fmt::Display) -> Self {
        Self::Transport(message.to_string())
    }

    /// True for the two fatal ingestion kinds a caller is expected to handle.
    pub fn is_ingestion_fatal(&self) -> bool {
        matches!(self, Self::Ingestion { .. } | Self::Parse(_))
    }

    /// Raised while talking to or decoding the feed, as opposed to setup.
    pub fn is_feed_error(&self) -> bool {
        matches!(
            self,
            Self::Ingestion { .. }
                | Self::Parse(_)
                | Self::Status { .. }
                | Self::Transport(_)
                | Self::Api(_)
        )
    }
}

impl From<quick_xml::Error> for ScanError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Parse(format!("malformed XML: {e}"))
    }
}

impl From<quick_xml::events::attributes::AttrError> for ScanError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Parse(format!("malformed XML attribute: {e}"))
    }
}
