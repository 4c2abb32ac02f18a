// src/ingest/config.rs
//! Endpoints, namespaces and pacing for the feed strategies.
//!
//! Everything a strategy would otherwise read from module constants lives
//! here so tests can point a `FeedSource` at a fake endpoint with zero delays.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which wire protocol a `FeedSource` speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Atom,
    Oai,
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atom" | "api" => Ok(Self::Atom),
            "oai" | "oai-pmh" => Ok(Self::Oai),
            other => Err(format!("unknown protocol '{other}' (expected atom or oai)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub protocol: Protocol,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub atom: AtomConfig,
    pub oai: OaiConfig,
    pub namespaces: Namespaces,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Atom,
            user_agent: concat!("arxiv-scan/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 60,
            atom: AtomConfig::default(),
            oai: OaiConfig::default(),
            namespaces: Namespaces::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtomConfig {
    pub endpoint: String,
    /// The API caps pages at 1000; the server is more stable at 800.
    pub page_size: usize,
    pub initial_delay_ms: u64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_errors: u32,
}

impl Default for AtomConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://export.arxiv.org/api/query".to_string(),
            page_size: 800,
            initial_delay_ms: 500,
            min_delay_ms: 500,
            max_delay_ms: 4_000,
            max_errors: 100,
        }
    }
}

impl AtomConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff {
            initial: Duration::from_millis(self.initial_delay_ms),
            min: Duration::from_millis(self.min_delay_ms),
            max: Duration::from_millis(self.max_delay_ms),
            max_errors: self.max_errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OaiConfig {
    pub endpoint: String,
    /// Only the raw-metadata format carries categories and version dates.
    pub metadata_prefix: String,
    /// Pause between consecutive requests.
    pub request_delay_ms: u64,
    /// Upper bound on 503 retries within one fetch.
    pub max_errors: u32,
    /// Used when a 503 arrives without a readable `Retry-After`.
    pub fallback_retry_after_secs: u64,
}

impl Default for OaiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://export.arxiv.org/oai2".to_string(),
            metadata_prefix: "arXivRaw".to_string(),
            request_delay_ms: 1_000,
            max_errors: 10,
            fallback_retry_after_secs: 5,
        }
    }
}

/// XML namespace URIs the decoders match element names against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Namespaces {
    pub atom: String,
    pub arxiv: String,
    pub oai: String,
    pub arxiv_raw: String,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            atom: "http://www.w3.org/2005/Atom".to_string(),
            arxiv: "http://arxiv.org/schemas/atom".to_string(),
            oai: "http://www.openarchives.org/OAI/2.0/".to_string(),
            arxiv_raw: "http://arxiv.org/OAI/arXivRaw/".to_string(),
        }
    }
}

/// Bounds of the adaptive delay used by the Atom strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub min: Duration,
    pub max: Duration,
    pub max_errors: u32,
}
