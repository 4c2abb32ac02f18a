// src/ingest/types.rs
use std::collections::{BTreeSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// What to fetch: categories back to a cutoff instant, plus record filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub categories: BTreeSet<String>,
    /// Inclusive lower bound on the gating date.
    pub cutoff: DateTime<Utc>,
    pub include_cross_lists: bool,
    pub resubmissions_only: bool,
}

impl FeedQuery {
    pub fn new<I, S>(categories: I, cutoff: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
            cutoff,
            include_cross_lists: true,
            resubmissions_only: false,
        }
    }

    pub fn cross_lists(mut self, include: bool) -> Self {
        self.include_cross_lists = include;
        self
    }

    pub fn resubmissions_only(mut self, only: bool) -> Self {
        self.resubmissions_only = only;
        self
    }
}

/// Status, `Retry-After` and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn unavailable(retry_after: Option<Duration>) -> Self {
        Self {
            status: 503,
            retry_after,
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unavailable(&self) -> bool {
        self.status == 503
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Peer dropped the connection; worth retrying.
    #[error("connection reset: {0}")]
    ConnectionReset(String),
    #[error("request failed: {0}")]
    Failed(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionReset(_))
    }
}

/// Outbound GET seam used by both feed strategies.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError>;
}

// --- Test helper ---

/// Replays a scripted sequence of responses and records requested URLs.
/// Once the script is exhausted every further request fails.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    pub requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Result<RawResponse, TransportError>>,
    {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(vec![]),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_else(|| Err(TransportError::Failed("script exhausted".into())))
    }
}
