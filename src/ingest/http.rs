// src/ingest/http.rs
//! reqwest-backed `Transport`.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;

use crate::error::{Result, ScanError};
use crate::ingest::config::FeedConfig;
use crate::ingest::types::{RawResponse, Transport, TransportError};

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ScanError::transport)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> std::result::Result<RawResponse, TransportError> {
        let response = self.client.get(url).send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.map_err(classify)?;
        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// `Retry-After` in delta-seconds form. HTTP dates are not used by the feed.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Resets and aborts anywhere in the source chain are transient.
fn classify(err: reqwest::Error) -> TransportError {
    let mut source: Option<&(dyn StdError + 'static)> = Some(&err);
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
            ) {
                return TransportError::ConnectionReset(err.to_string());
            }
        }
        source = e.source();
    }
    TransportError::Failed(err.to_string())
}
