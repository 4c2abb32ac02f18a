// tests/atom_feed.rs
use std::sync::Arc;
use std::time::Duration;

use arxiv_scan::ingest::config::{FeedConfig, Protocol};
use arxiv_scan::ingest::types::{FeedQuery, RawResponse, ScriptedTransport, TransportError};
use arxiv_scan::{FeedSource, ScanError};
use chrono::{DateTime, TimeZone, Utc};
use tokio::time::Instant;

fn atom_entry(id: &str, published: &str, updated: &str, category: &str) -> String {
    format!(
        r#"<entry>
    <id>http://arxiv.org/abs/{id}v1</id>
    <updated>{updated}</updated>
    <published>{published}</published>
    <title>Paper {id}</title>
    <summary>Abstract of {id}.</summary>
    <author><name>A. Janka</name></author>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="{category}" scheme="http://arxiv.org/schemas/atom"/>
  </entry>"#
    )
}

fn submitted(id: &str, published: &str) -> String {
    atom_entry(id, published, published, "astro-ph.EP")
}

fn feed(entries: &[String]) -> Result<RawResponse, TransportError> {
    Ok(RawResponse::ok(format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query</title>
  {}
</feed>"#,
        entries.join("\n")
    )))
}

fn config(page_size: usize, max_errors: u32) -> FeedConfig {
    let mut cfg = FeedConfig::default();
    cfg.protocol = Protocol::Atom;
    cfg.atom.endpoint = "http://feed.test/api/query".into();
    cfg.atom.page_size = page_size;
    cfg.atom.max_errors = max_errors;
    cfg
}

fn cutoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 11, 18, 0, 0).unwrap()
}

fn source(cfg: FeedConfig, transport: &Arc<ScriptedTransport>) -> FeedSource {
    FeedSource::new(cfg, transport.clone())
}

fn start_param(url: &str) -> String {
    reqwest::Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "start")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

fn ids(entries: &[arxiv_scan::Entry]) -> Vec<&str> {
    entries.iter().map(|e| e.id.as_str()).collect()
}

#[tokio::test(start_paused = true)]
async fn empty_page_is_retried_and_fetch_continues() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        feed(&[]),
        feed(&[
            submitted("2403.00003", "2024-03-13T10:00:00Z"),
            submitted("2403.00002", "2024-03-12T10:00:00Z"),
        ]),
        feed(&[
            submitted("2403.00001", "2024-03-11T19:00:00Z"),
            submitted("2403.00000", "2024-03-10T10:00:00Z"),
        ]),
    ]));
    let query = FeedQuery::new(["astro-ph.EP"], cutoff());

    let started = Instant::now();
    let entries = source(config(2, 10), &transport).fetch(&query).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(ids(&entries), vec!["2403.00003v1", "2403.00002v1", "2403.00001v1"]);
    let starts: Vec<String> = transport.requested().iter().map(|u| start_param(u)).collect();
    assert_eq!(starts, vec!["0", "0", "2"]);
    // doubled to 1 s after the empty page, halved back to 0.5 s after the full one
    assert!(elapsed >= Duration::from_millis(1_500), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1_600), "{elapsed:?}");
    assert_eq!(transport.remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn cutoff_boundary_is_inclusive() {
    let transport = Arc::new(ScriptedTransport::new(vec![feed(&[
        submitted("2403.00002", "2024-03-11T18:00:00Z"),
        submitted("2403.00001", "2024-03-11T17:59:59Z"),
    ])]));
    let query = FeedQuery::new(["astro-ph.EP"], cutoff());
    let entries = source(config(2, 10), &transport).fetch(&query).await.unwrap();
    assert_eq!(ids(&entries), vec!["2403.00002v1"]);
    assert_eq!(transport.requested().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_is_fatal() {
    let transport = Arc::new(ScriptedTransport::new(vec![feed(&[]), feed(&[]), feed(&[])]));
    let query = FeedQuery::new(["astro-ph.EP"], cutoff());
    let err = source(config(2, 2), &transport)
        .fetch(&query)
        .await
        .unwrap_err();
    assert!(err.is_ingestion_fatal());
    match err {
        ScanError::Ingestion { errors, last_delay } => {
            assert_eq!(errors, 3);
            assert_eq!(last_delay, Duration::from_secs(4));
        }
        other => panic!("expected ingestion error, got {other:?}"),
    }
    assert_eq!(transport.requested().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn connection_reset_is_transient_other_failures_are_not() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Err(TransportError::ConnectionReset("peer reset".into())),
        feed(&[
            submitted("2403.00002", "2024-03-12T10:00:00Z"),
            submitted("2403.00001", "2024-03-10T10:00:00Z"),
        ]),
    ]));
    let query = FeedQuery::new(["astro-ph.EP"], cutoff());
    let entries = source(config(2, 10), &transport).fetch(&query).await.unwrap();
    assert_eq!(ids(&entries), vec!["2403.00002v1"]);

    let transport = Arc::new(ScriptedTransport::new(vec![Err(TransportError::Failed(
        "dns failure".into(),
    ))]));
    let err = source(config(2, 10), &transport)
        .fetch(&query)
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::Transport(_)));
    assert_eq!(transport.requested().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn service_unavailable_waits_retry_after() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(RawResponse::unavailable(Some(Duration::from_secs(7)))),
        feed(&[
            submitted("2403.00002", "2024-03-12T10:00:00Z"),
            submitted("2403.00001", "2024-03-10T10:00:00Z"),
        ]),
    ]));
    let query = FeedQuery::new(["astro-ph.EP"], cutoff());
    let started = Instant::now();
    let entries = source(config(2, 10), &transport).fetch(&query).await.unwrap();
    let elapsed = started.elapsed();
    assert_eq!(entries.len(), 1);
    assert!(elapsed >= Duration::from_secs(7), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(7_100), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn short_page_advances_offset_and_backs_off() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        feed(&[submitted("2403.00002", "2024-03-12T10:00:00Z")]),
        feed(&[submitted("2403.00001", "2024-03-10T10:00:00Z")]),
    ]));
    let query = FeedQuery::new(["astro-ph.EP"], cutoff());
    let started = Instant::now();
    let entries = source(config(2, 10), &transport).fetch(&query).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(ids(&entries), vec!["2403.00002v1"]);
    let starts: Vec<String> = transport.requested().iter().map(|u| start_param(u)).collect();
    assert_eq!(starts, vec!["0", "1"]);
    assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1_100), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn cross_lists_are_dropped_on_request() {
    let page = || {
        feed(&[
            atom_entry("2403.00003", "2024-03-13T10:00:00Z", "2024-03-13T10:00:00Z", "astro-ph.EP"),
            atom_entry("2403.00002", "2024-03-12T10:00:00Z", "2024-03-12T10:00:00Z", "astro-ph.SR"),
            atom_entry("2403.00001", "2024-03-10T10:00:00Z", "2024-03-10T10:00:00Z", "astro-ph.EP"),
        ])
    };
    let query = FeedQuery::new(["astro-ph.EP"], cutoff());

    let transport = Arc::new(ScriptedTransport::new(vec![page()]));
    let all = source(config(3, 10), &transport).fetch(&query).await.unwrap();
    assert_eq!(all.len(), 2);

    let transport = Arc::new(ScriptedTransport::new(vec![page()]));
    let own = source(config(3, 10), &transport)
        .fetch(&query.clone().cross_lists(false))
        .await
        .unwrap();
    assert_eq!(ids(&own), vec!["2403.00003v1"]);
}

#[tokio::test(start_paused = true)]
async fn resubmissions_gate_on_latest_update() {
    let transport = Arc::new(ScriptedTransport::new(vec![feed(&[
        atom_entry("2402.00009", "2024-02-01T10:00:00Z", "2024-03-12T10:00:00Z", "astro-ph.EP"),
        atom_entry("2402.00001", "2024-02-01T10:00:00Z", "2024-02-02T10:00:00Z", "astro-ph.EP"),
    ])]));
    let query = FeedQuery::new(["astro-ph.EP"], cutoff()).resubmissions_only(true);
    let entries = source(config(2, 10), &transport).fetch(&query).await.unwrap();
    assert_eq!(ids(&entries), vec!["2402.00009v1"]);
    assert!(transport.requested()[0].contains("sortBy=lastUpdatedDate"));
}

#[tokio::test(start_paused = true)]
async fn missing_field_propagates_without_retry() {
    let broken = r#"<entry><id>http://arxiv.org/abs/2403.00001v1</id><title>t</title></entry>"#;
    let transport = Arc::new(ScriptedTransport::new(vec![feed(&[broken.to_string()])]));
    let query = FeedQuery::new(["astro-ph.EP"], cutoff());
    let err = source(config(2, 10), &transport)
        .fetch(&query)
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::Parse(_)));
    assert!(err.is_ingestion_fatal());
    assert_eq!(transport.requested().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unexpected_status_is_fatal() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(RawResponse {
        status: 500,
        retry_after: None,
        body: String::new(),
    })]));
    let query = FeedQuery::new(["astro-ph.EP"], cutoff());
    let err = source(config(2, 10), &transport)
        .fetch(&query)
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::Status { status: 500, .. }));
}
