// tests/http_transport.rs
use std::time::Duration;

use arxiv_scan::ingest::config::FeedConfig;
use arxiv_scan::ingest::http::ReqwestTransport;
use arxiv_scan::ingest::types::Transport;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn body_and_status_are_passed_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .and(query_param("start", "0"))
        .and(header("user-agent", FeedConfig::default().user_agent.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string("<feed/>"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(&FeedConfig::default()).unwrap();
    let resp = transport
        .get(&format!("{}/api/query?start=0", server.uri()))
        .await
        .unwrap();
    assert!(resp.is_success());
    assert_eq!(resp.body, "<feed/>");
    assert_eq!(resp.retry_after, None);
}

#[tokio::test]
async fn unavailable_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(&FeedConfig::default()).unwrap();
    let resp = transport
        .get(&format!("{}/oai2", server.uri()))
        .await
        .unwrap();
    assert!(resp.is_unavailable());
    assert_eq!(resp.retry_after, Some(Duration::from_secs(7)));
}

