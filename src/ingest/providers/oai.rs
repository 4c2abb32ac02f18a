// src/ingest/providers/oai.rs
//! OAI-PMH harvest strategy: one `ListRecords` harvest per category,
//! continued through resumption tokens, records filtered client side.

use std::collections::HashSet;
use std::time::Duration;

use metrics::counter;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use reqwest::Url;
use tokio::time::sleep;

use crate::entry::Entry;
use crate::error::{Result, ScanError};
use crate::ingest::config::{FeedConfig, Namespaces};
use crate::ingest::normalize::{is_cross_list, normalize_oai, set_spec, OaiRecord};
use crate::ingest::retry::RetryState;
use crate::ingest::types::{FeedQuery, Transport};

/// One decoded `ListRecords` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OaiPage {
    /// Every record in document order, deleted ones included.
    pub records: Vec<OaiRecord>,
    /// Raw resumption token; `None` (or an empty element) ends the harvest.
    pub resumption_token: Option<String>,
}

/// Continuation cursor: `<fragment>|<offset>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumptionToken {
    pub raw: String,
    pub fragment: String,
    /// Position of the first record of the next page.
    pub offset: usize,
}

pub fn parse_resumption_token(raw: &str) -> Result<ResumptionToken> {
    let raw = raw.trim();
    let (fragment, offset) = raw
        .rsplit_once('|')
        .ok_or_else(|| ScanError::parse(format!("resumption token without offset: '{raw}'")))?;
    let offset = offset
        .parse::<usize>()
        .map_err(|_| ScanError::parse(format!("resumption token offset is not a number: '{raw}'")))?;
    if fragment.is_empty() {
        return Err(ScanError::parse(format!("resumption token without fragment: '{raw}'")));
    }
    Ok(ResumptionToken {
        raw: raw.to_string(),
        fragment: fragment.to_string(),
        offset,
    })
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Identifier,
    Title,
    Authors,
    Categories,
    Abstract,
    VersionDate,
    Token,
    Error,
}

/// Decode one `ListRecords` response.
///
/// `noRecordsMatch` yields an empty page; any other OAI error code is a
/// parse error since it means the request itself was malformed.
pub fn decode_oai(xml: &str, ns: &Namespaces) -> Result<OaiPage> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);
    let oai = ns.oai.as_bytes();
    let raw = ns.arxiv_raw.as_bytes();

    let mut page = OaiPage::default();
    let mut current: Option<OaiRecord> = None;
    let mut field: Option<Field> = None;
    let mut in_header = false;
    let mut in_version = false;
    let mut error_code = String::new();
    let mut text = String::new();

    loop {
        let (resolved, event) = reader.read_resolved_event()?;
        let in_oai = matches!(resolved, ResolveResult::Bound(Namespace(n)) if n == oai);
        let in_raw = matches!(resolved, ResolveResult::Bound(Namespace(n)) if n == raw);

        match event {
            Event::Start(e) if in_oai => {
                text.clear();
                match e.local_name().as_ref() {
                    b"record" => current = Some(OaiRecord::default()),
                    b"header" => {
                        in_header = true;
                        if let (Some(record), Some(status)) =
                            (current.as_mut(), e.try_get_attribute("status")?)
                        {
                            record.deleted = status.unescape_value()? == "deleted";
                        }
                    }
                    b"identifier" if in_header => field = Some(Field::Identifier),
                    b"resumptionToken" => field = Some(Field::Token),
                    b"error" => {
                        error_code = match e.try_get_attribute("code")? {
                            Some(code) => code.unescape_value()?.into_owned(),
                            None => "unknown".to_string(),
                        };
                        field = Some(Field::Error);
                    }
                    _ => {}
                }
            }
            Event::Empty(e) if in_oai => match e.local_name().as_ref() {
                b"error" => {
                    let code = match e.try_get_attribute("code")? {
                        Some(code) => code.unescape_value()?.into_owned(),
                        None => "unknown".to_string(),
                    };
                    check_error(&code, "")?;
                }
                // an empty token element marks the final page
                b"resumptionToken" => page.resumption_token = None,
                _ => {}
            },
            Event::Start(e) if in_raw && current.is_some() => {
                text.clear();
                match e.local_name().as_ref() {
                    b"version" => in_version = true,
                    b"date" if in_version => field = Some(Field::VersionDate),
                    b"title" => field = Some(Field::Title),
                    b"authors" => field = Some(Field::Authors),
                    b"categories" => field = Some(Field::Categories),
                    b"abstract" => field = Some(Field::Abstract),
                    _ => {}
                }
            }
            Event::Text(e) if field.is_some() => text.push_str(&e.unescape()?),
            Event::CData(e) if field.is_some() => text.push_str(&String::from_utf8_lossy(&e)),
            Event::End(e) if in_oai => match e.local_name().as_ref() {
                b"record" => {
                    if let Some(record) = current.take() {
                        page.records.push(record);
                    }
                }
                b"header" => in_header = false,
                b"identifier" | b"resumptionToken" | b"error" => {
                    let value = std::mem::take(&mut text);
                    match field.take() {
                        Some(Field::Identifier) => {
                            if let Some(record) = current.as_mut() {
                                record.identifier = Some(value);
                            }
                        }
                        Some(Field::Token) => {
                            let value = value.trim();
                            page.resumption_token =
                                (!value.is_empty()).then(|| value.to_string());
                        }
                        Some(Field::Error) => check_error(&error_code, &value)?,
                        _ => {}
                    }
                }
                _ => {}
            },
            Event::End(e) if in_raw => {
                if e.local_name().as_ref() == b"version" {
                    in_version = false;
                }
                if let (Some(f), Some(record)) = (field.take(), current.as_mut()) {
                    let value = std::mem::take(&mut text);
                    match f {
                        Field::Title => record.title = Some(value),
                        Field::Authors => record.authors = Some(value),
                        Field::Categories => record.categories = Some(value),
                        Field::Abstract => record.abstract_text = Some(value),
                        Field::VersionDate => record.version_dates.push(value),
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(page)
}

fn check_error(code: &str, message: &str) -> Result<()> {
    if code == "noRecordsMatch" {
        return Ok(());
    }
    Err(ScanError::parse(format!("OAI error {code}: {}", message.trim())))
}

/// First request of a category harvest.
pub fn list_url(config: &FeedConfig, query: &FeedQuery, category: &str) -> Result<Url> {
    let from = query.cutoff.date_naive().format("%Y-%m-%d").to_string();
    Url::parse_with_params(
        &config.oai.endpoint,
        &[
            ("verb", "ListRecords".to_string()),
            ("metadataPrefix", config.oai.metadata_prefix.clone()),
            ("from", from),
            ("set", set_spec(category)),
        ],
    )
    .map_err(|e| ScanError::config(format!("bad OAI endpoint '{}': {e}", config.oai.endpoint)))
}

/// Continuation request for a resumption token.
pub fn resume_url(config: &FeedConfig, token: &ResumptionToken) -> Result<Url> {
    Url::parse_with_params(
        &config.oai.endpoint,
        &[("verb", "ListRecords"), ("resumptionToken", token.raw.as_str())],
    )
    .map_err(|e| ScanError::config(format!("bad OAI endpoint '{}': {e}", config.oai.endpoint)))
}

/// Harvest every requested category in turn.
///
/// A 503 waits exactly its `Retry-After` and repeats the same request; each
/// 503 counts against the error budget. Any other failure is fatal.
pub async fn fetch(
    transport: &dyn Transport,
    config: &FeedConfig,
    query: &FeedQuery,
) -> Result<Vec<Entry>> {
    let politeness = Duration::from_millis(config.oai.request_delay_ms);
    let fallback = Duration::from_secs(config.oai.fallback_retry_after_secs);
    let mut retry = RetryState::with_budget(config.oai.max_errors);
    let mut seen: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();
    let mut pause = false;

    for category in &query.categories {
        let mut url = list_url(config, query, category)?;
        // absolute position of the next unseen record, and of this page's first record
        let mut consumed = 0usize;
        let mut page_start = 0usize;

        loop {
            if pause {
                sleep(politeness).await;
            }
            pause = false;

            tracing::debug!(target: "ingest", url = %url, errors = retry.errors(), "requesting OAI page");
            counter!("ingest_requests_total").increment(1);
            let response = transport
                .get(url.as_str())
                .await
                .map_err(ScanError::transport)?;

            if response.is_unavailable() {
                let wait = match response.retry_after {
                    Some(wait) => wait,
                    None => {
                        tracing::warn!(target: "ingest", fallback_secs = fallback.as_secs(), "503 without Retry-After");
                        fallback
                    }
                };
                tracing::warn!(target: "ingest", category = %category, wait_secs = wait.as_secs(), "service unavailable");
                counter!("ingest_transient_errors_total").increment(1);
                sleep(retry.record_dictated(wait)?).await;
                continue;
            }
            if !response.is_success() {
                return Err(ScanError::Status {
                    status: response.status,
                    url: url.to_string(),
                });
            }
            pause = true;

            let page = decode_oai(&response.body, &config.namespaces)?;
            let skip = consumed.saturating_sub(page_start);
            if skip > 0 {
                tracing::debug!(target: "ingest", skip, "skipping records already seen");
            }

            for record in page.records.iter().skip(skip) {
                if record.deleted {
                    continue;
                }
                let entry = normalize_oai(record)?;
                let gate = if query.resubmissions_only {
                    entry.date_updated
                } else {
                    entry.date_submitted
                };
                let cross_list = is_cross_list(&entry.category, std::iter::once(category));
                if gate < query.cutoff || (cross_list && !query.include_cross_lists) {
                    counter!("ingest_filtered_total").increment(1);
                    continue;
                }
                if !seen.insert(entry.id.clone()) {
                    continue;
                }
                entries.push(entry);
            }
            consumed = consumed.max(page_start + page.records.len());

            match page.resumption_token {
                Some(raw) => {
                    let token = parse_resumption_token(&raw)?;
                    page_start = token.offset;
                    url = resume_url(config, &token)?;
                }
                None => break,
            }
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record_xml(id: &str, categories: &str, dates: &[&str]) -> String {
        let versions: String = dates
            .iter()
            .enumerate()
            .map(|(i, d)| format!("<version version=\"v{}\"><date>{d}</date><size>1kb</size></version>", i + 1))
            .collect();
        format!(
            r#"<record><header><identifier>oai:arXiv.org:{id}</identifier><datestamp>2024-03-12</datestamp></header>
<metadata><arXivRaw xmlns="http://arxiv.org/OAI/arXivRaw/"><id>{id}</id>{versions}
<title>Title of {id}</title><authors>A. Janka and B. Author</authors>
<categories>{categories}</categories><abstract>Abstract of {id}.</abstract></arXivRaw></metadata></record>"#
        )
    }

    fn envelope(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/"><responseDate>2024-03-13T10:00:00Z</responseDate>
<request verb="ListRecords">https://export.arxiv.org/oai2</request>{body}</OAI-PMH>"#
        )
    }

    #[test]
    fn decodes_records_and_token() {
        let xml = envelope(&format!(
            "<ListRecords>{}{}<resumptionToken cursor=\"0\" completeListSize=\"5\">7139349|2</resumptionToken></ListRecords>",
            record_xml("2403.00001", "astro-ph.EP astro-ph.SR", &["Tue, 12 Mar 2024 18:00:00 GMT"]),
            record_xml(
                "2403.00002",
                "astro-ph.SR",
                &["Mon, 4 Mar 2024 09:00:00 GMT", "Tue, 12 Mar 2024 10:00:00 GMT"]
            ),
        ));
        let page = decode_oai(&xml, &Namespaces::default()).unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.resumption_token.as_deref(), Some("7139349|2"));
        let r = &page.records[1];
        assert_eq!(r.identifier.as_deref(), Some("oai:arXiv.org:2403.00002"));
        assert_eq!(r.version_dates.len(), 2);
        assert_eq!(r.categories.as_deref(), Some("astro-ph.SR"));
        assert!(!r.deleted);
    }

    #[test]
    fn empty_token_element_ends_harvest() {
        let xml = envelope(&format!(
            "<ListRecords>{}<resumptionToken cursor=\"1000\" completeListSize=\"1001\"/></ListRecords>",
            record_xml("2403.00001", "astro-ph.EP", &["Tue, 12 Mar 2024 18:00:00 GMT"])
        ));
        let page = decode_oai(&xml, &Namespaces::default()).unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.resumption_token, None);
    }

    #[test]
    fn deleted_records_are_flagged() {
        let xml = envelope(
            r#"<ListRecords><record><header status="deleted"><identifier>oai:arXiv.org:2403.00009</identifier></header></record></ListRecords>"#,
        );
        let page = decode_oai(&xml, &Namespaces::default()).unwrap();
        assert_eq!(page.records.len(), 1);
        assert!(page.records[0].deleted);
    }

    #[test]
    fn no_records_match_is_empty_not_an_error() {
        let xml = envelope(r#"<error code="noRecordsMatch">No records match</error>"#);
        let page = decode_oai(&xml, &Namespaces::default()).unwrap();
        assert!(page.records.is_empty());
        assert!(page.resumption_token.is_none());
    }

    #[test]
    fn other_oai_errors_are_parse_errors() {
        let xml = envelope(r#"<error code="badArgument">Illegal set</error>"#);
        match decode_oai(&xml, &Namespaces::default()) {
            Err(ScanError::Parse(message)) => {
                assert!(message.contains("badArgument"));
                assert!(message.contains("Illegal set"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn resumption_tokens_split_into_fragment_and_offset() {
        let token = parse_resumption_token("7139349|1001").unwrap();
        assert_eq!(token.fragment, "7139349");
        assert_eq!(token.offset, 1001);
        assert!(parse_resumption_token("7139349").is_err());
        assert!(parse_resumption_token("7139349|abc").is_err());
        assert!(parse_resumption_token("|12").is_err());
    }

    #[test]
    fn urls_carry_set_and_token() {
        let cutoff = Utc.with_ymd_and_hms(2024, 3, 11, 18, 0, 0).unwrap();
        let query = FeedQuery::new(["astro-ph.EP"], cutoff);
        let config = FeedConfig::default();

        let url = list_url(&config, &query, "astro-ph.EP").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("verb".into(), "ListRecords".into()),
                ("metadataPrefix".into(), "arXivRaw".into()),
                ("from".into(), "2024-03-11".into()),
                ("set".into(), "physics:astro-ph:EP".into()),
            ]
        );

        let token = parse_resumption_token("7139349|1001").unwrap();
        let url = resume_url(&config, &token).unwrap();
        assert!(url.as_str().contains("resumptionToken=7139349%7C1001"));
    }
}
