// src/ingest/providers/atom.rs
//! Atom query strategy: one OR-combined query, paged by `start` offset,
//! newest first, stopping at the first record older than the cutoff.

use metrics::counter;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use reqwest::Url;
use tokio::time::sleep;

use crate::entry::Entry;
use crate::error::{Result, ScanError};
use crate::ingest::config::{FeedConfig, Namespaces};
use crate::ingest::normalize::{is_cross_list, normalize_atom, taxonomy, AtomRecord};
use crate::ingest::retry::RetryState;
use crate::ingest::types::{FeedQuery, Transport};

#[derive(Debug, Clone, Copy)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    Updated,
    AuthorName,
}

/// Decode one Atom response page into raw records.
///
/// The query API reports request errors as a single entry whose id points at
/// `/api/errors`; that entry becomes `ScanError::Api`.
pub fn decode_atom(xml: &str, ns: &Namespaces) -> Result<Vec<AtomRecord>> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);
    let atom = ns.atom.as_bytes();
    let arxiv = ns.arxiv.as_bytes();

    let mut records = Vec::new();
    let mut current: Option<AtomRecord> = None;
    let mut field: Option<Field> = None;
    let mut in_author = false;
    let mut text = String::new();

    loop {
        let (resolved, event) = reader.read_resolved_event()?;
        let in_atom = matches!(resolved, ResolveResult::Bound(Namespace(n)) if n == atom);
        let in_arxiv = matches!(resolved, ResolveResult::Bound(Namespace(n)) if n == arxiv);

        match event {
            Event::Start(e) if in_atom => {
                text.clear();
                match e.local_name().as_ref() {
                    b"entry" => current = Some(AtomRecord::default()),
                    b"author" => in_author = true,
                    _ if current.is_none() => {}
                    b"id" => field = Some(Field::Id),
                    b"title" => field = Some(Field::Title),
                    b"summary" => field = Some(Field::Summary),
                    b"published" => field = Some(Field::Published),
                    b"updated" => field = Some(Field::Updated),
                    b"name" if in_author => field = Some(Field::AuthorName),
                    _ => {}
                }
            }
            Event::Start(e) | Event::Empty(e)
                if in_arxiv && e.local_name().as_ref() == b"primary_category" =>
            {
                if let (Some(record), Some(term)) = (current.as_mut(), e.try_get_attribute("term")?) {
                    record.primary_category = Some(term.unescape_value()?.into_owned());
                }
            }
            Event::Text(e) if field.is_some() => text.push_str(&e.unescape()?),
            Event::CData(e) if field.is_some() => text.push_str(&String::from_utf8_lossy(&e)),
            Event::End(e) if in_atom => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(record) = current.take() {
                        if record.id.as_deref().is_some_and(|id| id.contains("/api/errors")) {
                            let message = record.summary.unwrap_or_default();
                            return Err(ScanError::Api(message));
                        }
                        records.push(record);
                    }
                }
                b"author" => in_author = false,
                _ => {
                    if let (Some(f), Some(record)) = (field.take(), current.as_mut()) {
                        let value = std::mem::take(&mut text);
                        match f {
                            Field::Id => record.id = Some(value),
                            Field::Title => record.title = Some(value),
                            Field::Summary => record.summary = Some(value),
                            Field::Published => record.published = Some(value),
                            Field::Updated => record.updated = Some(value),
                            Field::AuthorName => record.authors.push(value),
                        }
                    }
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(records)
}

/// URL of one result page.
pub fn page_url(config: &FeedConfig, query: &FeedQuery, start: usize) -> Result<Url> {
    let search = query
        .categories
        .iter()
        .map(|cat| format!("cat:{}", taxonomy(cat)))
        .collect::<Vec<_>>()
        .join(" OR ");
    let sort_by = if query.resubmissions_only {
        "lastUpdatedDate"
    } else {
        "submittedDate"
    };
    Url::parse_with_params(
        &config.atom.endpoint,
        &[
            ("search_query", search),
            ("sortBy", sort_by.to_string()),
            ("sortOrder", "descending".to_string()),
            ("start", start.to_string()),
            ("max_results", config.atom.page_size.to_string()),
        ],
    )
    .map_err(|e| ScanError::config(format!("bad Atom endpoint '{}': {e}", config.atom.endpoint)))
}

/// Page through the query until the cutoff is reached.
///
/// Empty pages, connection resets and 503s are transient: the delay doubles
/// and the same offset is requested again. Every request is followed by a
/// pause of the current delay.
pub async fn fetch(
    transport: &dyn Transport,
    config: &FeedConfig,
    query: &FeedQuery,
) -> Result<Vec<Entry>> {
    let page_size = config.atom.page_size.max(1);
    let mut retry = RetryState::new(config.atom.backoff());
    let mut start = 0usize;
    let mut entries = Vec::new();

    loop {
        let url = page_url(config, query, start)?;
        tracing::debug!(
            target: "ingest",
            url = %url,
            errors = retry.errors(),
            delay_ms = retry.delay().as_millis() as u64,
            "requesting Atom page"
        );
        counter!("ingest_requests_total").increment(1);

        let response = match transport.get(url.as_str()).await {
            Ok(response) => response,
            Err(e) if e.is_transient() => {
                tracing::warn!(target: "ingest", error = %e, start, "transient transport fault");
                counter!("ingest_transient_errors_total").increment(1);
                let wait = retry.record_failure()?;
                sleep(wait).await;
                continue;
            }
            Err(e) => return Err(ScanError::transport(e)),
        };

        if response.is_unavailable() {
            tracing::warn!(target: "ingest", start, retry_after = ?response.retry_after, "service unavailable");
            counter!("ingest_transient_errors_total").increment(1);
            let backoff = retry.record_failure()?;
            sleep(response.retry_after.unwrap_or(backoff)).await;
            continue;
        }
        if !response.is_success() {
            return Err(ScanError::Status {
                status: response.status,
                url: url.to_string(),
            });
        }

        let records = decode_atom(&response.body, &config.namespaces)?;
        if records.is_empty() {
            tracing::warn!(target: "ingest", start, "empty page, retrying same offset");
            counter!("ingest_transient_errors_total").increment(1);
            let wait = retry.record_failure()?;
            sleep(wait).await;
            continue;
        }

        let received = records.len();
        let mut reached_cutoff = false;
        for record in &records {
            let entry = normalize_atom(record)?;
            let gate = if query.resubmissions_only {
                entry.date_updated
            } else {
                entry.date_submitted
            };
            if gate < query.cutoff {
                reached_cutoff = true;
                break;
            }
            if !query.include_cross_lists && is_cross_list(&entry.category, &query.categories) {
                counter!("ingest_filtered_total").increment(1);
                continue;
            }
            entries.push(entry);
        }
        if reached_cutoff {
            break;
        }

        start += received;
        let wait = if received < page_size {
            tracing::warn!(target: "ingest", received, page_size, "short page");
            counter!("ingest_transient_errors_total").increment(1);
            retry.record_failure()?
        } else {
            retry.record_success()
        };
        sleep(wait).await;
    }

    Ok(entries)
}
