// src/ingest/normalize.rs
//! Protocol record shapes and their mapping into the canonical `Entry`.
//!
//! Decoders only collect strings; every required-field check and every date
//! conversion happens here, so a missing field surfaces as
//! `ScanError::Parse` instead of an empty entry.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::entry::Entry;
use crate::error::{Result, ScanError};

/// One `<entry>` of an Atom query response, as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub authors: Vec<String>,
    pub primary_category: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
}

/// One `<record>` of an OAI-PMH `ListRecords` response in raw-metadata format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OaiRecord {
    pub identifier: Option<String>,
    /// Space separated, primary first.
    pub categories: Option<String>,
    pub title: Option<String>,
    pub authors: Option<String>,
    pub abstract_text: Option<String>,
    /// One date per version, oldest first.
    pub version_dates: Vec<String>,
    /// Header carried `status="deleted"`; such records have no metadata.
    pub deleted: bool,
}

/// Archives whose OAI set lives under the `physics` group.
const PHYSICS_ARCHIVES: &[&str] = &[
    "astro-ph", "cond-mat", "gr-qc", "hep-ex", "hep-lat", "hep-ph", "hep-th", "math-ph",
    "nlin", "nucl-ex", "nucl-th", "physics", "quant-ph",
];

/// Taxonomy form of a category: `physics:astro-ph:EP` -> `astro-ph.EP`,
/// `physics:astro-ph` -> `astro-ph`, `math` -> `math`. Taxonomy input is returned as is.
pub fn taxonomy(category: &str) -> String {
    let parts: Vec<&str> = category.trim().split(':').collect();
    match parts.as_slice() {
        [archive] => archive.to_string(),
        [_, archive] => archive.to_string(),
        [_, archive, sub, ..] => format!("{archive}.{sub}"),
        [] => String::new(),
    }
}

/// OAI set spec of a category: `astro-ph.EP` -> `physics:astro-ph:EP`,
/// `math.AG` -> `math:math:AG`, `math` -> `math`. Set specs are returned as is.
pub fn set_spec(category: &str) -> String {
    let category = category.trim();
    if category.contains(':') {
        return category.to_string();
    }
    let (archive, sub) = match category.split_once('.') {
        Some((archive, sub)) => (archive, Some(sub)),
        None => (category, None),
    };
    let in_physics = PHYSICS_ARCHIVES.contains(&archive);
    match (in_physics, sub) {
        (true, Some(sub)) => format!("physics:{archive}:{sub}"),
        (true, None) => format!("physics:{archive}"),
        (false, Some(sub)) => format!("{archive}:{archive}:{sub}"),
        (false, None) => archive.to_string(),
    }
}

/// A record is a cross-list when its primary category does not start with
/// any of the requested categories.
pub fn is_cross_list<'a, I>(primary: &str, requested: I) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    !requested
        .into_iter()
        .any(|cat| primary.starts_with(taxonomy(cat).as_str()))
}

/// Replace line breaks and indentation with single spaces.
pub fn linebreak_fix(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `http://arxiv.org/abs/2403.01234v2` -> `2403.01234v2`, old-style ids keep their archive.
pub fn atom_id(raw: &str) -> String {
    let raw = raw.trim();
    match raw.split_once("/abs/") {
        Some((_, id)) => id.to_string(),
        None => raw.rsplit('/').next().unwrap_or(raw).to_string(),
    }
}

/// `oai:arXiv.org:2403.01234` -> `2403.01234`.
pub fn oai_id(raw: &str) -> String {
    let raw = raw.trim();
    raw.rsplit(':').next().unwrap_or(raw).to_string()
}

/// Split a free-text author list (`A, B and C`) into names in listing order.
pub fn split_authors(raw: &str) -> Vec<String> {
    linebreak_fix(raw)
        .split(',')
        .flat_map(|part| part.split(" and "))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Atom timestamps look like `2024-03-12T18:00:01Z`; the trailing `Z` is dropped
/// and the rest read as UTC.
pub fn parse_atom_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| ScanError::parse(format!("bad Atom timestamp '{raw}': {e}")))
}

/// OAI version dates are RFC 2822 (`Mon, 2 Apr 2007 19:18:42 GMT`).
pub fn parse_oai_date(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ScanError::parse(format!("bad OAI version date '{raw}': {e}")))
}

fn required<'a>(field: &'a Option<String>, name: &str, id: &str) -> Result<&'a str> {
    field
        .as_deref()
        .ok_or_else(|| ScanError::parse(format!("record {id}: missing <{name}>")))
}

pub fn normalize_atom(record: &AtomRecord) -> Result<Entry> {
    let raw_id = required(&record.id, "id", "?")?;
    let id = atom_id(raw_id);
    let title = required(&record.title, "title", &id)?;
    let summary = required(&record.summary, "summary", &id)?;
    let category = required(&record.primary_category, "primary_category", &id)?;
    let published = parse_atom_timestamp(required(&record.published, "published", &id)?)?;
    let updated = parse_atom_timestamp(required(&record.updated, "updated", &id)?)?;
    if record.authors.is_empty() {
        return Err(ScanError::parse(format!("record {id}: no <author> names")));
    }

    Ok(Entry::new(
        id,
        linebreak_fix(title),
        record.authors.iter().map(|a| linebreak_fix(a)).collect(),
        linebreak_fix(summary),
        category.trim(),
        published,
        updated,
    ))
}

pub fn normalize_oai(record: &OaiRecord) -> Result<Entry> {
    let raw_id = required(&record.identifier, "identifier", "?")?;
    let id = oai_id(raw_id);
    let categories = required(&record.categories, "categories", &id)?;
    let primary = categories
        .split_whitespace()
        .next()
        .ok_or_else(|| ScanError::parse(format!("record {id}: empty <categories>")))?;
    let title = required(&record.title, "title", &id)?;
    let authors = split_authors(required(&record.authors, "authors", &id)?);
    if authors.is_empty() {
        return Err(ScanError::parse(format!("record {id}: empty <authors>")));
    }
    let abstract_text = required(&record.abstract_text, "abstract", &id)?;

    let (first, last) = match (record.version_dates.first(), record.version_dates.last()) {
        (Some(first), Some(last)) => (parse_oai_date(first)?, parse_oai_date(last)?),
        _ => return Err(ScanError::parse(format!("record {id}: no <version> dates"))),
    };

    Ok(Entry::new(
        id,
        linebreak_fix(title),
        authors,
        linebreak_fix(abstract_text),
        primary,
        first,
        last,
    ))
}
