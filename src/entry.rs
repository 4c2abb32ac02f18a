// src/entry.rs
//! Canonical paper announcement record shared by both feed protocols.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Lower-cased term -> integer weight. Negative weights are valid.
pub type WeightTable = BTreeMap<String, i64>;

/// One paper announcement, normalized from either protocol.
///
/// Built once by the normalizer, scored once, then read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub category: String,
    pub date_submitted: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,

    /// Character offsets into `title` covered by a keyword hit.
    pub title_marks: BTreeSet<usize>,
    /// Parallel to `authors`.
    pub author_marks: Vec<bool>,
    pub rating: i64,
    pub detailed_ratings: BTreeMap<String, i64>,

    #[serde(skip)]
    scored: bool,
}

impl Entry {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        authors: Vec<String>,
        abstract_text: impl Into<String>,
        category: impl Into<String>,
        date_submitted: DateTime<Utc>,
        date_updated: DateTime<Utc>,
    ) -> Self {
        let author_marks = vec![false; authors.len()];
        Self {
            id: id.into(),
            title: title.into(),
            abstract_text: abstract_text.into(),
            authors,
            category: category.into(),
            date_submitted,
            // updated never precedes submitted
            date_updated: date_updated.max(date_submitted),
            title_marks: BTreeSet::new(),
            author_marks,
            rating: 0,
            detailed_ratings: BTreeMap::new(),
            scored: false,
        }
    }

    pub fn is_scored(&self) -> bool {
        self.scored
    }

    pub(crate) fn mark_scored(&mut self) {
        self.scored = true;
    }

    /// Mark every character position in `start..end` of the title.
    pub fn mark_title_span(&mut self, start: usize, end: usize) {
        let len = self.title.chars().count();
        self.title_marks.extend(start..end.min(len));
    }

    pub fn mark_author(&mut self, index: usize) {
        if let Some(mark) = self.author_marks.get_mut(index) {
            *mark = true;
        }
    }

    /// Add `points` to the bucket for `term` and keep `rating` in sync.
    pub fn add_rating(&mut self, term: &str, points: i64) {
        *self.detailed_ratings.entry(term.to_string()).or_insert(0) += points;
        self.rating = self.detailed_ratings.values().sum();
    }

    /// Link to the abstract page.
    pub fn abs_url(&self) -> String {
        format!("https://arxiv.org/abs/{}", self.id)
    }
}
