// src/scoring.rs
//! Keyword and author scoring.
//!
//! Keywords count every non-overlapping occurrence in the title (and
//! optionally the abstract). Author rules are whole-word matches and pay out
//! once per entry, on the first matching author in listing order.

use regex::Regex;
use tracing::{debug, warn};

use crate::entry::{Entry, WeightTable};
use crate::error::Result;

#[derive(Debug, Clone)]
struct KeywordRule {
    term: String,
    folded: Vec<char>,
    weight: i64,
}

#[derive(Debug, Clone)]
struct AuthorRule {
    term: String,
    pattern: Regex,
    weight: i64,
}

/// Compiled keyword and author tables.
#[derive(Debug, Clone)]
pub struct Scorer {
    keywords: Vec<KeywordRule>,
    authors: Vec<AuthorRule>,
    include_abstract: bool,
}

impl Scorer {
    /// Compile both tables. Keys are case-folded; empty keys are ignored.
    pub fn new(keywords: &WeightTable, authors: &WeightTable, include_abstract: bool) -> Result<Self> {
        let mut keyword_rules: Vec<KeywordRule> = keywords
            .iter()
            .filter(|(term, _)| !term.trim().is_empty())
            .map(|(term, &weight)| {
                let term = term.trim().to_lowercase();
                KeywordRule {
                    folded: fold(&term),
                    term,
                    weight,
                }
            })
            .collect();
        keyword_rules.sort_by(|a, b| a.term.cmp(&b.term));

        let mut author_rules = Vec::with_capacity(authors.len());
        for (term, &weight) in authors {
            let term = term.trim().to_lowercase();
            if term.is_empty() {
                continue;
            }
            let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&term)))?;
            author_rules.push(AuthorRule {
                term,
                pattern,
                weight,
            });
        }
        author_rules.sort_by(|a, b| a.term.cmp(&b.term));

        Ok(Self {
            keywords: keyword_rules,
            authors: author_rules,
            include_abstract,
        })
    }

    /// Score every entry that has not been scored yet.
    pub fn evaluate(&self, entries: &mut [Entry]) {
        let mut scored = 0usize;
        for entry in entries.iter_mut() {
            if self.score(entry) {
                scored += 1;
            }
        }
        debug!(target: "scoring", scored, total = entries.len(), "entries evaluated");
    }

    /// Score one entry. Returns false (and leaves it untouched) if it was
    /// already scored.
    pub fn score(&self, entry: &mut Entry) -> bool {
        if entry.is_scored() {
            warn!(target: "scoring", id = %entry.id, "entry already scored, skipping");
            return false;
        }

        let title = fold(&entry.title);
        let abstract_text = self.include_abstract.then(|| fold(&entry.abstract_text));

        for rule in &self.keywords {
            let spans = find_all(&title, &rule.folded);
            let mut hits = spans.len() as i64;
            for &(start, end) in &spans {
                entry.mark_title_span(start, end);
            }
            if let Some(text) = &abstract_text {
                hits += find_all(text, &rule.folded).len() as i64;
            }
            if hits > 0 {
                entry.add_rating(&rule.term, hits * rule.weight);
            }
        }

        for rule in &self.authors {
            let first = entry
                .authors
                .iter()
                .position(|name| rule.pattern.is_match(name));
            if let Some(index) = first {
                entry.mark_author(index);
                entry.add_rating(&rule.term, rule.weight);
            }
        }

        entry.mark_scored();
        debug!(target: "scoring", id = %entry.id, rating = entry.rating, "entry scored");
        true
    }
}

/// Score `entries` against the two tables. Entries scored before are skipped.
pub fn evaluate_entries(
    entries: &mut [Entry],
    keywords: &WeightTable,
    authors: &WeightTable,
    include_abstract: bool,
) -> Result<()> {
    Scorer::new(keywords, authors, include_abstract)?.evaluate(entries);
    Ok(())
}

/// Lower-case per character, keeping one output char per input char so that
/// offsets into the folded text are offsets into the original.
fn fold(text: &str) -> Vec<char> {
    text.chars()
        .map(|c| {
            let mut lower = c.to_lowercase();
            match (lower.next(), lower.next()) {
                (Some(l), None) => l,
                _ => c,
            }
        })
        .collect()
}

/// Non-overlapping occurrences of `needle`, scanned left to right, as
/// `(start, end)` character ranges.
fn find_all(haystack: &[char], needle: &[char]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    if needle.is_empty() || needle.len() > haystack.len() {
        return spans;
    }
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        if haystack[i..i + needle.len()] == *needle {
            spans.push((i, i + needle.len()));
            i += needle.len();
        } else {
            i += 1;
        }
    }
    spans
}
