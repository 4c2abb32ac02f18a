// src/config/suggest.rs
//! Keyword candidates from free text: the most frequent 4 to 12 letter
//! words that the keyword table does not already rate.

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::config::ScanConfig;
use crate::error::Result;

static WORD_RE: OnceCell<Regex> = OnceCell::new();

/// Lower-cased word counts, most frequent first, ties in alphabetical order.
pub fn count_words(text: &str) -> Result<Vec<(String, usize)>> {
    let word_re = WORD_RE.get_or_try_init(|| Regex::new(r"\b\w{4,12}\b"))?;
    let lowered = text.to_lowercase();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for m in word_re.find_iter(&lowered) {
        *counts.entry(m.as_str()).or_insert(0) += 1;
    }
    let mut out: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(w, c)| (w.to_string(), c))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(out)
}

/// Up to `n` candidates from `text` that are not keywords in `config` yet.
pub fn suggest_keywords(
    text: &str,
    n: usize,
    config: &ScanConfig,
) -> Result<Vec<(String, usize)>> {
    Ok(count_words(text)?
        .into_iter()
        .filter(|(word, _)| !config.keywords.contains_key(word))
        .take(n)
        .collect())
}
