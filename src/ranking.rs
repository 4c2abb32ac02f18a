// src/ranking.rs
use crate::entry::Entry;

/// Filter, order and cap scored entries.
///
/// Keeps entries with `rating >= min_rating`, sorts them by rating
/// (descending, or ascending when `reverse`) with a stable sort so equal
/// ratings keep their feed order, then truncates to `length` entries.
/// A negative `length` keeps everything.
pub fn build_ranked_list(entries: Vec<Entry>, min_rating: i64, reverse: bool, length: i64) -> Vec<Entry> {
    let mut ranked: Vec<Entry> = entries
        .into_iter()
        .filter(|e| e.rating >= min_rating)
        .collect();

    if reverse {
        ranked.sort_by(|a, b| a.rating.cmp(&b.rating));
    } else {
        ranked.sort_by(|a, b| b.rating.cmp(&a.rating));
    }

    if let Ok(length) = usize::try_from(length) {
        ranked.truncate(length);
    }
    ranked
}
