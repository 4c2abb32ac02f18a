// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod entry;
pub mod error;
pub mod ingest;
pub mod present;
pub mod ranking;
pub mod scoring;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::config::ScanConfig;
pub use crate::entry::{Entry, WeightTable};
pub use crate::error::{Result, ScanError};
pub use crate::ingest::types::FeedQuery;
pub use crate::ingest::FeedSource;
pub use crate::ranking::build_ranked_list;
pub use crate::scoring::Scorer;

use chrono::{DateTime, TimeZone};
use tracing::info;

/// Fetch, score and rank in one pass, as configured.
pub async fn scan<Z: TimeZone>(
    config: &ScanConfig,
    source: &FeedSource,
    now: &DateTime<Z>,
) -> Result<Vec<Entry>> {
    let query = config.feed_query(now)?;
    info!(cutoff = %query.cutoff, "getting submissions");

    let mut entries = source.fetch(&query).await?;
    let scorer = Scorer::new(
        &config.keywords,
        &config.authors,
        !config.options.ignore_abstract,
    )?;
    scorer.evaluate(&mut entries);

    Ok(build_ranked_list(
        entries,
        config.options.minimum_rating,
        config.options.reverse_list,
        config.options.length,
    ))
}
