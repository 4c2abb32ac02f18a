// src/config/mod.rs
//! User configuration: scan options plus keyword and author weight tables.
//!
//! Lookup order when no path is given:
//! 1) `$ARXIV_SCAN_CONF` (must exist when set)
//! 2) `~/.arxiv-scan.toml`
//! 3) `<config dir>/arxiv-scan/arxiv-scan.toml`

pub mod suggest;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};

use crate::entry::WeightTable;
use crate::error::{Result, ScanError};
use crate::ingest::config::{FeedConfig, Protocol};
use crate::ingest::types::FeedQuery;
use crate::window::resolve_cutoff;

pub use suggest::suggest_keywords;

pub const ENV_CONFIG_PATH: &str = "ARXIV_SCAN_CONF";
pub const HOME_CONFIG_NAME: &str = ".arxiv-scan.toml";
pub const APP_DIR_NAME: &str = "arxiv-scan";
pub const CONFIG_FILE_NAME: &str = "arxiv-scan.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    pub categories: Vec<String>,
    /// `new`, `recent`, a day count, `YYYY-MM` or `YYYY-MM-DD`.
    #[serde(deserialize_with = "string_or_int")]
    pub date: String,
    /// Maximum list length; negative means unlimited.
    pub length: i64,
    pub minimum_rating: i64,
    pub reverse_list: bool,
    pub only_resubmissions: bool,
    pub show_cross_lists: bool,
    pub ignore_abstract: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            categories: vec!["astro-ph.EP".to_string()],
            date: "new".to_string(),
            length: -1,
            minimum_rating: 10,
            reverse_list: false,
            only_resubmissions: false,
            show_cross_lists: true,
            ignore_abstract: false,
        }
    }
}

fn string_or_int<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Days(i64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Days(n) => n.to_string(),
    })
}

/// Command-line values that override the file when present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionOverrides {
    pub categories: Option<Vec<String>>,
    pub date: Option<String>,
    pub length: Option<i64>,
    pub minimum_rating: Option<i64>,
    pub reverse_list: Option<bool>,
    pub only_resubmissions: Option<bool>,
    pub show_cross_lists: Option<bool>,
    pub ignore_abstract: Option<bool>,
    pub protocol: Option<Protocol>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub options: ScanOptions,
    pub keywords: WeightTable,
    pub authors: WeightTable,
    pub feed: FeedConfig,
}

impl ScanConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: ScanConfig = toml::from_str(s)?;
        cfg.keywords = fold_keys(cfg.keywords);
        cfg.authors = fold_keys(cfg.authors);
        cfg.options.categories = clean_categories(cfg.options.categories);
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScanError::config(format!("reading config from {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from the first file found in the lookup order.
    pub fn load_default() -> Result<(Self, PathBuf)> {
        let path = find_config_file()?;
        let cfg = Self::load_from(&path)?;
        Ok((cfg, path))
    }

    /// Build a config from the two legacy JSON tables (term -> weight).
    pub fn from_legacy_json(keywords_path: &Path, authors_path: &Path) -> Result<Self> {
        let keywords: WeightTable = serde_json::from_str(&fs::read_to_string(keywords_path)?)?;
        let authors: WeightTable = serde_json::from_str(&fs::read_to_string(authors_path)?)?;
        Ok(Self {
            keywords: fold_keys(keywords),
            authors: fold_keys(authors),
            ..Self::default()
        })
    }

    /// Write as TOML. An existing file is only replaced when `overwrite`.
    pub fn write(&self, path: &Path, overwrite: bool) -> Result<()> {
        if path.exists() && !overwrite {
            return Err(ScanError::config(format!(
                "{} already exists, not overwriting",
                path.display()
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Add `weight` to a keyword, folding it like table keys on load.
    pub fn add_keyword(&mut self, term: &str, weight: i64) {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return;
        }
        *self.keywords.entry(term).or_insert(0) += weight;
    }

    pub fn write_default(path: &Path, overwrite: bool) -> Result<()> {
        Self::default().write(path, overwrite)
    }

    pub fn apply(&mut self, overrides: &OptionOverrides) {
        let o = &mut self.options;
        if let Some(categories) = &overrides.categories {
            o.categories = clean_categories(categories.clone());
        }
        if let Some(date) = &overrides.date {
            o.date = date.clone();
        }
        if let Some(v) = overrides.length {
            o.length = v;
        }
        if let Some(v) = overrides.minimum_rating {
            o.minimum_rating = v;
        }
        if let Some(v) = overrides.reverse_list {
            o.reverse_list = v;
        }
        if let Some(v) = overrides.only_resubmissions {
            o.only_resubmissions = v;
        }
        if let Some(v) = overrides.show_cross_lists {
            o.show_cross_lists = v;
        }
        if let Some(v) = overrides.ignore_abstract {
            o.ignore_abstract = v;
        }
        if let Some(p) = overrides.protocol {
            self.feed.protocol = p;
        }
    }

    /// Feed query for the configured categories, with the date option
    /// resolved against `now`.
    pub fn feed_query<Z: TimeZone>(&self, now: &DateTime<Z>) -> Result<FeedQuery> {
        if self.options.categories.is_empty() {
            return Err(ScanError::config("no categories configured"));
        }
        let cutoff = resolve_cutoff(&self.options.date, now)?;
        Ok(FeedQuery::new(self.options.categories.iter().cloned(), cutoff)
            .cross_lists(self.options.show_cross_lists)
            .resubmissions_only(self.options.only_resubmissions))
    }
}

/// Lower-case every key; keys that collide after folding add up.
fn fold_keys(table: WeightTable) -> WeightTable {
    let mut out = WeightTable::new();
    for (term, weight) in table {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            continue;
        }
        *out.entry(term).or_insert(0) += weight;
    }
    out
}

fn clean_categories(categories: Vec<String>) -> Vec<String> {
    categories
        .iter()
        .flat_map(|c| c.split(','))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Platform config location: `<config dir>/arxiv-scan/arxiv-scan.toml`.
pub fn default_config_location() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or_else(|| ScanError::config("no platform config directory"))
}

pub fn find_config_file() -> Result<PathBuf> {
    find_config_file_in(
        std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from),
        dirs::home_dir(),
        dirs::config_dir(),
    )
}

/// Lookup with the three locations passed in explicitly.
pub fn find_config_file_in(
    env_path: Option<PathBuf>,
    home: Option<PathBuf>,
    config_dir: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(p) = env_path {
        if p.is_file() {
            return Ok(p);
        }
        return Err(ScanError::config(format!(
            "{ENV_CONFIG_PATH} points to non-existent path {}",
            p.display()
        )));
    }
    let candidates = [
        home.map(|h| h.join(HOME_CONFIG_NAME)),
        config_dir.map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME)),
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|p| p.is_file())
        .ok_or_else(|| {
            ScanError::config(format!(
                "no config file found; set {ENV_CONFIG_PATH} or run with --default-config"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn keys_are_folded_and_collisions_add() {
        let cfg = ScanConfig::from_toml_str(
            r#"
[keywords]
Neutrino = 5
neutrino = 2
"" = 100

[authors]
"Janka" = 3
"#,
        )
        .unwrap();
        assert_eq!(cfg.keywords.get("neutrino"), Some(&7));
        assert_eq!(cfg.keywords.len(), 1);
        assert_eq!(cfg.authors.get("janka"), Some(&3));
    }

    #[test]
    fn added_keywords_fold_and_accumulate() {
        let mut cfg = ScanConfig::default();
        cfg.add_keyword(" Exoplanet ", 3);
        cfg.add_keyword("exoplanet", 1);
        cfg.add_keyword("  ", 9);
        assert_eq!(cfg.keywords.get("exoplanet"), Some(&4));
        assert_eq!(cfg.keywords.len(), 1);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let cfg = ScanConfig::from_toml_str("[options]\nminimum_rating = 3\n").unwrap();
        assert_eq!(cfg.options.minimum_rating, 3);
        assert_eq!(cfg.options.categories, vec!["astro-ph.EP"]);
        assert!(cfg.options.show_cross_lists);
        assert!(cfg.keywords.is_empty());
        assert_eq!(cfg.feed, FeedConfig::default());
    }

    #[test]
    fn date_accepts_integer_days() {
        let cfg = ScanConfig::from_toml_str("[options]\ndate = 3\n").unwrap();
        assert_eq!(cfg.options.date, "3");
    }

    #[test]
    fn comma_separated_categories_are_split() {
        let cfg =
            ScanConfig::from_toml_str("[options]\ncategories = [\"astro-ph.EP, astro-ph.SR\"]\n")
                .unwrap();
        assert_eq!(cfg.options.categories, vec!["astro-ph.EP", "astro-ph.SR"]);
    }

    #[test]
    fn overrides_only_touch_given_fields() {
        let mut cfg = ScanConfig::default();
        cfg.apply(&OptionOverrides {
            length: Some(5),
            show_cross_lists: Some(false),
            protocol: Some(Protocol::Oai),
            ..OptionOverrides::default()
        });
        assert_eq!(cfg.options.length, 5);
        assert!(!cfg.options.show_cross_lists);
        assert_eq!(cfg.options.minimum_rating, 10);
        assert_eq!(cfg.feed.protocol, Protocol::Oai);
    }

    #[test]
    fn feed_query_carries_flags() {
        let mut cfg = ScanConfig::default();
        cfg.options.date = "2024-03-01".into();
        cfg.options.only_resubmissions = true;
        cfg.options.show_cross_lists = false;
        let now = Utc::now();
        let q = cfg.feed_query(&now).unwrap();
        assert!(q.resubmissions_only);
        assert!(!q.include_cross_lists);
        assert!(q.categories.contains("astro-ph.EP"));

        cfg.options.categories.clear();
        assert!(matches!(cfg.feed_query(&now), Err(ScanError::Config(_))));
    }
}
