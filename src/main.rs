//! arxiv-scan — command-line entrypoint.
//! Loads the user config, fetches the announcement feed, scores and prints the digest.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use arxiv_scan::config::{default_config_location, OptionOverrides, ScanConfig};
use arxiv_scan::ingest::config::Protocol;
use arxiv_scan::present::render_entries;
use arxiv_scan::FeedSource;

#[derive(Parser, Debug)]
#[command(
    name = "arxiv-scan",
    version,
    about = "Rank new arXiv submissions by keyword and author interest"
)]
struct Cli {
    /// Path to configuration file (defaults: $ARXIV_SCAN_CONF, ~/.arxiv-scan.toml, config dir)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write default config to the default location (or PATH) and exit
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    default_config: Option<Option<PathBuf>>,

    /// Convert legacy JSON keyword and author tables into a config file and exit
    #[arg(long, num_args = 2, value_names = ["KEYWORDS", "AUTHORS"])]
    config_convert: Option<Vec<PathBuf>>,

    /// "new", "recent", number of days in the past, "YYYY-MM" or "YYYY-MM-DD"
    #[arg(short, long)]
    date: Option<String>,

    /// Length of result list, all is -1
    #[arg(short = 'l', long = "len", allow_hyphen_values = true)]
    length: Option<i64>,

    /// Minimum rating for result list
    #[arg(short = 'v', long, allow_hyphen_values = true)]
    rating: Option<i64>,

    /// arXiv categories to scan, comma separated
    #[arg(short, long, value_delimiter = ',')]
    categories: Option<Vec<String>>,

    /// Reverse list (lowest ranked paper on top)
    #[arg(long)]
    reverse: bool,

    /// Sort and gate by latest update instead of first submission
    #[arg(long)]
    only_resubmissions: bool,

    /// Drop cross-listed papers
    #[arg(long)]
    ignore_cross_lists: bool,

    /// Ignore abstract in rating
    #[arg(long)]
    ignore_abstract: bool,

    /// Feed protocol: atom or oai
    #[arg(long)]
    protocol: Option<Protocol>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "warn", value_parser = ["warn", "info", "debug"])]
    log: String,
}

impl Cli {
    fn overrides(&self) -> OptionOverrides {
        OptionOverrides {
            categories: self.categories.clone(),
            date: self.date.clone(),
            length: self.length,
            minimum_rating: self.rating,
            reverse_list: self.reverse.then_some(true),
            only_resubmissions: self.only_resubmissions.then_some(true),
            show_cross_lists: self.ignore_cross_lists.then_some(false),
            ignore_abstract: self.ignore_abstract.then_some(true),
            protocol: self.protocol,
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn target_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(p) => Ok(p),
        None => Ok(default_config_location()?),
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if let Some(path) = cli.default_config.clone() {
        let path = target_path(path)?;
        ScanConfig::write_default(&path, false)
            .with_context(|| format!("writing default config to {}", path.display()))?;
        println!("Written default config to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(paths) = cli.config_convert.as_deref() {
        let [keywords, authors] = paths else {
            anyhow::bail!("--config-convert needs KEYWORDS and AUTHORS paths");
        };
        let converted = ScanConfig::from_legacy_json(keywords, authors)
            .context("reading legacy keyword/author tables")?;
        let path = target_path(cli.config.clone())?;
        converted
            .write(&path, false)
            .with_context(|| format!("writing converted config to {}", path.display()))?;
        println!("Converted legacy configuration to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let (mut config, path) = match &cli.config {
        Some(p) => (ScanConfig::load_from(p)?, p.clone()),
        None => ScanConfig::load_default()?,
    };
    tracing::info!(path = %path.display(), "configuration loaded");
    config.apply(&cli.overrides());

    let source = FeedSource::from_config(config.feed.clone())?;
    let now = chrono::Local::now();

    match arxiv_scan::scan(&config, &source, &now).await {
        Ok(entries) => {
            print!("{}", render_entries(&entries));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_feed_error() => {
            eprintln!("Error while fetching feed:");
            eprintln!("{e}");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env if present (e.g. ARXIV_SCAN_CONF, RUST_LOG).
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(&cli.log);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
