//! Suggests keywords from an arbitrary text file and, with `--rate`, asks for
//! a weight per candidate and writes the accepted ones to the config file.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use arxiv_scan::config::{default_config_location, find_config_file, suggest_keywords};
use arxiv_scan::ScanConfig;

#[derive(Parser, Debug)]
#[command(name = "arxiv-keywords", about = "Extract keyword candidates from a text file")]
struct Cli {
    /// Text file to scan for keywords
    file: PathBuf,

    /// Config file to read known keywords from and write new ones to
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of candidates to offer
    #[arg(short, default_value_t = 200)]
    n: usize,

    /// Rate each candidate interactively and save the result
    #[arg(long)]
    rate: bool,
}

fn load_config(explicit: Option<PathBuf>) -> anyhow::Result<(ScanConfig, PathBuf)> {
    let path = match explicit {
        Some(p) => p,
        None => find_config_file().or_else(|_| default_config_location())?,
    };
    if path.is_file() {
        Ok((ScanConfig::load_from(&path)?, path))
    } else {
        Ok((ScanConfig::default(), path))
    }
}

/// Returns the number of keywords added.
fn rate<R: BufRead, W: Write>(
    candidates: &[(String, usize)],
    config: &mut ScanConfig,
    mut input: R,
    mut out: W,
) -> io::Result<usize> {
    writeln!(
        out,
        "Give each suggested keyword a rating, press enter to reject it, \"c\" to conclude."
    )?;
    let mut added = 0;
    for (word, count) in candidates {
        loop {
            write!(out, "{word} ({count}): ")?;
            out.flush()?;
            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Ok(added);
            }
            let answer = line.trim();
            if answer.eq_ignore_ascii_case("c") {
                return Ok(added);
            }
            if answer.is_empty() {
                break;
            }
            match answer.parse::<i64>() {
                Ok(weight) => {
                    config.add_keyword(word, weight);
                    added += 1;
                    break;
                }
                Err(_) => writeln!(out, "rating must be an integer.")?,
            }
        }
    }
    Ok(added)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("reading {}", cli.file.display()))?;
    let (mut config, path) = load_config(cli.config)?;
    let candidates = suggest_keywords(&text, cli.n, &config)?;

    if !cli.rate {
        println!("{:>12} {:>6}", "WORD", "COUNT");
        for (word, count) in &candidates {
            println!("{word:>12} {count:>6}");
        }
        return Ok(());
    }

    let stdin = io::stdin();
    let added = rate(&candidates, &mut config, stdin.lock(), io::stdout())?;
    save(&config, &path)?;
    println!("Added {added} keywords, written to {}", path.display());
    Ok(())
}

fn save(config: &ScanConfig, path: &Path) -> anyhow::Result<()> {
    config
        .write(path, true)
        .with_context(|| format!("writing config to {}", path.display()))
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
