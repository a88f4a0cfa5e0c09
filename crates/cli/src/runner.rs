// runner.rs
use anyhow::{Context, Result};
use osmatch_common::{MatchOptions, Matcher};
use osmatch_fingerprint::{parse_query, FingerprintDb};
use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::args::OutputFormat;
use crate::output::{print_check, print_results};

/// Environment variable naming the default database.
pub const DB_ENV: &str = "OSMATCH_DB";
/// Database looked up in the working directory when nothing else is given.
pub const DEFAULT_DB: &str = "nmap-os-db";

pub fn run_match(
    db: Option<PathBuf>,
    input: Option<PathBuf>,
    top: Option<usize>,
    output_format: OutputFormat,
) -> Result<()> {
    let options = match_options(top);
    let db = load_db(&resolve_db_path(db))?;

    let text = match input {
        Some(path) => fs::read_to_string(&path)
            .with_context(|| format!("Failed to read query from {}", path.display()))?,
        None => read_stdin()?,
    };
    let query = parse_query(&text).context("Invalid query fingerprint")?;
    debug!("Query has {} observations", query.events().len());

    let matches = db.best_matches(query.events(), options.top)?;
    print_results(&matches, output_format)
}

pub fn run_check(db: Option<PathBuf>) -> Result<()> {
    let path = resolve_db_path(db);
    let db = load_db(&path)?;
    print_check(&path, &db);
    Ok(())
}

fn match_options(top: Option<usize>) -> MatchOptions {
    let options = MatchOptions::default();
    match top {
        Some(top) => options.with_top(top),
        None => options,
    }
}

pub fn resolve_db_path(flag: Option<PathBuf>) -> PathBuf {
    choose_db_path(flag, env::var_os(DB_ENV))
}

/// Explicit flag first, then the environment, then the conventional name.
fn choose_db_path(flag: Option<PathBuf>, from_env: Option<OsString>) -> PathBuf {
    flag.or_else(|| from_env.map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB))
}

fn load_db(path: &Path) -> Result<FingerprintDb> {
    info!("Loading fingerprint database {}", path.display());
    FingerprintDb::load(path).context("Failed to load fingerprint database")
}

fn read_stdin() -> Result<String> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        eprintln!("Enter the query fingerprint, then end input (Ctrl-D):");
    }
    let mut text = String::new();
    stdin
        .read_to_string(&mut text)
        .context("Failed to read query from stdin")?;
    Ok(text)
}
