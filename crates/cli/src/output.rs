//! Output formatting for match reports

use anyhow::{Context, Result};
use osmatch_common::{Matcher, RankedMatch};
use osmatch_fingerprint::FingerprintDb;
use serde::Serialize;
use std::path::Path;

use crate::args::OutputFormat;

/// Print ranked matches in the requested format
pub fn print_results(matches: &[RankedMatch], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", render_json(matches)?),
        OutputFormat::Text => print!("{}", render_text(matches)),
    }
    Ok(())
}

/// Summary line for `check`.
pub fn print_check(path: &Path, db: &FingerprintDb) {
    println!(
        "{}: {} fingerprints, {} max points",
        path.display(),
        db.fingerprint_count(),
        db.max_points()
    );
}

fn render_text(matches: &[RankedMatch]) -> String {
    let mut out = String::from("Best matches:\n");
    for m in matches {
        out.push_str(&m.to_string());
        out.push('\n');
    }
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    matches: &'a [RankedMatch],
}

fn render_json(matches: &[RankedMatch]) -> Result<String> {
    serde_json::to_string_pretty(&JsonReport { matches })
        .context("Failed to serialize matches")
}
