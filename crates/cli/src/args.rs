use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "osmatch")]
#[command(version)]
#[command(about = "Match OS fingerprints against an nmap-os-db database", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rank the database against a query fingerprint
    Match {
        /// Fingerprint database. Defaults to $OSMATCH_DB, then ./nmap-os-db
        #[arg(short, long)]
        db: Option<PathBuf>,

        /// File holding the query fingerprint. Reads stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Number of matches to report [default: 10]
        #[arg(short = 'n', long)]
        top: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output_format: OutputFormat,
    },

    /// Load a database and report what it contains
    Check {
        /// Fingerprint database. Defaults to $OSMATCH_DB, then ./nmap-os-db
        #[arg(short, long)]
        db: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `Best matches:` followed by one `[xx.xx%] name` line per match
    Text,
    /// Pretty-printed JSON report
    Json,
}
