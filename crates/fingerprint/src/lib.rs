//! Fingerprint Engine - OS detection against an nmap-os-db database
//!
//! This crate provides:
//! - Compilation of reference test expressions
//! - Loading of the fingerprint database and its MatchPoints table
//! - Parsing of query fingerprints
//! - Scoring and ranking of reference fingerprints

mod db;
mod engine;
mod expr;
mod loader;
mod query;
mod rank;

pub use db::{Fingerprint, FingerprintDb};
pub use engine::{score, MatchRun, ScoreBoard};
pub use expr::{compile_test, parse_hex, CompareOp, CompiledTest, Expr, ExprError, Predicate};
pub use loader::DbLoader;
pub use query::{parse_query, QueryFingerprint};
pub use rank::{percent, rank};

use osmatch_common::{Matcher, OsMatchResult, RankedMatch};

/// Parse `query` and rank the database against it.
pub fn match_query(db: &FingerprintDb, query: &str, limit: usize) -> OsMatchResult<Vec<RankedMatch>> {
    let query = parse_query(query)?;
    db.best_matches(query.events(), limit)
}
