//! Core traits for osmatch components

use crate::error::OsMatchResult;
use crate::types::{QueryEvent, RankedMatch};

/// A database of reference fingerprints that can score a query against
/// every entry.
pub trait Matcher {
    /// Score the query events and return the best `limit` matches, best first.
    fn best_matches(&self, events: &[QueryEvent], limit: usize) -> OsMatchResult<Vec<RankedMatch>>;

    /// Number of reference fingerprints loaded
    fn fingerprint_count(&self) -> usize {
        0
    }

    /// Highest score a single fingerprint can reach
    fn max_points(&self) -> u64;
}
