//! Reference fingerprints and the loaded database

use crate::engine::score;
use crate::expr::Expr;
use crate::loader::DbLoader;
use crate::rank::rank;
use osmatch_common::{
    Matcher, MatchPoints, OsMatchError, OsMatchResult, ProbeGroup, QueryEvent, RankedMatch,
    TestGroup,
};
use std::collections::BTreeMap;
use std::path::Path;

/// One reference OS signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub name: String,
    pub classes: String,
    pub cpe: String,
    /// Line of the `Fingerprint` entry in the database.
    pub line: usize,
    pub probes: BTreeMap<TestGroup, ProbeGroup<Expr>>,
}

impl Fingerprint {
    #[must_use]
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            classes: String::new(),
            cpe: String::new(),
            line,
            probes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_probe(mut self, group: TestGroup, probe: ProbeGroup<Expr>) -> Self {
        self.probes.insert(group, probe);
        self
    }

    #[inline]
    #[must_use]
    pub fn probe(&self, group: TestGroup) -> Option<&ProbeGroup<Expr>> {
        self.probes.get(&group)
    }

    /// Probe groups this fingerprint does not define, in canonical order.
    #[must_use]
    pub fn missing_groups(&self) -> Vec<TestGroup> {
        TestGroup::probes()
            .filter(|g| !self.probes.contains_key(g))
            .collect()
    }
}

/// Reference fingerprints in database order plus the point table.
///
/// Read-only once loaded; matching runs keep their scores elsewhere.
#[derive(Debug, Clone, Default)]
pub struct FingerprintDb {
    fingerprints: Vec<Fingerprint>,
    points: MatchPoints,
}

impl FingerprintDb {
    #[must_use]
    pub fn new(fingerprints: Vec<Fingerprint>, points: MatchPoints) -> Self {
        Self {
            fingerprints,
            points,
        }
    }

    /// Parse a database held in memory.
    pub fn parse(text: &str) -> OsMatchResult<Self> {
        DbLoader::new().parse(text)
    }

    /// Read and parse a database file. Errors name the file.
    pub fn load(path: impl AsRef<Path>) -> OsMatchResult<Self> {
        let path = path.as_ref();
        let source_name = path.display().to_string();
        let text = std::fs::read_to_string(path)
            .map_err(|e| OsMatchError::from(e).in_source(source_name.clone()))?;
        DbLoader::new().with_source_name(source_name).parse(&text)
    }

    #[inline]
    #[must_use]
    pub fn fingerprints(&self) -> &[Fingerprint] {
        &self.fingerprints
    }

    #[inline]
    #[must_use]
    pub fn points(&self) -> &MatchPoints {
        &self.points
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

impl Matcher for FingerprintDb {
    fn best_matches(&self, events: &[QueryEvent], limit: usize) -> OsMatchResult<Vec<RankedMatch>> {
        let scores = score(self, events)?;
        Ok(rank(&self.fingerprints, &scores, self.points.max_points(), limit))
    }

    fn fingerprint_count(&self) -> usize {
        self.fingerprints.len()
    }

    fn max_points(&self) -> u64 {
        self.points.max_points()
    }
}
