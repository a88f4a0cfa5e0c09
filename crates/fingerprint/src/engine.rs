//! Matching engine
//!
//! Scores every reference fingerprint against a stream of query events.
//! Scores live in a [`ScoreBoard`] owned by the run, indexed like the
//! database's fingerprint list, so the database itself is never mutated and
//! independent runs cannot see each other's totals.

use crate::db::FingerprintDb;
use osmatch_common::{OsMatchError, OsMatchResult, ProbeGroup, QueryEvent};
use tracing::{debug, trace};

/// Per-fingerprint scores of one matching run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreBoard {
    scores: Vec<u64>,
}

impl ScoreBoard {
    /// All-zero scores for `len` fingerprints.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            scores: vec![0; len],
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<u64> {
        self.scores.get(index).copied()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.scores
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    #[inline]
    fn award(&mut self, index: usize, points: u64) {
        self.scores[index] = self.scores[index].saturating_add(points);
    }
}

impl From<Vec<u64>> for ScoreBoard {
    fn from(scores: Vec<u64>) -> Self {
        Self { scores }
    }
}

/// One pass of a query over the database.
pub struct MatchRun<'a> {
    db: &'a FingerprintDb,
    scores: ScoreBoard,
}

impl<'a> MatchRun<'a> {
    #[must_use]
    pub fn new(db: &'a FingerprintDb) -> Self {
        Self {
            db,
            scores: ScoreBoard::new(db.len()),
        }
    }

    /// Score one event against every fingerprint.
    ///
    /// Fails if the point table has no entry for the event's test.
    pub fn apply(&mut self, event: &QueryEvent) -> OsMatchResult<()> {
        if event.group.is_informational() {
            trace!(%event, "skipping informational test");
            return Ok(());
        }

        let points = self
            .db
            .points()
            .points(event.group, &event.test)
            .map(u64::from)
            .ok_or_else(|| OsMatchError::MissingPoints {
                group: event.group,
                test: event.test.clone(),
            })?;
        // both sides agree the probe got no answer: the whole group counts
        let no_response_bonus = if event.is_no_response() {
            self.db.points().group_total(event.group)
        } else {
            0
        };

        for (index, fingerprint) in self.db.fingerprints().iter().enumerate() {
            match fingerprint.probe(event.group) {
                Some(ProbeGroup::Absent) => {
                    if no_response_bonus > 0 {
                        self.scores.award(index, no_response_bonus);
                    }
                }
                Some(ProbeGroup::Present(tests)) => {
                    // a test the reference does not define scores nothing
                    if let Some(expr) = tests.get(&event.test) {
                        if expr.matches(&event.value) {
                            self.scores.award(index, points);
                        }
                    }
                }
                None => {}
            }
        }
        Ok(())
    }

    pub fn apply_all<'e>(&mut self, events: impl IntoIterator<Item = &'e QueryEvent>) -> OsMatchResult<()> {
        let mut applied = 0usize;
        for event in events {
            self.apply(event)?;
            applied += 1;
        }
        debug!(events = applied, fingerprints = self.db.len(), "matching run complete");
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn scores(&self) -> &ScoreBoard {
        &self.scores
    }

    #[must_use]
    pub fn finish(self) -> ScoreBoard {
        self.scores
    }
}

/// Score a whole query in one call.
pub fn score(db: &FingerprintDb, events: &[QueryEvent]) -> OsMatchResult<ScoreBoard> {
    let mut run = MatchRun::new(db);
    run.apply_all(events)?;
    Ok(run.finish())
}
