//! Core data types shared by the loader, the matcher and the CLI
//!
//! Reference and query fingerprints use the same [`ProbeGroup`] shape: a
//! reference stores compiled expressions per test, a query stores the raw
//! observed strings.

use crate::taxonomy::TestGroup;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Test name a query uses to report that a probe got no response.
pub const RESPONSIVENESS_TEST: &str = "R";
/// Value of [`RESPONSIVENESS_TEST`] meaning "no response".
pub const NO_RESPONSE: &str = "N";

/// Verdict for one test group of a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeGroup<T> {
    /// The probe got no response (`GROUP()` or `GROUP(R=N)`).
    Absent,
    /// Per-test values, keyed by test name.
    Present(BTreeMap<String, T>),
}

impl<T> ProbeGroup<T> {
    #[inline]
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, ProbeGroup::Absent)
    }

    /// Value stored for `test`, `None` if the group is absent or lacks it.
    #[inline]
    #[must_use]
    pub fn get(&self, test: &str) -> Option<&T> {
        match self {
            ProbeGroup::Absent => None,
            ProbeGroup::Present(tests) => tests.get(test),
        }
    }

    /// Number of tests defined (zero for an absent group).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ProbeGroup::Absent => 0,
            ProbeGroup::Present(tests) => tests.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Points awarded per (group, test) when a query value matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPoints {
    groups: BTreeMap<TestGroup, BTreeMap<String, u32>>,
}

impl MatchPoints {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn contains_group(&self, group: TestGroup) -> bool {
        self.groups.contains_key(&group)
    }

    /// Replace the point row for `group`. Returns the previous row, if any.
    pub fn insert_group(
        &mut self,
        group: TestGroup,
        tests: BTreeMap<String, u32>,
    ) -> Option<BTreeMap<String, u32>> {
        self.groups.insert(group, tests)
    }

    #[inline]
    #[must_use]
    pub fn points(&self, group: TestGroup, test: &str) -> Option<u32> {
        self.groups.get(&group)?.get(test).copied()
    }

    /// Sum of every test's points within `group`.
    #[must_use]
    pub fn group_total(&self, group: TestGroup) -> u64 {
        self.groups
            .get(&group)
            .map(|tests| tests.values().map(|&p| u64::from(p)).sum())
            .unwrap_or(0)
    }

    /// Highest score any fingerprint can reach.
    #[must_use]
    pub fn max_points(&self) -> u64 {
        self.groups.keys().map(|&g| self.group_total(g)).sum()
    }

    pub fn groups(&self) -> impl Iterator<Item = TestGroup> + '_ {
        self.groups.keys().copied()
    }
}

/// One observation from a query fingerprint, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEvent {
    pub group: TestGroup,
    pub test: String,
    pub value: String,
}

impl QueryEvent {
    #[inline]
    #[must_use]
    pub fn new(group: TestGroup, test: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            group,
            test: test.into(),
            value: value.into(),
        }
    }

    /// The `R=N` signal emitted for a group with no response.
    #[inline]
    #[must_use]
    pub fn absent(group: TestGroup) -> Self {
        Self::new(group, RESPONSIVENESS_TEST, NO_RESPONSE)
    }

    #[inline]
    #[must_use]
    pub fn is_no_response(&self) -> bool {
        self.test == RESPONSIVENESS_TEST && self.value == NO_RESPONSE
    }
}

impl fmt::Display for QueryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}={}", self.group, self.test, self.value)
    }
}

/// A reference fingerprint's standing after a matching run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    pub name: String,
    pub classes: String,
    pub cpe: String,
    /// Line of the `Fingerprint` entry in the database.
    pub line: usize,
    pub score: u64,
    /// `score` as a share of the maximum achievable points, in [0, 100].
    pub percent: f64,
}

impl fmt::Display for RankedMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.2}%] {}", self.percent, self.name)
    }
}

/// Matching behaviour tuning options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOptions {
    /// How many of the best matches to report.
    pub top: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self { top: 10 }
    }
}

impl MatchOptions {
    #[inline]
    #[must_use]
    pub fn with_top(mut self, top: usize) -> Self {
        self.top = top;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(entries: &[(&str, u32)]) -> BTreeMap<String, u32> {
        entries.iter().map(|(t, p)| (t.to_string(), *p)).collect()
    }

    #[test]
    fn match_points_totals() {
        let mut points = MatchPoints::new();
        points.insert_group(TestGroup::T1, row(&[("R", 100), ("DF", 20)]));
        points.insert_group(TestGroup::Ie, row(&[("R", 50)]));

        assert_eq!(points.points(TestGroup::T1, "DF"), Some(20));
        assert_eq!(points.points(TestGroup::T1, "W"), None);
        assert_eq!(points.points(TestGroup::T2, "R"), None);
        assert_eq!(points.group_total(TestGroup::T1), 120);
        assert_eq!(points.group_total(TestGroup::T2), 0);
        assert_eq!(points.max_points(), 170);
    }

    #[test]
    fn probe_group_lookup() {
        let absent: ProbeGroup<String> = ProbeGroup::Absent;
        assert!(absent.is_absent());
        assert_eq!(absent.get("R"), None);
        assert!(absent.is_empty());

        let mut tests = BTreeMap::new();
        tests.insert("DF".to_string(), "Y".to_string());
        let present = ProbeGroup::Present(tests);
        assert_eq!(present.get("DF").map(String::as_str), Some("Y"));
        assert_eq!(present.get("T"), None);
        assert_eq!(present.len(), 1);
    }

    #[test]
    fn absent_event_is_no_response() {
        let event = QueryEvent::absent(TestGroup::U1);
        assert!(event.is_no_response());
        assert_eq!(event.to_string(), "U1.R=N");
        assert!(!QueryEvent::new(TestGroup::U1, "R", "Y").is_no_response());
    }

    #[test]
    fn ranked_match_display() {
        let m = RankedMatch {
            name: "Linux 2.6.32".to_string(),
            classes: String::new(),
            cpe: String::new(),
            line: 7,
            score: 20,
            percent: 200.0 / 3.0,
        };
        assert_eq!(m.to_string(), "[66.67%] Linux 2.6.32");
    }

    #[test]
    fn match_options_default_top_ten() {
        assert_eq!(MatchOptions::default().top, 10);
        assert_eq!(MatchOptions::default().with_top(3).top, 3);
    }
}
