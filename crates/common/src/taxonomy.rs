//! Catalogue of known test groups and test names
//!
//! Any group or test not listed here is rejected by the database loader and
//! the query parser, except for the few names in [`EXCEPTION_TESTS`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Test names accepted in every group. Real-world databases carry these
/// window tests even though no probe defines them.
pub const EXCEPTION_TESTS: &[&str] = &["W0", "W7", "W8", "W9"];

const SCAN_TESTS: &[&str] = &[
    "V", "E", "D", "OT", "CT", "CU", "PV", "DS", "DC", "G", "TM", "P", "M",
];
const SEQ_TESTS: &[&str] = &["SP", "GCD", "ISR", "TI", "CI", "II", "SS", "TS"];
const OPS_TESTS: &[&str] = &["O1", "O2", "O3", "O4", "O5", "O6"];
const WIN_TESTS: &[&str] = &["W1", "W2", "W3", "W4", "W5", "W6"];
const ECN_TESTS: &[&str] = &["R", "DF", "T", "TG", "W", "O", "CC", "Q"];
const T1_TESTS: &[&str] = &["R", "DF", "T", "TG", "S", "A", "F", "RD", "Q"];
const TCP_TESTS: &[&str] = &["R", "DF", "T", "TG", "W", "S", "A", "F", "O", "RD", "Q"];
const U1_TESTS: &[&str] = &[
    "R", "DF", "T", "TG", "IPL", "UN", "RIPL", "RID", "RIPCK", "RUCK", "RUD",
];
const IE_TESTS: &[&str] = &["R", "DFI", "T", "TG", "CD"];

/// One probe-response test group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestGroup {
    Scan,
    Seq,
    Ops,
    Win,
    Ecn,
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
    T7,
    U1,
    Ie,
}

impl TestGroup {
    /// All groups in canonical fingerprint order.
    pub const ALL: [TestGroup; 14] = [
        TestGroup::Scan,
        TestGroup::Seq,
        TestGroup::Ops,
        TestGroup::Win,
        TestGroup::Ecn,
        TestGroup::T1,
        TestGroup::T2,
        TestGroup::T3,
        TestGroup::T4,
        TestGroup::T5,
        TestGroup::T6,
        TestGroup::T7,
        TestGroup::U1,
        TestGroup::Ie,
    ];

    /// Groups every reference fingerprint must define (everything but SCAN).
    pub fn probes() -> impl Iterator<Item = TestGroup> {
        Self::ALL.into_iter().filter(|g| !g.is_informational())
    }

    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TestGroup::Scan => "SCAN",
            TestGroup::Seq => "SEQ",
            TestGroup::Ops => "OPS",
            TestGroup::Win => "WIN",
            TestGroup::Ecn => "ECN",
            TestGroup::T1 => "T1",
            TestGroup::T2 => "T2",
            TestGroup::T3 => "T3",
            TestGroup::T4 => "T4",
            TestGroup::T5 => "T5",
            TestGroup::T6 => "T6",
            TestGroup::T7 => "T7",
            TestGroup::U1 => "U1",
            TestGroup::Ie => "IE",
        }
    }

    /// SCAN only describes the scan itself and never contributes points.
    #[inline]
    #[must_use]
    pub const fn is_informational(&self) -> bool {
        matches!(self, TestGroup::Scan)
    }

    /// Test names declared for this group, in canonical order.
    #[must_use]
    pub const fn tests(&self) -> &'static [&'static str] {
        match self {
            TestGroup::Scan => SCAN_TESTS,
            TestGroup::Seq => SEQ_TESTS,
            TestGroup::Ops => OPS_TESTS,
            TestGroup::Win => WIN_TESTS,
            TestGroup::Ecn => ECN_TESTS,
            TestGroup::T1 => T1_TESTS,
            TestGroup::T2
            | TestGroup::T3
            | TestGroup::T4
            | TestGroup::T5
            | TestGroup::T6
            | TestGroup::T7 => TCP_TESTS,
            TestGroup::U1 => U1_TESTS,
            TestGroup::Ie => IE_TESTS,
        }
    }

    /// Whether `test` may appear in this group, exceptions included.
    #[must_use]
    pub fn accepts(&self, test: &str) -> bool {
        self.tests().contains(&test) || is_exception(test)
    }
}

/// Whether `test` belongs to the universally tolerated exception set.
#[inline]
#[must_use]
pub fn is_exception(test: &str) -> bool {
    EXCEPTION_TESTS.contains(&test)
}

impl fmt::Display for TestGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known test group.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown test group '{0}'")]
pub struct UnknownGroupName(pub String);

impl FromStr for TestGroup {
    type Err = UnknownGroupName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TestGroup::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| UnknownGroupName(s.to_string()))
    }
}
