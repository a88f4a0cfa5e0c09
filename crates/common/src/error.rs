//! Error types for osmatch
//!
//! Every fatal condition raised while loading a database or parsing a query
//! carries enough context (line, group, token) to point at the offending input.

use crate::taxonomy::TestGroup;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OsMatchError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Carries the inner message in its own text, so it has no `source()`.
    #[error("{source_name}: {error}")]
    Source {
        source_name: String,
        error: Box<OsMatchError>,
    },

    #[error("line {line}: malformed line: {content:?}")]
    MalformedLine { line: usize, content: String },

    #[error("line {line}: unknown test group '{group}'")]
    UnknownGroup { line: usize, group: String },

    #[error("line {line}: unknown test '{test}' in group {group}")]
    UnknownTest {
        line: usize,
        group: TestGroup,
        test: String,
    },

    #[error("line {line}: group {group} defined twice in fingerprint '{fingerprint}'")]
    DuplicateGroup {
        line: usize,
        group: TestGroup,
        fingerprint: String,
    },

    #[error("line {line}: invalid expression '{expr}': {reason}")]
    InvalidExpression {
        line: usize,
        expr: String,
        reason: String,
    },

    #[error("line {line}: fingerprint '{name}' is missing groups: {}", join_groups(.missing))]
    IncompleteFingerprint {
        line: usize,
        name: String,
        missing: Vec<TestGroup>,
    },

    #[error("line {line}: fingerprint record has no 'Fingerprint' line")]
    MissingName { line: usize },

    #[error("line {line}: new fingerprint started before '{name}' was terminated by a blank line")]
    UnterminatedRecord { line: usize, name: String },

    #[error("line {line}: group {group} redefined in MatchPoints")]
    DuplicatePointsGroup { line: usize, group: TestGroup },

    #[error("line {line}: test {group}.{test} redefined in MatchPoints")]
    DuplicatePointsTest {
        line: usize,
        group: TestGroup,
        test: String,
    },

    #[error("line {line}: informational group {group} cannot carry points")]
    InformationalPoints { line: usize, group: TestGroup },

    #[error("line {line}: invalid points value '{value}' for {group}.{test}")]
    InvalidPoints {
        line: usize,
        group: TestGroup,
        test: String,
        value: String,
    },

    #[error("line {line}: MatchPoints defined twice")]
    DuplicateMatchPoints { line: usize },

    #[error("no MatchPoints section found")]
    MissingMatchPoints,

    #[error("line {line}: unexpected end of input while reading {context}")]
    UnexpectedEof { line: usize, context: String },

    #[error("line {line}: {reason}")]
    QuerySyntax { line: usize, reason: String },

    #[error("no points defined for test {group}.{test}")]
    MissingPoints { group: TestGroup, test: String },
}

impl OsMatchError {
    /// Attach the name of the file (or stream) the error came from.
    #[must_use]
    pub fn in_source(self, source_name: impl Into<String>) -> Self {
        OsMatchError::Source {
            source_name: source_name.into(),
            error: Box::new(self),
        }
    }
}

fn join_groups(groups: &[TestGroup]) -> String {
    groups
        .iter()
        .map(|g| g.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for osmatch operations
pub type OsMatchResult<T> = Result<T, OsMatchError>;
