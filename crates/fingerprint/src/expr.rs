//! Test expression compiler
//!
//! A database entry such as `W1|W2=0|5B40` names one or more tests and an
//! expression listing acceptable values. Each `|`-separated alternative
//! compiles to a [`Predicate`]; the expression matches when any of them does.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("missing '=' after test names")]
    MissingEquals,

    #[error("empty test name")]
    EmptyTestName,

    #[error("unexpected character {0:?} in test names")]
    InvalidTestName(char),

    #[error("range '{0}' must have exactly two bounds")]
    InvalidRange(String),

    #[error("range bound '{0}' is not a hexadecimal number")]
    InvalidBound(String),
}

/// Ordering used by `>` / `<` alternatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Greater,
    Less,
}

/// One alternative of a compiled expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Value equals the literal.
    Exact(String),
    /// Value parses as hex and lies within `low..=high`.
    HexRange { low: u64, high: u64 },
    /// Value orders before/after the literal as a plain string, so `"9" > "10"`.
    Compare(CompareOp, String),
    /// Value is the empty string.
    MatchesEmpty,
}

impl Predicate {
    fn parse(alternative: &str) -> Result<Self, ExprError> {
        if alternative.is_empty() {
            return Ok(Predicate::MatchesEmpty);
        }
        if let Some(rest) = alternative.strip_prefix('>') {
            return Ok(Predicate::Compare(CompareOp::Greater, rest.to_string()));
        }
        if let Some(rest) = alternative.strip_prefix('<') {
            return Ok(Predicate::Compare(CompareOp::Less, rest.to_string()));
        }
        if alternative.chars().skip(1).any(|c| c == '-') {
            let mut bounds = alternative.split('-');
            let (low, high) = match (bounds.next(), bounds.next(), bounds.next()) {
                (Some(low), Some(high), None) => (low, high),
                _ => return Err(ExprError::InvalidRange(alternative.to_string())),
            };
            let low = parse_hex(low).ok_or_else(|| ExprError::InvalidBound(low.to_string()))?;
            let high = parse_hex(high).ok_or_else(|| ExprError::InvalidBound(high.to_string()))?;
            return Ok(Predicate::HexRange { low, high });
        }
        Ok(Predicate::Exact(alternative.to_string()))
    }

    /// Evaluate against an observed value.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Predicate::Exact(literal) => value == literal,
            Predicate::HexRange { low, high } => {
                parse_hex(value).is_some_and(|v| (*low..=*high).contains(&v))
            }
            Predicate::Compare(CompareOp::Greater, literal) => value > literal.as_str(),
            Predicate::Compare(CompareOp::Less, literal) => value < literal.as_str(),
            Predicate::MatchesEmpty => value.is_empty(),
        }
    }
}

/// Parse a base-16 number the way fingerprint values are written: optional
/// surrounding whitespace, optional `+` sign and `0x` prefix.
#[must_use]
pub fn parse_hex(value: &str) -> Option<u64> {
    let value = value.trim();
    let value = value.strip_prefix('+').unwrap_or(value);
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// A compiled value expression: the OR of its alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    source: String,
    alternatives: Vec<Predicate>,
}

impl Expr {
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let alternatives = source
            .split('|')
            .map(Predicate::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source: source.to_string(),
            alternatives,
        })
    }

    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        self.alternatives.iter().any(|p| p.matches(value))
    }

    /// The expression text as written in the database.
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    #[must_use]
    pub fn alternatives(&self) -> &[Predicate] {
        &self.alternatives
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Test names sharing one compiled expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTest {
    pub names: Vec<String>,
    pub expr: Expr,
}

/// Compile one `%`-separated entry of a group body, e.g. `W1|W2=0|5B40`.
pub fn compile_test(entry: &str) -> Result<CompiledTest, ExprError> {
    let (names_part, expr_part) = entry.split_once('=').ok_or(ExprError::MissingEquals)?;

    let mut names = Vec::new();
    for name in names_part.split('|') {
        if name.is_empty() {
            return Err(ExprError::EmptyTestName);
        }
        if let Some(c) = name.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(ExprError::InvalidTestName(c));
        }
        names.push(name.to_string());
    }

    Ok(CompiledTest {
        names,
        expr: Expr::parse(expr_part)?,
    })
}
