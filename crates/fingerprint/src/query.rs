//! Query fingerprint parser
//!
//! A query is a fingerprint as printed by the scanner: `GROUP(test=value%...)`
//! repeated, values being literals. Whitespace is ignored everywhere, so the
//! groups may be split across lines freely. Unlike the database, a query does
//! not have to mention every probe group.

use osmatch_common::{
    OsMatchError, OsMatchResult, ProbeGroup, QueryEvent, TestGroup, NO_RESPONSE,
    RESPONSIVENESS_TEST,
};
use std::collections::BTreeMap;
use std::str::Chars;
use tracing::{debug, warn};

const QUERY_NAME: &str = "<query>";

/// A parsed query: its observations in input order plus a per-group view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFingerprint {
    events: Vec<QueryEvent>,
    probes: BTreeMap<TestGroup, ProbeGroup<String>>,
}

impl QueryFingerprint {
    /// Observations in the order they appeared.
    #[inline]
    #[must_use]
    pub fn events(&self) -> &[QueryEvent] {
        &self.events
    }

    #[must_use]
    pub fn into_events(self) -> Vec<QueryEvent> {
        self.events
    }

    #[inline]
    #[must_use]
    pub fn probe(&self, group: TestGroup) -> Option<&ProbeGroup<String>> {
        self.probes.get(&group)
    }

    /// Groups the query mentions, in canonical order.
    pub fn groups(&self) -> impl Iterator<Item = TestGroup> + '_ {
        self.probes.keys().copied()
    }
}

/// Parse one query fingerprint.
pub fn parse_query(text: &str) -> OsMatchResult<QueryFingerprint> {
    let mut cursor = Cursor::new(text);
    let mut query = QueryFingerprint::default();

    loop {
        let (name, stop) = cursor.read_until(&['('], |c| c.is_ascii_alphanumeric())?;
        if stop.is_none() {
            if name.is_empty() {
                break;
            }
            return Err(cursor.eof(format!("group {name}")));
        }

        let group: TestGroup = name.parse().map_err(|_| OsMatchError::UnknownGroup {
            line: cursor.line,
            group: name.clone(),
        })?;
        if query.probes.contains_key(&group) {
            return Err(OsMatchError::DuplicateGroup {
                line: cursor.line,
                group,
                fingerprint: QUERY_NAME.to_string(),
            });
        }

        let tests = read_group_body(&mut cursor, group)?;
        let (probe, events) = build_group(&cursor, group, tests)?;
        debug!(%group, events = events.len(), "parsed query group");
        query.probes.insert(group, probe);
        query.events.extend(events);
    }

    Ok(query)
}

fn read_group_body(cursor: &mut Cursor<'_>, group: TestGroup) -> OsMatchResult<Vec<(String, String)>> {
    let mut tests: Vec<(String, String)> = Vec::new();
    loop {
        let (test, stop) = cursor.read_until(&['=', ')'], |c| c.is_ascii_alphanumeric())?;
        match stop {
            None => return Err(cursor.eof(format!("group {group}"))),
            Some(')') if test.is_empty() && tests.is_empty() => return Ok(tests),
            Some(')') => {
                return Err(cursor.syntax(format!("expected '=' after '{test}' in group {group}")))
            }
            Some(_) if test.is_empty() => {
                return Err(cursor.syntax(format!("empty test name in group {group}")))
            }
            Some(_) => {}
        }

        let line = cursor.line;
        let (value, stop) = cursor.read_until(&['%', ')'], |c| c != '(')?;
        let Some(stop) = stop else {
            return Err(cursor.eof(format!("{group}.{test}")));
        };

        // R=N is the no-response marker, valid even where R is not a test
        if !group.accepts(&test) && !is_no_response(&test, &value) {
            return Err(OsMatchError::UnknownTest { line, group, test });
        }

        if let Some(pos) = tests.iter().position(|(t, _)| *t == test) {
            warn!("line {}: duplicate test {} in query group {}", cursor.line, test, group);
            tests.remove(pos);
        }
        tests.push((test, value));

        if stop == ')' {
            return Ok(tests);
        }
    }
}

fn build_group(
    cursor: &Cursor<'_>,
    group: TestGroup,
    tests: Vec<(String, String)>,
) -> OsMatchResult<(ProbeGroup<String>, Vec<QueryEvent>)> {
    let no_response = |(t, v): &(String, String)| is_no_response(t, v);

    if tests.is_empty() || (tests.len() == 1 && no_response(&tests[0])) {
        return Ok((ProbeGroup::Absent, vec![QueryEvent::absent(group)]));
    }
    if tests.iter().any(no_response) {
        return Err(cursor.syntax(format!("R=N mixed with other tests in group {group}")));
    }

    let events = tests
        .iter()
        .map(|(t, v)| QueryEvent::new(group, t.as_str(), v.as_str()))
        .collect();
    Ok((ProbeGroup::Present(tests.into_iter().collect()), events))
}

fn is_no_response(test: &str, value: &str) -> bool {
    test == RESPONSIVENESS_TEST && value == NO_RESPONSE
}

/// Character reader that skips whitespace and tracks the current line.
struct Cursor<'a> {
    chars: Chars<'a>,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars(),
            line: 1,
        }
    }

    /// Collect characters up to one of `stops`, returning the text and the
    /// stop character, or `None` for the stop at end of input.
    fn read_until(
        &mut self,
        stops: &[char],
        valid: impl Fn(char) -> bool,
    ) -> OsMatchResult<(String, Option<char>)> {
        let mut out = String::new();
        for c in self.chars.by_ref() {
            if c == '\n' {
                self.line += 1;
            }
            if stops.contains(&c) {
                return Ok((out, Some(c)));
            }
            if c.is_whitespace() {
                continue;
            }
            if !valid(c) {
                return Err(OsMatchError::QuerySyntax {
                    line: self.line,
                    reason: format!("unexpected {c:?}"),
                });
            }
            out.push(c);
        }
        Ok((out, None))
    }

    fn syntax(&self, reason: String) -> OsMatchError {
        OsMatchError::QuerySyntax {
            line: self.line,
            reason,
        }
    }

    fn eof(&self, context: String) -> OsMatchError {
        OsMatchError::UnexpectedEof {
            line: self.line,
            context,
        }
    }
}
