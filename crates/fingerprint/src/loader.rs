//! Reference database loader
//!
//! Reads the line-oriented nmap-os-db format: `Fingerprint`, `Class` and
//! `CPE` lines, one `GROUP(test=expr%...)` line per probe group, blank lines
//! between records and a single `MatchPoints` block holding the point table.

use crate::db::{Fingerprint, FingerprintDb};
use crate::expr::{compile_test, CompiledTest, Expr};
use once_cell::sync::Lazy;
use osmatch_common::{
    MatchPoints, OsMatchError, OsMatchResult, ProbeGroup, TestGroup, NO_RESPONSE,
    RESPONSIVENESS_TEST,
};
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

static GROUP_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9]+)\(([^()]*)\)$").unwrap());

const MATCH_POINTS: &str = "MatchPoints";

/// Parses a reference database into a [`FingerprintDb`].
///
/// Holds no state between calls; every `parse` starts from scratch.
#[derive(Debug, Clone, Default)]
pub struct DbLoader {
    source_name: Option<String>,
}

impl DbLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name reported in warnings and prefixed to errors, usually a file path.
    #[must_use]
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn parse(&self, text: &str) -> OsMatchResult<FingerprintDb> {
        let source = self.source_name.as_deref().unwrap_or("<input>");
        let result = LoadState::new(source).run(text);
        match (&self.source_name, result) {
            (Some(name), Err(e)) => Err(e.in_source(name.clone())),
            (_, result) => result,
        }
    }
}

/// A fingerprint record being read, before its completeness check.
struct RecordBuilder {
    name: Option<String>,
    classes: String,
    cpe: String,
    line: usize,
    probes: BTreeMap<TestGroup, ProbeGroup<Expr>>,
}

impl RecordBuilder {
    fn new(line: usize) -> Self {
        Self {
            name: None,
            classes: String::new(),
            cpe: String::new(),
            line,
            probes: BTreeMap::new(),
        }
    }
}

struct LoadState<'a> {
    source: &'a str,
    fingerprints: Vec<Fingerprint>,
    points: Option<MatchPoints>,
    record: Option<RecordBuilder>,
}

impl<'a> LoadState<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            fingerprints: Vec::new(),
            points: None,
            record: None,
        }
    }

    fn run(mut self, text: &str) -> OsMatchResult<FingerprintDb> {
        let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));

        while let Some((line_no, raw)) = lines.next() {
            let line = raw.trim_end();

            if line.trim_start().is_empty() {
                self.finish_record()?;
            } else if line.starts_with('#') {
                continue;
            } else if line == MATCH_POINTS {
                self.read_match_points(line_no, &mut lines)?;
            } else if let Some(name) = line.strip_prefix("Fingerprint ") {
                self.start_fingerprint(line_no, line, name.trim())?;
            } else if let Some(classes) = line.strip_prefix("Class ") {
                self.record(line_no).classes = classes.trim().to_string();
            } else if let Some(cpe) = line.strip_prefix("CPE ") {
                self.record(line_no).cpe = cpe.trim().to_string();
            } else if let Some(caps) = GROUP_LINE_RE.captures(line) {
                let body = caps.get(2).map_or("", |m| m.as_str());
                self.define_group(line_no, line, &caps[1], body)?;
            } else {
                return Err(OsMatchError::MalformedLine {
                    line: line_no,
                    content: line.to_string(),
                });
            }
        }
        // end of input closes a record that lacks a trailing blank line
        self.finish_record()?;

        let points = self.points.ok_or(OsMatchError::MissingMatchPoints)?;
        info!(
            "Loaded {} fingerprints from {} (max {} points)",
            self.fingerprints.len(),
            self.source,
            points.max_points()
        );
        Ok(FingerprintDb::new(self.fingerprints, points))
    }

    fn record(&mut self, line: usize) -> &mut RecordBuilder {
        self.record.get_or_insert_with(|| RecordBuilder::new(line))
    }

    fn start_fingerprint(&mut self, line: usize, content: &str, name: &str) -> OsMatchResult<()> {
        if name.is_empty() {
            return Err(OsMatchError::MalformedLine {
                line,
                content: content.to_string(),
            });
        }
        let record = self.record(line);
        if let Some(existing) = &record.name {
            return Err(OsMatchError::UnterminatedRecord {
                line,
                name: existing.clone(),
            });
        }
        record.name = Some(name.to_string());
        record.line = line;
        Ok(())
    }

    fn define_group(
        &mut self,
        line: usize,
        content: &str,
        group_name: &str,
        body: &str,
    ) -> OsMatchResult<()> {
        let group: TestGroup = group_name
            .parse()
            .map_err(|_| OsMatchError::UnknownGroup {
                line,
                group: group_name.to_string(),
            })?;

        let source = self.source;
        let record = self.record(line);
        if record.probes.contains_key(&group) {
            return Err(OsMatchError::DuplicateGroup {
                line,
                group,
                fingerprint: record.name.clone().unwrap_or_default(),
            });
        }

        let probe = parse_group_body(source, line, content, group, body)?;
        record.probes.insert(group, probe);
        Ok(())
    }

    fn finish_record(&mut self) -> OsMatchResult<()> {
        let Some(record) = self.record.take() else {
            return Ok(());
        };
        let name = record
            .name
            .ok_or(OsMatchError::MissingName { line: record.line })?;

        let fingerprint = Fingerprint {
            name,
            classes: record.classes,
            cpe: record.cpe,
            line: record.line,
            probes: record.probes,
        };

        let missing = fingerprint.missing_groups();
        if !missing.is_empty() {
            return Err(OsMatchError::IncompleteFingerprint {
                line: fingerprint.line,
                name: fingerprint.name,
                missing,
            });
        }

        debug!(name = %fingerprint.name, line = fingerprint.line, "registered fingerprint");
        self.fingerprints.push(fingerprint);
        Ok(())
    }

    fn read_match_points<'t>(
        &mut self,
        start: usize,
        lines: &mut impl Iterator<Item = (usize, &'t str)>,
    ) -> OsMatchResult<()> {
        if self.points.is_some() {
            return Err(OsMatchError::DuplicateMatchPoints { line: start });
        }

        let mut points = MatchPoints::new();
        let mut last_line = start;
        loop {
            let Some((line_no, raw)) = lines.next() else {
                return Err(OsMatchError::UnexpectedEof {
                    line: last_line,
                    context: MATCH_POINTS.to_string(),
                });
            };
            last_line = line_no;

            let line = raw.trim_end();
            if line.trim_start().is_empty() {
                break;
            }
            if line.starts_with('#') {
                continue;
            }
            let (group, row) = parse_points_line(line_no, line)?;
            if points.contains_group(group) {
                return Err(OsMatchError::DuplicatePointsGroup {
                    line: line_no,
                    group,
                });
            }
            points.insert_group(group, row);
        }

        debug!(max_points = points.max_points(), "read MatchPoints");
        self.points = Some(points);
        Ok(())
    }
}

fn parse_group_body(
    source: &str,
    line: usize,
    content: &str,
    group: TestGroup,
    body: &str,
) -> OsMatchResult<ProbeGroup<Expr>> {
    if body.is_empty() {
        return Ok(ProbeGroup::Absent);
    }

    let compiled = body
        .split('%')
        .map(|entry| {
            compile_test(entry).map_err(|e| OsMatchError::InvalidExpression {
                line,
                expr: entry.to_string(),
                reason: e.to_string(),
            })
        })
        .collect::<OsMatchResult<Vec<_>>>()?;

    if compiled.iter().any(is_no_response) {
        if compiled.len() == 1 {
            return Ok(ProbeGroup::Absent);
        }
        // R=N means the whole probe went unanswered; other tests contradict it
        return Err(OsMatchError::MalformedLine {
            line,
            content: content.to_string(),
        });
    }

    let mut tests = BTreeMap::new();
    for CompiledTest { names, expr } in compiled {
        for name in names {
            if !group.accepts(&name) {
                return Err(OsMatchError::UnknownTest {
                    line,
                    group,
                    test: name,
                });
            }
            if tests.insert(name.clone(), expr.clone()).is_some() {
                warn!("{}:{}: duplicate test {} in group {}", source, line, name, group);
            }
        }
    }
    Ok(ProbeGroup::Present(tests))
}

fn is_no_response(test: &CompiledTest) -> bool {
    test.names.len() == 1 && test.names[0] == RESPONSIVENESS_TEST && test.expr.source() == NO_RESPONSE
}

fn parse_points_line(line: usize, content: &str) -> OsMatchResult<(TestGroup, BTreeMap<String, u32>)> {
    let malformed = || OsMatchError::MalformedLine {
        line,
        content: content.to_string(),
    };

    let caps = GROUP_LINE_RE.captures(content).ok_or_else(malformed)?;
    let group: TestGroup = caps[1].parse().map_err(|_| OsMatchError::UnknownGroup {
        line,
        group: caps[1].to_string(),
    })?;
    if group.is_informational() {
        return Err(OsMatchError::InformationalPoints { line, group });
    }

    let mut row = BTreeMap::new();
    for entry in caps[2].split('%') {
        let (test, value) = entry.split_once('=').ok_or_else(malformed)?;
        if !group.accepts(test) {
            return Err(OsMatchError::UnknownTest {
                line,
                group,
                test: test.to_string(),
            });
        }
        let points = value.trim().parse::<u32>().map_err(|_| OsMatchError::InvalidPoints {
            line,
            group,
            test: test.to_string(),
            value: value.to_string(),
        })?;
        if row.insert(test.to_string(), points).is_some() {
            return Err(OsMatchError::DuplicatePointsTest {
                line,
                group,
                test: test.to_string(),
            });
        }
    }
    Ok((group, row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const POINTS: &str = "\
MatchPoints
SEQ(SP=25%GCD=75%ISR=25)
OPS(O1=20%O2=20)
WIN(W1=15%W2=15)
ECN(R=100%DF=20%W=15)
T1(R=30%DF=20%T=15)
T2(R=80)
T3(R=80)
T4(R=100%W=25)
T5(R=100)
T6(R=100)
T7(R=80)
U1(R=50)
IE(R=50)
";

    /// `GROUP()` lines for every probe group not listed in `defined`.
    fn absent_groups(defined: &[TestGroup]) -> String {
        TestGroup::probes()
            .filter(|g| !defined.contains(g))
            .map(|g| format!("{}()\n", g))
            .collect()
    }

    fn corpus(records: &[String]) -> String {
        let mut text = format!("# test corpus\n{POINTS}\n");
        for record in records {
            text.push_str(record);
            text.push('\n');
        }
        text
    }

    fn record(name: &str, groups: &str, defined: &[TestGroup]) -> String {
        format!("Fingerprint {name}\n{groups}{}", absent_groups(defined))
    }

    #[test]
    fn one_fingerprint_per_block() {
        let text = corpus(&[
            format!(
                "Fingerprint Linux 2.6.32\nClass Linux | Linux | 2.6.X | general purpose\nCPE cpe:/o:linux:linux_kernel:2.6\n# comment inside a record\nT1(R=Y%DF=Y%T=3B-45)\n{}",
                absent_groups(&[TestGroup::T1])
            ),
            record("Windows 7", "WIN(W1|W2=2000)\n", &[TestGroup::Win]),
        ]);

        let db = FingerprintDb::parse(&text).unwrap();
        assert_eq!(db.len(), 2);

        let linux = &db.fingerprints()[0];
        assert_eq!(linux.name, "Linux 2.6.32");
        assert_eq!(linux.classes, "Linux | Linux | 2.6.X | general purpose");
        assert_eq!(linux.cpe, "cpe:/o:linux:linux_kernel:2.6");
        assert_eq!(linux.line, 17);

        let windows = &db.fingerprints()[1];
        assert_eq!(windows.name, "Windows 7");
        assert!(windows.classes.is_empty());

        for fp in db.fingerprints() {
            assert!(fp.missing_groups().is_empty());
            for group in TestGroup::probes() {
                assert!(fp.probe(group).is_some());
            }
        }
        assert_eq!(db.points().max_points(), 1_060);
    }

    #[test]
    fn group_bodies() {
        let text = corpus(&[format!(
            "Fingerprint Router\nT1(R=Y%DF=N)\nT2(R=N)\nT3()\nWIN(W1|W2=0|5B40%W3=FFFF)\n{}",
            absent_groups(&[TestGroup::T1, TestGroup::T2, TestGroup::T3, TestGroup::Win])
        )]);
        let db = FingerprintDb::parse(&text).unwrap();
        let fp = &db.fingerprints()[0];

        assert!(fp.probe(TestGroup::T2).unwrap().is_absent());
        assert!(fp.probe(TestGroup::T3).unwrap().is_absent());

        let t1 = fp.probe(TestGroup::T1).unwrap();
        assert_eq!(t1.len(), 2);
        assert!(t1.get("R").unwrap().matches("Y"));
        assert!(!t1.get("DF").unwrap().matches("Y"));

        let win = fp.probe(TestGroup::Win).unwrap();
        assert_eq!(win.get("W1").unwrap().source(), "0|5B40");
        assert_eq!(win.get("W2").unwrap().source(), "0|5B40");
        assert!(win.get("W3").unwrap().matches("FFFF"));
    }

    #[test]
    fn missing_group_at_boundary_is_fatal() {
        let incomplete = format!(
            "Fingerprint Half done\nT1(R=Y)\n{}",
            absent_groups(&[TestGroup::T1, TestGroup::Ie])
        );
        let err = FingerprintDb::parse(&corpus(&[incomplete])).unwrap_err();
        match err {
            OsMatchError::IncompleteFingerprint {
                name, missing, line, ..
            } => {
                assert_eq!(name, "Half done");
                assert_eq!(missing, vec![TestGroup::Ie]);
                assert_eq!(line, 17);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn name_only_record_is_incomplete() {
        let err = FingerprintDb::parse(&corpus(&["Fingerprint Nothing\n".to_string()])).unwrap_err();
        assert!(matches!(
            err,
            OsMatchError::IncompleteFingerprint { ref missing, .. } if missing.len() == 13
        ));
    }

    #[test]
    fn record_without_name_is_fatal() {
        let err = FingerprintDb::parse(&corpus(&[absent_groups(&[])])).unwrap_err();
        assert!(matches!(err, OsMatchError::MissingName { line: 17 }));
    }

    #[test]
    fn end_of_input_terminates_last_record() {
        let mut text = corpus(&[]);
        text.push_str(&record("Last", "", &[]));
        assert!(!text.ends_with("\n\n"));
        let db = FingerprintDb::parse(&text).unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(db.fingerprints()[0].name, "Last");
    }

    #[test]
    fn duplicate_group_is_fatal() {
        let text = corpus(&[record("Twice", "T1(R=Y)\nT1(R=Y)\n", &[TestGroup::T1])]);
        let err = FingerprintDb::parse(&text).unwrap_err();
        assert!(matches!(
            err,
            OsMatchError::DuplicateGroup { group: TestGroup::T1, line: 19, ref fingerprint } if fingerprint == "Twice"
        ));
    }

    #[test]
    fn duplicate_test_last_definition_wins() {
        let text = corpus(&[record("Dup", "T1(R=Y%DF=N%DF=Y)\n", &[TestGroup::T1])]);
        let db = FingerprintDb::parse(&text).unwrap();
        let t1 = db.fingerprints()[0].probe(TestGroup::T1).unwrap();
        assert_eq!(t1.get("DF").unwrap().source(), "Y");
    }

    #[test]
    fn unknown_names_are_fatal() {
        let text = corpus(&[record("Bad test", "T1(R=Y%W=0)\n", &[TestGroup::T1])]);
        assert!(matches!(
            FingerprintDb::parse(&text).unwrap_err(),
            OsMatchError::UnknownTest { group: TestGroup::T1, ref test, .. } if test == "W"
        ));

        let text = corpus(&[record("Bad group", "T9(R=Y)\n", &[])]);
        assert!(matches!(
            FingerprintDb::parse(&text).unwrap_err(),
            OsMatchError::UnknownGroup { ref group, line: 18 } if group == "T9"
        ));
    }

    #[test]
    fn exception_tests_are_tolerated() {
        let text = corpus(&[record("Odd window", "WIN(W0=0%W1=0%W7=FFFF)\n", &[TestGroup::Win])]);
        let db = FingerprintDb::parse(&text).unwrap();
        let win = db.fingerprints()[0].probe(TestGroup::Win).unwrap();
        assert!(win.get("W7").unwrap().matches("FFFF"));
    }

    #[test]
    fn strange_line_is_fatal() {
        let text = corpus(&[record("Strange", "this is not a group\n", &[])]);
        match FingerprintDb::parse(&text).unwrap_err() {
            OsMatchError::MalformedLine { line, content } => {
                assert_eq!(line, 18);
                assert_eq!(content, "this is not a group");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn stray_parentheses_are_fatal() {
        for group_line in ["T1(R=Y)(junk)", "T1(R=Y(%DF=N)"] {
            let text = corpus(&[record("Stray", &format!("{group_line}\n"), &[TestGroup::T1])]);
            match FingerprintDb::parse(&text).unwrap_err() {
                OsMatchError::MalformedLine { line, content } => {
                    assert_eq!(line, 18);
                    assert_eq!(content, group_line);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn no_response_mixed_with_tests_is_fatal() {
        let text = corpus(&[record("Mixed", "T1(R=N%DF=Y)\n", &[TestGroup::T1])]);
        assert!(matches!(
            FingerprintDb::parse(&text).unwrap_err(),
            OsMatchError::MalformedLine { line: 18, .. }
        ));
    }

    #[test]
    fn bad_expression_is_fatal() {
        let text = corpus(&[record("Range", "T1(R=Y%T=1-2-3)\n", &[TestGroup::T1])]);
        assert!(matches!(
            FingerprintDb::parse(&text).unwrap_err(),
            OsMatchError::InvalidExpression { ref expr, .. } if expr == "T=1-2-3"
        ));
    }

    #[test]
    fn second_fingerprint_line_needs_blank_line() {
        let text = corpus(&[format!("Fingerprint A\nFingerprint B\n{}", absent_groups(&[]))]);
        assert!(matches!(
            FingerprintDb::parse(&text).unwrap_err(),
            OsMatchError::UnterminatedRecord { line: 18, ref name } if name == "A"
        ));
    }

    #[test]
    fn last_class_line_wins() {
        let text = corpus(&[format!(
            "Fingerprint Multi\nClass first\nClass second\nCPE cpe:/a\nCPE cpe:/b\n{}",
            absent_groups(&[])
        )]);
        let db = FingerprintDb::parse(&text).unwrap();
        assert_eq!(db.fingerprints()[0].classes, "second");
        assert_eq!(db.fingerprints()[0].cpe, "cpe:/b");
    }

    #[test]
    fn match_points_errors() {
        let redefined = "MatchPoints\nT1(R=10)\nT1(DF=10)\n\n";
        assert!(matches!(
            FingerprintDb::parse(redefined).unwrap_err(),
            OsMatchError::DuplicatePointsGroup { group: TestGroup::T1, line: 3 }
        ));

        let unknown = "MatchPoints\nT1(W=10)\n\n";
        assert!(matches!(
            FingerprintDb::parse(unknown).unwrap_err(),
            OsMatchError::UnknownTest { line: 2, .. }
        ));

        let truncated = "MatchPoints\nT1(R=10)\n";
        assert!(matches!(
            FingerprintDb::parse(truncated).unwrap_err(),
            OsMatchError::UnexpectedEof { line: 2, .. }
        ));

        let not_a_number = "MatchPoints\nT1(R=ten)\n\n";
        assert!(matches!(
            FingerprintDb::parse(not_a_number).unwrap_err(),
            OsMatchError::InvalidPoints { ref value, .. } if value == "ten"
        ));

        let informational = "MatchPoints\nSCAN(V=1)\n\n";
        assert!(matches!(
            FingerprintDb::parse(informational).unwrap_err(),
            OsMatchError::InformationalPoints { .. }
        ));

        let twice = "MatchPoints\nT1(R=10)\n\nMatchPoints\nT2(R=10)\n\n";
        assert!(matches!(
            FingerprintDb::parse(twice).unwrap_err(),
            OsMatchError::DuplicateMatchPoints { line: 4 }
        ));

        assert!(matches!(
            FingerprintDb::parse("# empty\n").unwrap_err(),
            OsMatchError::MissingMatchPoints
        ));
    }

    #[test]
    fn loaded_file_errors_name_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "MatchPoints\nT1(R=10)\n\nGarbage\n").unwrap();

        let err = FingerprintDb::load(file.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with(&file.path().display().to_string()));
        assert!(message.contains("line 4: malformed line"));
    }

    #[test]
    fn loads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", corpus(&[record("On disk", "", &[])])).unwrap();

        let db = FingerprintDb::load(file.path()).unwrap();
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = FingerprintDb::load("/nonexistent/osmatch/nmap-os-db").unwrap_err();
        match err {
            OsMatchError::Source { error, .. } => assert!(matches!(*error, OsMatchError::Io(_))),
            other => panic!("unexpected error: {other}"),
        }
    }
}
