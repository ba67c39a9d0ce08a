//! JUnit / Ant XML reports
//!
//! Accepts both a `<testsuites>` wrapper and a bare `<testsuite>` root.
//! Suites may nest; a case belongs to the innermost enclosing suite.

use verdict_core::domain::result::{CanonicalResult, ResultFormat, Verdict};

use super::xml::{Element, Node, XmlReader, seconds_to_ms};
use super::{CodecError, DEFAULT_SUITE, PendingCase, ResultCodec};

pub struct JUnitCodec;

impl ResultCodec for JUnitCodec {
    fn format(&self) -> ResultFormat {
        ResultFormat::JUnit
    }

    fn parse(&self, content: &str) -> Result<CanonicalResult, CodecError> {
        let mut reader = XmlReader::new(ResultFormat::JUnit, content);
        let mut result = CanonicalResult::default();
        let mut suites: Vec<String> = Vec::new();
        let mut current: Option<PendingCase> = None;
        let mut in_outcome = false;

        loop {
            match reader.next()? {
                Node::Open(e) if e.name == "testsuite" => {
                    suites.push(e.attr("name").unwrap_or(DEFAULT_SUITE).to_string());
                }
                Node::Open(e) if e.name == "testcase" => {
                    current = Some(start_case(&e, &suites));
                }
                Node::Leaf(e) if e.name == "testcase" => {
                    start_case(&e, &suites).finish_into(&mut result);
                }
                Node::Open(e) if is_outcome(&e.name) => {
                    if let Some(case) = current.as_mut() {
                        record_outcome(case, &e);
                    }
                    in_outcome = true;
                }
                Node::Leaf(e) if is_outcome(&e.name) => {
                    if let Some(case) = current.as_mut() {
                        record_outcome(case, &e);
                    }
                }
                Node::Text(text) if in_outcome => {
                    if let Some(case) = current.as_mut() {
                        case.fill_message(&text);
                    }
                }
                Node::Close(name) => match name.as_str() {
                    "testsuite" => {
                        suites.pop();
                    }
                    "testcase" => {
                        if let Some(case) = current.take() {
                            case.finish_into(&mut result);
                        }
                        in_outcome = false;
                    }
                    name if is_outcome(name) => in_outcome = false,
                    _ => {}
                },
                Node::Eof => break,
                _ => {}
            }
        }

        Ok(result)
    }
}

fn is_outcome(name: &str) -> bool {
    matches!(name, "failure" | "error" | "skipped")
}

fn record_outcome(case: &mut PendingCase, e: &Element) {
    // A failure recorded earlier in the same case is not downgraded to skipped.
    if e.name != "skipped" {
        case.verdict = Verdict::Failed;
    } else if case.verdict != Verdict::Failed {
        case.verdict = Verdict::Skipped;
    }
    if let Some(message) = e.attr("message") {
        case.fill_message(message);
    }
}

fn start_case(e: &Element, suites: &[String]) -> PendingCase {
    let suite = suites
        .last()
        .map(String::as_str)
        .or_else(|| e.attr("classname"))
        .unwrap_or(DEFAULT_SUITE);

    let mut case = PendingCase::new(suite, e.attr("name").unwrap_or_default(), Verdict::Passed);
    case.duration_ms = seconds_to_ms(e.attr("time"));
    case
}
