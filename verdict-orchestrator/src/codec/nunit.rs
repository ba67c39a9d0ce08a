//! NUnit XML reports
//!
//! NUnit 3 (`<test-run>`) and the older NUnit 2 (`<test-results>`) layout
//! share the `test-suite` / `test-case` nesting; they differ in result
//! vocabulary and in where durations live.

use verdict_core::domain::result::{CanonicalResult, ResultFormat, Verdict};

use super::xml::{Element, Node, XmlReader, seconds_to_ms};
use super::{CodecError, DEFAULT_SUITE, PendingCase, ResultCodec};

pub struct NUnitCodec;

impl ResultCodec for NUnitCodec {
    fn format(&self) -> ResultFormat {
        ResultFormat::NUnit
    }

    fn parse(&self, content: &str) -> Result<CanonicalResult, CodecError> {
        let mut reader = XmlReader::new(ResultFormat::NUnit, content);
        let mut result = CanonicalResult::default();
        let mut suites: Vec<String> = Vec::new();
        let mut current: Option<PendingCase> = None;
        let mut capture = false;

        loop {
            match reader.next()? {
                Node::Open(e) if e.name == "test-suite" => {
                    let name = e.attr("fullname").or_else(|| e.attr("name"));
                    suites.push(name.unwrap_or(DEFAULT_SUITE).to_string());
                }
                Node::Open(e) if e.name == "test-case" => {
                    current = Some(start_case(&e, &suites));
                }
                Node::Leaf(e) if e.name == "test-case" => {
                    start_case(&e, &suites).finish_into(&mut result);
                }
                Node::Open(e) if e.name == "message" => capture = current.is_some(),
                Node::Text(text) if capture => {
                    if let Some(case) = current.as_mut() {
                        case.fill_message(&text);
                    }
                }
                Node::Close(name) => match name.as_str() {
                    "test-suite" => {
                        suites.pop();
                    }
                    "test-case" => {
                        if let Some(case) = current.take() {
                            case.finish_into(&mut result);
                        }
                        capture = false;
                    }
                    "message" => capture = false,
                    _ => {}
                },
                Node::Eof => break,
                _ => {}
            }
        }

        Ok(result)
    }
}

fn start_case(e: &Element, suites: &[String]) -> PendingCase {
    let suite = suites.last().map(String::as_str).unwrap_or(DEFAULT_SUITE);
    let raw_name = e.attr("name").unwrap_or_default();

    // NUnit 2 names cases by their full path.
    let name = raw_name
        .strip_prefix(suite)
        .and_then(|rest| rest.strip_prefix('.'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(raw_name);

    let verdict = verdict(e.attr("result").unwrap_or_default(), e.attr("label"));
    let mut case = PendingCase::new(suite, name, verdict);
    case.duration_ms = seconds_to_ms(e.attr("duration").or_else(|| e.attr("time")));
    case
}

fn verdict(result: &str, label: Option<&str>) -> Verdict {
    match (result, label) {
        ("Passed" | "Success", _) => Verdict::Passed,
        ("Failed", Some("Invalid")) | ("NotRunnable", _) => Verdict::Blocked,
        ("Failed" | "Failure" | "Error", _) => Verdict::Failed,
        ("Skipped" | "Ignored", _) => Verdict::Skipped,
        _ => Verdict::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nunit3_report() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" standalone="no"?>
<test-run id="0" testcasecount="4" result="Failed" total="4" passed="1" failed="2" skipped="1">
  <test-suite type="Assembly" name="Calc.Tests.dll" fullname="/tmp/Calc.Tests.dll">
    <test-suite type="TestFixture" name="MathTests" fullname="Calc.Tests.MathTests">
      <test-case id="1" name="Adds" fullname="Calc.Tests.MathTests.Adds" result="Passed" duration="0.010" />
      <test-case id="2" name="Divides" fullname="Calc.Tests.MathTests.Divides" result="Failed" duration="0.5">
        <failure>
          <message><![CDATA[Expected: 2 But was: 3]]></message>
          <stack-trace><![CDATA[at MathTests.Divides()]]></stack-trace>
        </failure>
      </test-case>
      <test-case id="3" name="Broken" result="Failed" label="Invalid">
        <reason><message><![CDATA[No suitable constructor]]></message></reason>
      </test-case>
      <test-case id="4" name="Later" result="Skipped" label="Ignored">
        <reason><message><![CDATA[Pending]]></message></reason>
      </test-case>
    </test-suite>
  </test-suite>
</test-run>"#;

        let result = NUnitCodec.parse(xml).unwrap();
        assert_eq!(result.suites.len(), 1);
        assert_eq!(result.suites[0].name, "Calc.Tests.MathTests");

        let cases = &result.suites[0].cases;
        assert_eq!(cases[0].verdict, Verdict::Passed);
        assert_eq!(cases[0].duration_ms, 10);
        assert_eq!(cases[1].verdict, Verdict::Failed);
        assert_eq!(cases[1].message.as_deref(), Some("Expected: 2 But was: 3"));
        assert_eq!(cases[2].verdict, Verdict::Blocked);
        assert_eq!(cases[3].verdict, Verdict::Skipped);
        assert_eq!(cases[3].message.as_deref(), Some("Pending"));
    }

    #[test]
    fn test_nunit2_report() {
        let xml = r#"<test-results name="Calc.Tests.dll" total="2" failures="1">
  <test-suite type="Assembly" name="Calc.Tests.dll">
    <results>
      <test-suite type="TestFixture" name="Calc.Tests.MathTests">
        <results>
          <test-case name="Calc.Tests.MathTests.Adds" executed="True" result="Success" success="True" time="0.021" />
          <test-case name="Calc.Tests.MathTests.Divides" executed="True" result="Failure" success="False" time="0.002">
            <failure><message><![CDATA[boom]]></message></failure>
          </test-case>
          <test-case name="Calc.Tests.MathTests.Ctor" executed="False" result="NotRunnable" />
          <test-case name="Calc.Tests.MathTests.Maybe" executed="True" result="Inconclusive" />
        </results>
      </test-suite>
    </results>
  </test-suite>
</test-results>"#;

        let result = NUnitCodec.parse(xml).unwrap();
        let cases = &result.suites[0].cases;

        assert_eq!(result.suites[0].name, "Calc.Tests.MathTests");
        assert_eq!(cases[0].name, "Adds");
        assert_eq!(cases[0].verdict, Verdict::Passed);
        assert_eq!(cases[0].duration_ms, 21);
        assert_eq!(cases[1].verdict, Verdict::Failed);
        assert_eq!(cases[1].message.as_deref(), Some("boom"));
        assert_eq!(cases[2].verdict, Verdict::Blocked);
        assert_eq!(cases[3].verdict, Verdict::Other);
    }
}
