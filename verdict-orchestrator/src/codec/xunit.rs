//! xUnit.net v2 XML reports

use verdict_core::domain::result::{CanonicalResult, ResultFormat, Verdict};

use super::xml::{Element, Node, XmlReader, seconds_to_ms};
use super::{CodecError, DEFAULT_SUITE, PendingCase, ResultCodec};

pub struct XUnitCodec;

impl ResultCodec for XUnitCodec {
    fn format(&self) -> ResultFormat {
        ResultFormat::XUnit
    }

    fn parse(&self, content: &str) -> Result<CanonicalResult, CodecError> {
        let mut reader = XmlReader::new(ResultFormat::XUnit, content);
        let mut result = CanonicalResult::default();
        let mut current: Option<PendingCase> = None;
        let mut capture = false;

        loop {
            match reader.next()? {
                Node::Open(e) if e.name == "test" => current = Some(start_case(&e)),
                Node::Leaf(e) if e.name == "test" => start_case(&e).finish_into(&mut result),
                Node::Open(e) if e.name == "message" || e.name == "reason" => {
                    capture = current.is_some();
                }
                Node::Text(text) if capture => {
                    if let Some(case) = current.as_mut() {
                        case.fill_message(&text);
                    }
                }
                Node::Close(name) => match name.as_str() {
                    "test" => {
                        if let Some(case) = current.take() {
                            case.finish_into(&mut result);
                        }
                        capture = false;
                    }
                    "message" | "reason" => capture = false,
                    _ => {}
                },
                Node::Eof => break,
                _ => {}
            }
        }

        Ok(result)
    }
}

fn start_case(e: &Element) -> PendingCase {
    let suite = e.attr("type").unwrap_or(DEFAULT_SUITE);
    let full_name = e.attr("name").unwrap_or_default();

    // "Ns.Class.Method" under type "Ns.Class" is reported as "Method".
    let name = full_name
        .strip_prefix(suite)
        .and_then(|rest| rest.strip_prefix('.'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(full_name);

    let verdict = match e.attr("result").unwrap_or_default() {
        "Pass" => Verdict::Passed,
        "Fail" => Verdict::Failed,
        "Skip" | "NotRun" => Verdict::Skipped,
        _ => Verdict::Other,
    };

    let mut case = PendingCase::new(suite, name, verdict);
    case.duration_ms = seconds_to_ms(e.attr("time"));
    case
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<assemblies timestamp="01/01/2024 10:00:00">
  <assembly name="Calc.Tests.dll" total="3" passed="1" failed="1" skipped="1">
    <collection name="Test collection for Calc.Tests.MathTests">
      <test name="Calc.Tests.MathTests.Adds" type="Calc.Tests.MathTests" method="Adds" time="0.0040000" result="Pass" />
      <test name="Calc.Tests.MathTests.Divides" type="Calc.Tests.MathTests" method="Divides" time="0.25" result="Fail">
        <failure exception-type="System.DivideByZeroException">
          <message><![CDATA[Attempted to divide by zero.]]></message>
          <stack-trace><![CDATA[at Calc.Divide()]]></stack-trace>
        </failure>
      </test>
      <test name="Display name" type="Calc.Tests.MathTests" method="Later" time="0" result="Skip">
        <reason><![CDATA[Not implemented]]></reason>
      </test>
    </collection>
  </assembly>
</assemblies>"#;

    #[test]
    fn test_parses_results_by_type() {
        let result = XUnitCodec.parse(REPORT).unwrap();

        assert_eq!(result.suites.len(), 1);
        assert_eq!(result.suites[0].name, "Calc.Tests.MathTests");

        let cases = &result.suites[0].cases;
        assert_eq!(cases[0].name, "Adds");
        assert_eq!(cases[0].verdict, Verdict::Passed);
        assert_eq!(cases[0].duration_ms, 4);

        assert_eq!(cases[1].verdict, Verdict::Failed);
        assert_eq!(
            cases[1].message.as_deref(),
            Some("Attempted to divide by zero.")
        );

        assert_eq!(cases[2].name, "Display name");
        assert_eq!(cases[2].verdict, Verdict::Skipped);
        assert_eq!(cases[2].message.as_deref(), Some("Not implemented"));
    }

    #[test]
    fn test_malformed_attribute_is_rejected() {
        let err = XUnitCodec
            .parse(r#"<assemblies><assembly><test name="a result="Pass"/></assembly></assemblies>"#)
            .unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }
}
