//! Visual Studio / MSTest TRX reports
//!
//! Results and test definitions are separate lists joined by test id;
//! the owning class of a result comes from its definition.

use std::collections::HashMap;
use verdict_core::domain::result::{CanonicalResult, ResultFormat, Verdict};

use super::xml::{Element, Node, XmlReader, timespan_to_ms};
use super::{CodecError, DEFAULT_SUITE, PendingCase, ResultCodec};

pub struct TrxCodec;

impl ResultCodec for TrxCodec {
    fn format(&self) -> ResultFormat {
        ResultFormat::Trx
    }

    fn parse(&self, content: &str) -> Result<CanonicalResult, CodecError> {
        let mut reader = XmlReader::new(ResultFormat::Trx, content);
        let mut results: Vec<(String, PendingCase)> = Vec::new();
        let mut classes: HashMap<String, String> = HashMap::new();
        let mut current: Option<(String, PendingCase)> = None;
        let mut definition: Option<String> = None;
        let mut capture = false;

        loop {
            match reader.next()? {
                Node::Open(e) if e.name == "UnitTestResult" => current = Some(start_result(&e)),
                Node::Leaf(e) if e.name == "UnitTestResult" => results.push(start_result(&e)),
                Node::Open(e) if e.name == "UnitTest" => {
                    definition = e.attr("id").map(str::to_string);
                }
                Node::Open(e) | Node::Leaf(e) if e.name == "TestMethod" => {
                    if let (Some(id), Some(class)) = (&definition, e.attr("className")) {
                        classes.insert(id.clone(), strip_assembly(class).to_string());
                    }
                }
                Node::Open(e) if e.name == "Message" => capture = current.is_some(),
                Node::Text(text) if capture => {
                    if let Some((_, case)) = current.as_mut() {
                        case.fill_message(&text);
                    }
                }
                Node::Close(name) => match name.as_str() {
                    "UnitTestResult" => {
                        results.extend(current.take());
                        capture = false;
                    }
                    "UnitTest" => definition = None,
                    "Message" => capture = false,
                    _ => {}
                },
                Node::Eof => break,
                _ => {}
            }
        }

        let mut result = CanonicalResult::default();
        for (test_id, mut case) in results {
            if let Some(class) = classes.get(&test_id) {
                case.suite = class.clone();
            }
            case.finish_into(&mut result);
        }
        Ok(result)
    }
}

fn start_result(e: &Element) -> (String, PendingCase) {
    let verdict = match e.attr("outcome").unwrap_or_default() {
        "Passed" => Verdict::Passed,
        "Failed" | "Error" | "Timeout" => Verdict::Failed,
        "Aborted" => Verdict::Blocked,
        "NotExecuted" => Verdict::Skipped,
        _ => Verdict::Other,
    };

    let mut case = PendingCase::new(
        DEFAULT_SUITE,
        e.attr("testName").unwrap_or_default(),
        verdict,
    );
    case.duration_ms = timespan_to_ms(e.attr("duration"));
    (e.attr("testId").unwrap_or_default().to_string(), case)
}

/// `"Ns.Class, Assembly, Version=1.0"` names the class `Ns.Class`.
fn strip_assembly(class_name: &str) -> &str {
    class_name
        .split_once(',')
        .map(|(class, _)| class)
        .unwrap_or(class_name)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TestRun id="run-1" name="nightly" xmlns="http://microsoft.com/schemas/VisualStudio/TeamTest/2010">
  <Results>
    <UnitTestResult executionId="e1" testId="t1" testName="Adds" duration="00:00:00.0150000" outcome="Passed" />
    <UnitTestResult executionId="e2" testId="t2" testName="Divides" duration="00:00:01.2500000" outcome="Failed">
      <Output>
        <ErrorInfo>
          <Message>Assert.AreEqual failed. Expected:&lt;2&gt;. Actual:&lt;3&gt;.</Message>
          <StackTrace>at MathTests.Divides()</StackTrace>
        </ErrorInfo>
      </Output>
    </UnitTestResult>
    <UnitTestResult executionId="e3" testId="t3" testName="Later" outcome="NotExecuted" />
    <UnitTestResult executionId="e4" testId="t4" testName="Orphan" outcome="Inconclusive" />
  </Results>
  <TestDefinitions>
    <UnitTest name="Adds" id="t1"><TestMethod className="Calc.MathTests, Calc.Tests, Version=1.0.0.0" name="Adds" /></UnitTest>
    <UnitTest name="Divides" id="t2"><TestMethod className="Calc.MathTests, Calc.Tests" name="Divides" /></UnitTest>
    <UnitTest name="Later" id="t3"><TestMethod className="Calc.OtherTests" name="Later" /></UnitTest>
  </TestDefinitions>
</TestRun>"#;

    #[test]
    fn test_joins_results_with_definitions() {
        let result = TrxCodec.parse(REPORT).unwrap();

        let names: Vec<&str> = result.suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Calc.MathTests", "Calc.OtherTests", DEFAULT_SUITE]);

        let math = &result.suites[0].cases;
        assert_eq!(math[0].verdict, Verdict::Passed);
        assert_eq!(math[0].duration_ms, 15);
        assert_eq!(math[1].verdict, Verdict::Failed);
        assert_eq!(math[1].duration_ms, 1250);
        assert_eq!(
            math[1].message.as_deref(),
            Some("Assert.AreEqual failed. Expected:<2>. Actual:<3>.")
        );

        assert_eq!(result.suites[1].cases[0].verdict, Verdict::Skipped);
        assert_eq!(result.suites[2].cases[0].verdict, Verdict::Other);
    }
}
