//! Common Test Report Format (CTRF) JSON

use serde::Deserialize;
use verdict_core::domain::result::{CanonicalResult, ResultFormat, Verdict};

use super::{CodecError, DEFAULT_SUITE, PendingCase, ResultCodec};

pub struct CtrfCodec;

#[derive(Deserialize)]
struct Report {
    results: Results,
}

#[derive(Deserialize)]
struct Results {
    tool: Option<Tool>,
    #[serde(default)]
    tests: Vec<Test>,
}

#[derive(Deserialize)]
struct Tool {
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Test {
    name: String,
    status: String,
    #[serde(default)]
    duration: f64,
    message: Option<String>,
    suite: Option<SuitePath>,
    file_path: Option<String>,
}

/// `suite` is either a single name or a path of nested names.
#[derive(Deserialize)]
#[serde(untagged)]
enum SuitePath {
    Name(String),
    Path(Vec<String>),
}

impl SuitePath {
    fn joined(&self) -> String {
        match self {
            SuitePath::Name(name) => name.clone(),
            SuitePath::Path(parts) => parts.join(" > "),
        }
    }
}

impl ResultCodec for CtrfCodec {
    fn format(&self) -> ResultFormat {
        ResultFormat::Ctrf
    }

    fn parse(&self, content: &str) -> Result<CanonicalResult, CodecError> {
        let report: Report = serde_json::from_str(content).map_err(|e| CodecError::Malformed {
            format: ResultFormat::Ctrf,
            reason: e.to_string(),
        })?;

        let tool = report.results.tool.and_then(|t| t.name);
        let mut result = CanonicalResult::default();

        for test in report.results.tests {
            let suite = test
                .suite
                .as_ref()
                .map(SuitePath::joined)
                .filter(|s| !s.is_empty())
                .or(test.file_path)
                .or_else(|| tool.clone())
                .unwrap_or_else(|| DEFAULT_SUITE.to_string());

            let verdict = match test.status.as_str() {
                "passed" => Verdict::Passed,
                "failed" => Verdict::Failed,
                "skipped" | "pending" => Verdict::Skipped,
                _ => Verdict::Other,
            };

            let mut case = PendingCase::new(suite, test.name, verdict);
            if test.duration.is_finite() && test.duration > 0.0 {
                case.duration_ms = test.duration.round() as i64;
            }
            if let Some(message) = &test.message {
                case.fill_message(message);
            }
            case.finish_into(&mut result);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_ctrf_report() {
        let json = r#"{
  "results": {
    "tool": { "name": "jest" },
    "summary": { "tests": 4, "passed": 1, "failed": 1, "skipped": 1, "pending": 0, "other": 1 },
    "tests": [
      { "name": "adds", "status": "passed", "duration": 12.4, "suite": ["math", "adder"] },
      { "name": "divides", "status": "failed", "duration": 3, "message": "expected 2", "filePath": "src/math.test.ts" },
      { "name": "later", "status": "skipped", "duration": 0, "suite": "math > adder" },
      { "name": "flaky", "status": "other", "duration": 1 }
    ]
  }
}"#;

        let result = CtrfCodec.parse(json).unwrap();
        let names: Vec<&str> = result.suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["math > adder", "src/math.test.ts", "jest"]);

        let adder = &result.suites[0].cases;
        assert_eq!(adder.len(), 2);
        assert_eq!(adder[0].duration_ms, 12);
        assert_eq!(adder[1].verdict, Verdict::Skipped);

        let failed = &result.suites[1].cases[0];
        assert_eq!(failed.verdict, Verdict::Failed);
        assert_eq!(failed.message.as_deref(), Some("expected 2"));

        assert_eq!(result.suites[2].cases[0].verdict, Verdict::Other);
    }

    #[test]
    fn test_missing_results_is_malformed() {
        let err = CtrfCodec.parse(r#"{"tests": []}"#).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Malformed {
                format: ResultFormat::Ctrf,
                ..
            }
        ));
    }
}
