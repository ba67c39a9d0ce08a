//! Canonical test result model
//!
//! Every result codec normalizes its wire format into this shape:
//! suites → test cases → verdicts.

use serde::{Deserialize, Serialize};

/// Format-independent test results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalResult {
    pub suites: Vec<SuiteResult>,
}

impl CanonicalResult {
    /// Total number of test cases across all suites
    pub fn case_count(&self) -> usize {
        self.suites.iter().map(|s| s.cases.len()).sum()
    }

    /// Returns the suite named `name`, appending an empty one if missing.
    pub fn suite_mut(&mut self, name: &str) -> &mut SuiteResult {
        let index = match self.suites.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.suites.push(SuiteResult {
                    name: name.to_string(),
                    cases: Vec::new(),
                });
                self.suites.len() - 1
            }
        };
        &mut self.suites[index]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteResult {
    pub name: String,
    pub cases: Vec<CaseResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    pub name: String,
    pub verdict: Verdict,
    pub duration_ms: i64,
    pub message: Option<String>,
}

/// Outcome of a single test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Passed,
    Failed,
    Blocked,
    Skipped,
    Other,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Passed => "Passed",
            Verdict::Failed => "Failed",
            Verdict::Blocked => "Blocked",
            Verdict::Skipped => "Skipped",
            Verdict::Other => "Other",
        }
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Passed" => Ok(Verdict::Passed),
            "Failed" => Ok(Verdict::Failed),
            "Blocked" => Ok(Verdict::Blocked),
            "Skipped" => Ok(Verdict::Skipped),
            "Other" => Ok(Verdict::Other),
            other => Err(format!("unknown verdict: {other}")),
        }
    }
}

/// Test result encodings the orchestrator can ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    /// JUnit / Ant style XML (`<testsuites>` / `<testsuite>`)
    JUnit,
    /// xUnit.net v2 XML (`<assemblies>`)
    XUnit,
    /// NUnit 3 (`<test-run>`) and NUnit 2 (`<test-results>`) XML
    NUnit,
    /// Visual Studio / MSTest `.trx`
    Trx,
    /// Common Test Report Format JSON
    Ctrf,
}

impl ResultFormat {
    pub const ALL: [ResultFormat; 5] = [
        ResultFormat::JUnit,
        ResultFormat::XUnit,
        ResultFormat::NUnit,
        ResultFormat::Trx,
        ResultFormat::Ctrf,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResultFormat::JUnit => "junit",
            ResultFormat::XUnit => "xunit",
            ResultFormat::NUnit => "nunit",
            ResultFormat::Trx => "trx",
            ResultFormat::Ctrf => "ctrf",
        }
    }
}

impl std::fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResultFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        ResultFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == lowered)
            .ok_or_else(|| format!("unknown result format: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suite_mut_reuses_existing_suite() {
        let mut result = CanonicalResult::default();
        result.suite_mut("math").cases.push(CaseResult {
            name: "adds".to_string(),
            verdict: Verdict::Passed,
            duration_ms: 3,
            message: None,
        });
        result.suite_mut("math").cases.push(CaseResult {
            name: "divides".to_string(),
            verdict: Verdict::Failed,
            duration_ms: 1,
            message: Some("division by zero".to_string()),
        });

        assert_eq!(result.suites.len(), 1);
        assert_eq!(result.case_count(), 2);
    }

    #[test]
    fn test_result_format_parse_is_case_insensitive() {
        assert_eq!("JUnit".parse::<ResultFormat>().unwrap(), ResultFormat::JUnit);
        assert_eq!("TRX".parse::<ResultFormat>().unwrap(), ResultFormat::Trx);
        assert!("tap".parse::<ResultFormat>().is_err());
    }

    #[test]
    fn test_result_format_serializes_lowercase() {
        let json = serde_json::to_string(&ResultFormat::NUnit).unwrap();
        assert_eq!(json, "\"nunit\"");
    }
}
