//! Result codecs
//!
//! Each codec turns one test-report encoding into a [`CanonicalResult`].
//! The registry picks a codec per file: an explicit format hint wins,
//! otherwise the file extension and, for XML, the document element decide.

pub mod ctrf;
pub mod junit;
pub mod nunit;
pub mod trx;
pub mod xml;
pub mod xunit;

use std::collections::HashMap;
use verdict_core::domain::result::{CanonicalResult, CaseResult, ResultFormat, Verdict};

/// Suite name used when a report does not name one
pub const DEFAULT_SUITE: &str = "default";

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed {format} report: {reason}")]
    Malformed {
        format: ResultFormat,
        reason: String,
    },

    #[error("no codec registered for {0}")]
    Unsupported(ResultFormat),
}

pub trait ResultCodec: Send + Sync {
    fn format(&self) -> ResultFormat;

    fn parse(&self, content: &str) -> Result<CanonicalResult, CodecError>;
}

pub struct CodecRegistry {
    codecs: HashMap<ResultFormat, Box<dyn ResultCodec>>,
}

impl CodecRegistry {
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Registers a codec, replacing any codec for the same format.
    pub fn register(&mut self, codec: Box<dyn ResultCodec>) {
        self.codecs.insert(codec.format(), codec);
    }

    pub fn supports(&self, format: ResultFormat) -> bool {
        self.codecs.contains_key(&format)
    }

    /// Decides which format a file is in, or `None` when no codec applies.
    pub fn detect(
        &self,
        filename: &str,
        content: &str,
        hint: Option<ResultFormat>,
    ) -> Option<ResultFormat> {
        let format = match hint {
            Some(format) => Some(format),
            None => sniff(filename, content),
        };
        format.filter(|f| self.supports(*f))
    }

    pub fn parse(&self, format: ResultFormat, content: &str) -> Result<CanonicalResult, CodecError> {
        let codec = self
            .codecs
            .get(&format)
            .ok_or(CodecError::Unsupported(format))?;
        codec.parse(content)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(junit::JUnitCodec));
        registry.register(Box::new(xunit::XUnitCodec));
        registry.register(Box::new(nunit::NUnitCodec));
        registry.register(Box::new(trx::TrxCodec));
        registry.register(Box::new(ctrf::CtrfCodec));
        registry
    }
}

fn sniff(filename: &str, content: &str) -> Option<ResultFormat> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "trx" => Some(ResultFormat::Trx),
        "json" if content.contains("\"results\"") => Some(ResultFormat::Ctrf),
        "xml" => match xml::root_element(content)?.as_str() {
            "testsuites" | "testsuite" => Some(ResultFormat::JUnit),
            "assemblies" | "assembly" => Some(ResultFormat::XUnit),
            "test-run" | "test-results" => Some(ResultFormat::NUnit),
            "TestRun" => Some(ResultFormat::Trx),
            _ => None,
        },
        _ => None,
    }
}

/// A test case being assembled while a codec walks its input
#[derive(Debug, Clone)]
pub(crate) struct PendingCase {
    pub suite: String,
    pub name: String,
    pub verdict: Verdict,
    pub duration_ms: i64,
    pub message: Option<String>,
}

impl PendingCase {
    pub fn new(suite: impl Into<String>, name: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            suite: suite.into(),
            name: name.into(),
            verdict,
            duration_ms: 0,
            message: None,
        }
    }

    /// Keeps the first non-blank message.
    pub fn fill_message(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() || self.message.as_deref().is_some_and(|m| !m.is_empty()) {
            return;
        }
        self.message = Some(text.to_string());
    }

    pub fn finish_into(self, result: &mut CanonicalResult) {
        let suite = match self.suite.trim() {
            "" => DEFAULT_SUITE,
            suite => suite,
        };
        result.suite_mut(suite).cases.push(CaseResult {
            name: self.name,
            verdict: self.verdict,
            duration_ms: self.duration_ms,
            message: self.message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_wins_over_content() {
        let registry = CodecRegistry::default();
        let detected = registry.detect(
            "report.xml",
            "<testsuites/>",
            Some(ResultFormat::NUnit),
        );
        assert_eq!(detected, Some(ResultFormat::NUnit));
    }

    #[test]
    fn test_detect_by_extension_and_root() {
        let registry = CodecRegistry::default();
        let cases = [
            ("a/results.trx", "", Some(ResultFormat::Trx)),
            ("ctrf/report.JSON", r#"{"results":{"tests":[]}}"#, Some(ResultFormat::Ctrf)),
            ("package.json", r#"{"name":"x"}"#, None),
            ("junit.xml", "<?xml version=\"1.0\"?><testsuites/>", Some(ResultFormat::JUnit)),
            ("single.xml", "<testsuite name=\"a\"/>", Some(ResultFormat::JUnit)),
            ("xunit.xml", "<assemblies/>", Some(ResultFormat::XUnit)),
            ("nunit3.xml", "<test-run/>", Some(ResultFormat::NUnit)),
            ("nunit2.xml", "<test-results/>", Some(ResultFormat::NUnit)),
            ("mstest.xml", "<TestRun/>", Some(ResultFormat::Trx)),
            ("pom.xml", "<project/>", None),
            ("notes.txt", "<testsuites/>", None),
        ];

        for (name, content, expected) in cases {
            assert_eq!(registry.detect(name, content, None), expected, "{name}");
        }
    }

    #[test]
    fn test_unregistered_format_is_not_detected() {
        let mut registry = CodecRegistry::empty();
        registry.register(Box::new(junit::JUnitCodec));

        assert_eq!(registry.detect("x.trx", "", None), None);
        assert!(matches!(
            registry.parse(ResultFormat::Trx, ""),
            Err(CodecError::Unsupported(ResultFormat::Trx))
        ));
    }

    #[test]
    fn test_pending_case_defaults_blank_suite() {
        let mut result = CanonicalResult::default();
        let mut case = PendingCase::new("  ", "works", Verdict::Passed);
        case.fill_message("   ");
        case.fill_message("first");
        case.fill_message("second");
        case.finish_into(&mut result);

        assert_eq!(result.suites[0].name, DEFAULT_SUITE);
        assert_eq!(result.suites[0].cases[0].message.as_deref(), Some("first"));
    }
}
