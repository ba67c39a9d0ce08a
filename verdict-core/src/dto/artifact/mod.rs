//! Artifact upload DTOs

use serde::{Deserialize, Serialize};

use crate::domain::result::ResultFormat;
use crate::dto::test_run::ImportSummary;

/// What happened to one matched archive entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum EntryOutcome {
    /// Parsed and merged into the test run
    Imported {
        format: ResultFormat,
        summary: ImportSummary,
    },
    /// No codec recognizes the entry
    Unsupported,
    /// The entry claimed a format but could not be parsed
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryReport {
    pub path: String,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

/// Aggregate report for one artifact upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub test_run_id: i64,
    pub entries: Vec<EntryReport>,
    pub imported: u32,
    pub unsupported: u32,
    pub failed: u32,
    pub totals: ImportSummary,
}

impl IngestReport {
    pub fn new(test_run_id: i64) -> Self {
        Self {
            test_run_id,
            ..Default::default()
        }
    }

    /// Record the outcome for one entry and fold it into the counters.
    pub fn record(&mut self, path: impl Into<String>, outcome: EntryOutcome) {
        match &outcome {
            EntryOutcome::Imported { summary, .. } => {
                self.imported += 1;
                self.totals += *summary;
            }
            EntryOutcome::Unsupported => self.unsupported += 1,
            EntryOutcome::Failed { .. } => self.failed += 1,
        }
        self.entries.push(EntryReport {
            path: path.into(),
            outcome,
        });
    }

    /// Number of archive entries that matched the artifact patterns
    pub fn matched(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates_counters() {
        let mut report = IngestReport::new(7);
        report.record(
            "a.xml",
            EntryOutcome::Imported {
                format: ResultFormat::JUnit,
                summary: ImportSummary {
                    created: 2,
                    updated: 1,
                    skipped: 0,
                },
            },
        );
        report.record("b.bin", EntryOutcome::Unsupported);
        report.record(
            "c.xml",
            EntryOutcome::Failed {
                error: "unexpected end of file".to_string(),
            },
        );

        assert_eq!(report.matched(), 3);
        assert_eq!(report.imported, 1);
        assert_eq!(report.unsupported, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.totals.created, 2);
        assert_eq!(report.totals.updated, 1);
    }

    #[test]
    fn test_entry_report_wire_format() {
        let entry = EntryReport {
            path: "x.xml".to_string(),
            outcome: EntryOutcome::Unsupported,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["path"], "x.xml");
        assert_eq!(json["outcome"], "unsupported");
    }
}
