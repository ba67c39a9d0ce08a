//! Ordered glob pattern lists with negation
//!
//! Patterns are evaluated the way `.gitignore` treats exclusions: a path is
//! selected when at least one positive pattern matches it and no `!` pattern
//! does. A negated match always excludes, regardless of pattern order.

use glob::{MatchOptions, Pattern, PatternError};

/// Patterns applied when a job does not declare its own
pub const DEFAULT_ARTIFACT_PATTERNS: &[&str] = &["**/*.xml", "**/*.trx", "**/*.json"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled list of include/exclude glob patterns
#[derive(Debug, Clone)]
pub struct PatternSet {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl PatternSet {
    /// Compile `patterns`; entries starting with `!` are exclusions.
    ///
    /// Blank entries are ignored.
    pub fn new<I, S>(patterns: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut include = Vec::new();
        let mut exclude = Vec::new();

        for raw in patterns {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            match raw.strip_prefix('!') {
                Some(negated) => exclude.push(Pattern::new(negated.trim_start_matches('/'))?),
                None => include.push(Pattern::new(raw.trim_start_matches('/'))?),
            }
        }

        Ok(Self { include, exclude })
    }

    /// Whether `path` is selected by this set.
    ///
    /// Backslashes are normalized to `/` so archive entries written on Windows match too.
    pub fn is_match(&self, path: &str) -> bool {
        let normalized = path.replace('\\', "/");
        let path = normalized.trim_start_matches('/');

        if self.exclude.iter().any(|p| p.matches_with(path, MATCH_OPTIONS)) {
            return false;
        }

        self.include.iter().any(|p| p.matches_with(path, MATCH_OPTIONS))
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
    }
}
