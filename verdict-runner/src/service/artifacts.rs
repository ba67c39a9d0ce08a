//! Artifact collection
//!
//! Walks a job workspace, keeps the files selected by the job's artifact
//! patterns and packs them into a zip archive for upload.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;
use verdict_core::pattern::{DEFAULT_ARTIFACT_PATTERNS, PatternSet};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Compile a job's artifact patterns, falling back to the defaults
pub fn job_patterns(patterns: &[String]) -> Result<PatternSet> {
    let set = if patterns.is_empty() {
        PatternSet::new(DEFAULT_ARTIFACT_PATTERNS)
    } else {
        PatternSet::new(patterns)
    };
    set.context("Invalid artifact pattern")
}

/// A packed artifact archive
#[derive(Debug)]
pub struct ArtifactArchive {
    pub files: usize,
    pub bytes: Vec<u8>,
}

/// Zip every file under `root` whose relative path matches `patterns`.
///
/// Returns `None` when nothing matched.
pub fn collect_artifacts(root: &Path, patterns: &PatternSet) -> Result<Option<ArtifactArchive>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut files = 0;

    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .context("Workspace entry outside the workspace root")?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if !patterns.is_match(&name) {
            continue;
        }

        debug!("Collecting artifact: {}", name);
        writer
            .start_file(name.as_str(), options)
            .with_context(|| format!("Failed to add {} to archive", name))?;
        let mut file =
            File::open(entry.path()).with_context(|| format!("Failed to open {}", name))?;
        std::io::copy(&mut file, &mut writer)
            .with_context(|| format!("Failed to read {}", name))?;
        files += 1;
    }

    if files == 0 {
        return Ok(None);
    }

    let cursor = writer.finish().context("Failed to finish archive")?;
    Ok(Some(ArtifactArchive {
        files,
        bytes: cursor.into_inner(),
    }))
}
