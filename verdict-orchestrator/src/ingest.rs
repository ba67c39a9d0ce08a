//! Artifact archive extraction
//!
//! Reads an uploaded zip entirely in memory and returns the entries whose
//! paths match the job's artifact patterns, in archive order. This is
//! blocking work; callers run it on the blocking pool.

use std::io::{Read, Seek};
use verdict_core::pattern::PatternSet;
use zip::ZipArchive;
use zip::result::ZipError;

/// Entries larger than this are reported as failed instead of read.
pub const MAX_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("artifact is not a readable zip archive: {0}")]
    Unreadable(#[from] ZipError),
}

#[derive(Debug)]
pub struct MatchedEntry {
    pub path: String,
    pub data: std::io::Result<Vec<u8>>,
}

pub fn extract_matching<R>(reader: R, patterns: &PatternSet) -> Result<Vec<MatchedEntry>, ArchiveError>
where
    R: Read + Seek,
{
    let mut archive = ZipArchive::new(reader)?;
    let mut matched = Vec::new();

    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }

        let path = file.name().to_string();
        if !patterns.is_match(&path) {
            continue;
        }

        let data = read_limited(&mut file);
        matched.push(MatchedEntry { path, data });
    }

    Ok(matched)
}

fn read_limited(file: &mut impl Read) -> std::io::Result<Vec<u8>> {
    let mut data = Vec::new();
    file.take(MAX_ENTRY_BYTES + 1).read_to_end(&mut data)?;
    if data.len() as u64 > MAX_ENTRY_BYTES {
        return Err(std::io::Error::other(format!(
            "entry is larger than {} bytes",
            MAX_ENTRY_BYTES
        )));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .add_directory("reports/", SimpleFileOptions::default())
            .unwrap();
        for (name, content) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_returns_matching_entries_in_order() {
        let bytes = archive(&[
            ("reports/b.xml", "<testsuites/>"),
            ("reports/a.xml", "<testsuite/>"),
            ("logs/build.log", "noise"),
            ("reports/ignored.xml", "<testsuites/>"),
        ]);
        let patterns = PatternSet::new(["**/*.xml", "!**/ignored.xml"]).unwrap();

        let entries = extract_matching(Cursor::new(bytes), &patterns).unwrap();

        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["reports/b.xml", "reports/a.xml"]);
        assert_eq!(entries[0].data.as_ref().unwrap(), b"<testsuites/>");
    }

    #[test]
    fn test_directories_are_skipped() {
        let bytes = archive(&[]);
        let patterns = PatternSet::new(["**"]).unwrap();
        let entries = extract_matching(Cursor::new(bytes), &patterns).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_garbage_is_unreadable() {
        let patterns = PatternSet::new(["**/*.xml"]).unwrap();
        let err = extract_matching(Cursor::new(b"definitely not a zip".to_vec()), &patterns)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Unreadable(_)));
    }
}
