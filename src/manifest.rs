#![forbid(unsafe_code)]

//! Line-oriented manifest files: `<ISO8601 timestamp> <url>` per line.
//!
//! The manifest doubles as the resume checkpoint for a scope, so writes go
//! through a temporary sibling and a rename; a reader never observes half a
//! file at the final path.

use std::fs;
use std::path::Path;

use crate::error::{ArchiveError, Result};
use crate::model::{VideoEntry, parse_timestamp};

/// Renders the manifest body. Every line, including the last, ends with `\n`.
pub fn render(entries: &[VideoEntry]) -> String {
    let mut body = String::new();
    for entry in entries {
        body.push_str(&entry.timestamp_string());
        body.push(' ');
        body.push_str(&entry.url);
        body.push('\n');
    }
    body
}

/// Writes `entries` to `path`, creating parent directories as needed.
pub fn write(path: &Path, entries: &[VideoEntry]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, render(entries))?;
    fs::rename(&tmp_path, path)?;
    tracing::debug!(path = %path.display(), entries = entries.len(), "manifest written");
    Ok(())
}

/// Parses a manifest body. Blank lines are ignored; lines that do not split
/// into a timestamp and a URL, or whose timestamp does not parse, are logged
/// and skipped.
pub fn parse(content: &str) -> Vec<VideoEntry> {
    let mut entries = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Some((timestamp, url)) = trimmed.split_once(char::is_whitespace) else {
            tracing::warn!(line = index + 1, content = trimmed, "skipping invalid manifest line");
            continue;
        };
        let url = url.trim_start();
        if timestamp.is_empty() || url.is_empty() {
            tracing::warn!(line = index + 1, content = trimmed, "skipping invalid manifest line");
            continue;
        }

        match parse_timestamp(timestamp) {
            Some(published_at) => entries.push(VideoEntry::new(published_at, url)),
            None => {
                tracing::warn!(
                    line = index + 1,
                    content = trimmed,
                    "skipping manifest line with unreadable timestamp"
                );
            }
        }
    }
    entries
}

/// Loads a previously written manifest for resuming a batch.
pub fn read(path: &Path) -> Result<Vec<VideoEntry>> {
    if !path.exists() {
        return Err(ArchiveError::NotFound(format!(
            "video list not found: {}",
            path.display()
        )));
    }
    let content = fs::read_to_string(path)?;
    Ok(parse(&content))
}
