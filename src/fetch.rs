#![forbid(unsafe_code)]

//! Sequential batch download: one entry at a time, invoke the downloader with
//! bounded retry, find the produced file, then stamp it with the publish time.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::downloader::Downloader;
use crate::error::{ArchiveError, Result};
use crate::file_resolver::{self, DirSnapshot};
use crate::model::{DownloadOptions, DownloadTarget, VideoEntry};
use crate::timestamps::{self, TimestampWriter};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Fixed-delay retry bound for a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// What happened to one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Downloaded and the produced file carries the publish time.
    Normalized(PathBuf),
    /// Downloaded, but writing the timestamps failed.
    TimestampSkipped(PathBuf),
    /// The downloader succeeded without producing a new file.
    NoNewFile,
    /// Every attempt failed.
    Failed { attempts: u32 },
}

/// Tally for a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    pub normalized: Vec<PathBuf>,
    pub timestamp_skipped: Vec<PathBuf>,
    pub no_new_file: Vec<String>,
    pub failed: Vec<String>,
}

impl BatchReport {
    fn record(&mut self, entry: &VideoEntry, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::Normalized(path) => self.normalized.push(path),
            EntryOutcome::TimestampSkipped(path) => self.timestamp_skipped.push(path),
            EntryOutcome::NoNewFile => self.no_new_file.push(entry.url.clone()),
            EntryOutcome::Failed { .. } => self.failed.push(entry.url.clone()),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.normalized.len() + self.timestamp_skipped.len() + self.no_new_file.len()
    }

    pub fn print_summary(&self) {
        println!();
        println!(
            "Processed {} video(s): {} downloaded, {} already present, {} failed",
            self.total,
            self.normalized.len() + self.timestamp_skipped.len(),
            self.no_new_file.len(),
            self.failed.len()
        );
        for url in &self.failed {
            println!("  Failed: {url}");
        }
    }
}

pub struct FetchOrchestrator<'a> {
    downloader: &'a dyn Downloader,
    timestamps: &'a dyn TimestampWriter,
    retry: RetryPolicy,
}

impl<'a> FetchOrchestrator<'a> {
    pub fn new(downloader: &'a dyn Downloader, timestamps: &'a dyn TimestampWriter) -> Self {
        Self {
            downloader,
            timestamps,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Processes `entries` in order. A failing entry is reported and skipped;
    /// only failing to create `output_dir` aborts the batch.
    pub fn fetch_all(
        &self,
        entries: &[VideoEntry],
        output_dir: &Path,
        options: &DownloadOptions,
    ) -> Result<BatchReport> {
        fs::create_dir_all(output_dir)?;

        let mut report = BatchReport {
            total: entries.len(),
            ..BatchReport::default()
        };
        for (index, entry) in entries.iter().enumerate() {
            println!("[{}/{}] Processing {}...", index + 1, entries.len(), entry.url);
            let outcome = self.fetch_entry(entry, output_dir, options);
            if let EntryOutcome::Failed { attempts } = outcome {
                let err = ArchiveError::DownloadFailed {
                    url: entry.url.clone(),
                    attempts,
                };
                eprintln!("Failed to process {}: {}", entry.url, err);
            }
            report.record(entry, outcome);
        }
        Ok(report)
    }

    /// Downloads one entry and normalizes the produced file. `output_dir`
    /// must already exist.
    pub fn fetch_entry(
        &self,
        entry: &VideoEntry,
        output_dir: &Path,
        options: &DownloadOptions,
    ) -> EntryOutcome {
        let target = DownloadTarget {
            entry: entry.clone(),
            output_dir: output_dir.to_path_buf(),
            format: options.format,
        };

        let before = DirSnapshot::capture(output_dir);
        if let Err(attempts) = self.download_with_retry(&target, options) {
            return EntryOutcome::Failed { attempts };
        }

        let Some(path) = file_resolver::resolve(output_dir, &before, target.format) else {
            tracing::warn!(
                url = %entry.url,
                "no new file detected (file might already exist), leaving timestamps alone"
            );
            return EntryOutcome::NoNewFile;
        };

        if timestamps::normalize(self.timestamps, &path, entry.published_at) {
            EntryOutcome::Normalized(path)
        } else {
            EntryOutcome::TimestampSkipped(path)
        }
    }

    /// `Err` carries the number of attempts made.
    fn download_with_retry(
        &self,
        target: &DownloadTarget,
        options: &DownloadOptions,
    ) -> std::result::Result<u32, u32> {
        let max_attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self.downloader.download(target, options) {
                Ok(true) => return Ok(attempt),
                Ok(false) => {
                    tracing::warn!(url = %target.entry.url, attempt, "downloader exited with failure");
                }
                Err(err) => {
                    tracing::warn!(url = %target.entry.url, attempt, error = %err, "could not run downloader");
                }
            }

            if attempt < max_attempts {
                println!(
                    "Download failed, retrying in {} seconds...",
                    self.retry.delay.as_secs()
                );
                thread::sleep(self.retry.delay);
            }
        }
        Err(max_attempts)
    }
}
