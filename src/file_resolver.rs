#![forbid(unsafe_code)]

//! Works out which file a download produced by diffing the output directory
//! before and after the invocation.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::model::ContainerFormat;

/// Entry names present in a directory at one point in time.
#[derive(Debug, Clone, Default)]
pub struct DirSnapshot {
    names: HashSet<OsString>,
}

impl DirSnapshot {
    /// Captures the direct children of `dir`. A missing directory yields an
    /// empty snapshot.
    pub fn capture(dir: &Path) -> Self {
        let names = list_names(dir).into_iter().collect();
        Self { names }
    }

    pub fn contains(&self, name: &OsString) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Direct children of `dir` in listing order.
fn list_names(dir: &Path) -> Vec<OsString> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_os_string())
        .collect()
}

/// New regular files in `dir` that were not part of `before`, in listing
/// order, paired with their sizes.
pub fn new_files(dir: &Path, before: &DirSnapshot) -> Vec<(PathBuf, u64)> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| !before.contains(&entry.file_name().to_os_string()))
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            metadata
                .is_file()
                .then(|| (entry.into_path(), metadata.len()))
        })
        .collect()
}

/// Picks the downloaded video among the files that appeared in `dir`.
///
/// A file ending in `.<format>` wins; the first one in listing order is taken
/// when several match. Otherwise the largest new file is assumed to be the
/// video. `None` means nothing new appeared, typically because the video was
/// already on disk and the downloader skipped it.
pub fn resolve(dir: &Path, before: &DirSnapshot, format: ContainerFormat) -> Option<PathBuf> {
    let candidates = new_files(dir, before);
    if candidates.is_empty() {
        return None;
    }

    let suffix = format!(".{}", format.extension());
    let mut exact = candidates.iter().filter(|(path, _)| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_lowercase().ends_with(&suffix))
            .unwrap_or(false)
    });
    if let Some((first, _)) = exact.next() {
        let others = exact.count();
        if others > 0 {
            tracing::warn!(
                chosen = %first.display(),
                others,
                "several new files match the requested format, keeping the first listed"
            );
        }
        return Some(first.clone());
    }

    let mut largest: Option<&(PathBuf, u64)> = None;
    for candidate in &candidates {
        if largest.is_none_or(|(_, size)| candidate.1 > *size) {
            largest = Some(candidate);
        }
    }
    largest.map(|(path, size)| {
        tracing::debug!(path = %path.display(), size, "no exact format match, using largest new file");
        path.clone()
    })
}
