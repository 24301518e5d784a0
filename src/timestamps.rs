#![forbid(unsafe_code)]

//! Rewrites file timestamps to a video's original publish time.
//!
//! Modified and accessed times can be set everywhere. Creation time is only
//! writable on some platforms, so the writer is picked once via [`detect`]
//! instead of branching at every call site.

#[cfg(any(windows, target_os = "macos"))]
use std::fs::{File, FileTimes};
use std::io;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use filetime::FileTime;

use crate::error::ArchiveError;

pub trait TimestampWriter {
    /// Human-readable capability name, used in logs.
    fn name(&self) -> &'static str;

    fn apply(&self, path: &Path, instant: DateTime<Utc>) -> io::Result<()>;
}

/// Sets modified and accessed times.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicTimestampWriter;

impl TimestampWriter for BasicTimestampWriter {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn apply(&self, path: &Path, instant: DateTime<Utc>) -> io::Result<()> {
        let time = FileTime::from_system_time(SystemTime::from(instant));
        filetime::set_file_times(path, time, time)
    }
}

/// Sets modified, accessed, and creation times.
#[cfg(any(windows, target_os = "macos"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtendedTimestampWriter;

#[cfg(any(windows, target_os = "macos"))]
impl TimestampWriter for ExtendedTimestampWriter {
    fn name(&self) -> &'static str {
        "extended"
    }

    fn apply(&self, path: &Path, instant: DateTime<Utc>) -> io::Result<()> {
        #[cfg(target_os = "macos")]
        use std::os::macos::fs::FileTimesExt;
        #[cfg(windows)]
        use std::os::windows::fs::FileTimesExt;

        let time = SystemTime::from(instant);
        let times = FileTimes::new()
            .set_modified(time)
            .set_accessed(time)
            .set_created(time);
        open_for_attributes(path)?.set_times(times)
    }
}

/// Opens `path` with just enough access to change its times, so files the
/// user owns but cannot write are still stamped.
#[cfg(windows)]
fn open_for_attributes(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_WRITE_ATTRIBUTES: u32 = 0x0100;
    File::options().access_mode(FILE_WRITE_ATTRIBUTES).open(path)
}

#[cfg(target_os = "macos")]
fn open_for_attributes(path: &Path) -> io::Result<File> {
    File::open(path)
}

/// Picks the most capable writer for the running platform.
pub fn detect() -> Box<dyn TimestampWriter> {
    #[cfg(any(windows, target_os = "macos"))]
    {
        Box::new(ExtendedTimestampWriter)
    }
    #[cfg(not(any(windows, target_os = "macos")))]
    {
        Box::new(BasicTimestampWriter)
    }
}

/// Applies `instant` to `path`. Failures are reported as warnings and never
/// propagate; the return value tells whether the timestamps were written.
pub fn normalize(writer: &dyn TimestampWriter, path: &Path, instant: DateTime<Utc>) -> bool {
    match writer.apply(path, instant) {
        Ok(()) => {
            tracing::debug!(
                path = %path.display(),
                writer = writer.name(),
                %instant,
                "timestamps normalized"
            );
            true
        }
        Err(source) => {
            let err = ArchiveError::TimestampWrite {
                path: path.to_path_buf(),
                source,
            };
            tracing::warn!("{err}");
            false
        }
    }
}
