#![forbid(unsafe_code)]

//! External downloader invocation (`yt-dlp`).

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{ArchiveError, Result};
use crate::model::{DownloadOptions, DownloadTarget};

/// Output template appended to the target directory.
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);
const VERSION_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs one download attempt. `Ok(true)` means the tool reported success.
pub trait Downloader {
    fn download(&self, target: &DownloadTarget, options: &DownloadOptions) -> io::Result<bool>;
}

/// `yt-dlp` (or a compatible binary) found at `program`.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs `<program> --version` with a short timeout so a missing or broken
    /// install is reported before any batch starts.
    pub fn ensure_available(&self) -> Result<()> {
        let child = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        let mut child = child.map_err(|err| {
            self.unavailable(format!("not installed or not in PATH ({err})"))
        })?;

        let deadline = Instant::now() + VERSION_CHECK_TIMEOUT;
        loop {
            match child.try_wait()? {
                Some(status) if status.success() => return Ok(()),
                Some(status) => {
                    return Err(self.unavailable(format!(
                        "installed but --version returned a failure status ({status})"
                    )));
                }
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(self.unavailable(format!(
                        "did not answer --version within {}s",
                        VERSION_CHECK_TIMEOUT.as_secs()
                    )));
                }
                None => thread::sleep(VERSION_POLL_INTERVAL),
            }
        }
    }

    /// Asks the tool to update itself (`-U`). Output goes straight to the
    /// terminal.
    pub fn self_update(&self) -> Result<ExitStatus> {
        Command::new(&self.program)
            .arg("-U")
            .status()
            .map_err(|err| self.unavailable(format!("unable to run -U ({err})")))
    }

    fn unavailable(&self, reason: String) -> ArchiveError {
        ArchiveError::DownloaderUnavailable {
            program: self.program.clone(),
            reason,
        }
    }
}

impl Downloader for YtDlp {
    fn download(&self, target: &DownloadTarget, options: &DownloadOptions) -> io::Result<bool> {
        // Progress output is left attached to the terminal.
        let status = Command::new(&self.program)
            .args(download_args(target, options))
            .status()?;
        Ok(status.success())
    }
}

/// Builds the argument list for one download.
pub fn download_args(target: &DownloadTarget, options: &DownloadOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    if let Some(browser) = options.cookies_browser {
        args.push("--cookies-from-browser".into());
        args.push(browser.as_str().into());
        if let Some(runtime) = options.js_runtime {
            args.push("--js-runtimes".into());
            args.push(runtime.as_str().into());
        }
    }

    for flag in [
        "--embed-subs",
        "--embed-thumbnail",
        "--embed-metadata",
        "--embed-chapters",
        "--embed-info-json",
    ] {
        args.push(flag.into());
    }

    args.push("--remux-video".into());
    args.push(target.format.extension().into());
    args.push("-o".into());
    args.push(target.output_dir.join(OUTPUT_TEMPLATE).into_os_string());
    args.push(target.entry.url.as_str().into());
    args
}
