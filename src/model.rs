#![forbid(unsafe_code)]

//! Plain data shared across the pipeline: manifest entries, archive scopes,
//! and the knobs passed to the downloader.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{ArchiveError, Result};

/// File name of the manifest stored inside every scope directory.
pub const MANIFEST_FILE: &str = "video_list.txt";
const PLAYLISTS_SUBDIR: &str = "playlists";

/// One video to fetch, as listed in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoEntry {
    pub published_at: DateTime<Utc>,
    pub url: String,
}

impl VideoEntry {
    pub fn new(published_at: DateTime<Utc>, url: impl Into<String>) -> Self {
        Self {
            published_at,
            url: url.into(),
        }
    }

    /// ISO-8601 rendering with a `Z` suffix, which sorts lexically in
    /// chronological order.
    pub fn timestamp_string(&self) -> String {
        self.published_at
            .to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

/// Parses the API's `publishedAt` format (`2024-01-01T00:00:00Z`).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|datetime| datetime.with_timezone(&Utc))
}

/// Stable oldest-first sort followed by URL de-duplication. The first
/// occurrence of a URL (i.e. the oldest) is kept.
pub fn sort_entries(entries: &mut Vec<VideoEntry>) {
    entries.sort_by_key(|entry| entry.published_at);
    let mut seen = std::collections::HashSet::new();
    entries.retain(|entry| seen.insert(entry.url.clone()));
}

/// Owner of a manifest and of the directory the videos land in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Channel(String),
    Playlist(String),
}

impl Scope {
    /// Directory under the archive root holding this scope's videos and
    /// manifest. Channel handles lose their `@` prefix.
    pub fn directory(&self, archive_root: &Path) -> PathBuf {
        match self {
            Scope::Channel(handle) => archive_root.join(clean_handle(handle)),
            Scope::Playlist(id) => archive_root.join(PLAYLISTS_SUBDIR).join(id),
        }
    }

    pub fn manifest_path(&self, archive_root: &Path) -> PathBuf {
        self.directory(archive_root).join(MANIFEST_FILE)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Channel(handle) => write!(f, "channel {}", handle.trim()),
            Scope::Playlist(id) => write!(f, "playlist {id}"),
        }
    }
}

fn clean_handle(handle: &str) -> String {
    handle.replace('@', "").trim().to_string()
}

/// Remux target handed to the downloader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContainerFormat {
    #[default]
    Mp4,
    Mkv,
}

impl ContainerFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Mkv => "mkv",
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ContainerFormat {
    type Err = ArchiveError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mp4" => Ok(ContainerFormat::Mp4),
            "mkv" => Ok(ContainerFormat::Mkv),
            other => Err(ArchiveError::InvalidInput(format!(
                "unknown container format: {other}"
            ))),
        }
    }
}

/// Browsers yt-dlp can lift cookies from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
    Firefox,
    Chrome,
    Safari,
}

impl Browser {
    pub fn as_str(self) -> &'static str {
        match self {
            Browser::Firefox => "firefox",
            Browser::Chrome => "chrome",
            Browser::Safari => "safari",
        }
    }
}

impl FromStr for Browser {
    type Err = ArchiveError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "firefox" => Ok(Browser::Firefox),
            "chrome" => Ok(Browser::Chrome),
            "safari" => Ok(Browser::Safari),
            other => Err(ArchiveError::InvalidInput(format!("unknown browser: {other}"))),
        }
    }
}

/// JavaScript runtimes yt-dlp can use to solve player challenges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsRuntime {
    Deno,
    Node,
    Bun,
    QuickJs,
}

impl JsRuntime {
    pub fn as_str(self) -> &'static str {
        match self {
            JsRuntime::Deno => "deno",
            JsRuntime::Node => "node",
            JsRuntime::Bun => "bun",
            JsRuntime::QuickJs => "quickjs",
        }
    }
}

impl FromStr for JsRuntime {
    type Err = ArchiveError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "deno" => Ok(JsRuntime::Deno),
            "node" => Ok(JsRuntime::Node),
            "bun" => Ok(JsRuntime::Bun),
            "quickjs" => Ok(JsRuntime::QuickJs),
            other => Err(ArchiveError::InvalidInput(format!(
                "unknown JS runtime: {other}"
            ))),
        }
    }
}

/// Per-run downloader settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    pub format: ContainerFormat,
    pub cookies_browser: Option<Browser>,
    pub js_runtime: Option<JsRuntime>,
}

impl DownloadOptions {
    /// Builds options from free-form names. Unknown browser or runtime names
    /// degrade to "none" with a warning, and a runtime is dropped unless a
    /// cookie browser is also set.
    pub fn from_names(
        format: ContainerFormat,
        cookies_browser: Option<&str>,
        js_runtime: Option<&str>,
    ) -> Self {
        let cookies_browser = cookies_browser
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .and_then(|name| match name.parse::<Browser>() {
                Ok(browser) => Some(browser),
                Err(_) => {
                    tracing::warn!(browser = name, "browser not recognized, cookies won't be used");
                    None
                }
            });

        let js_runtime = js_runtime
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .and_then(|name| match name.parse::<JsRuntime>() {
                Ok(runtime) => Some(runtime),
                Err(_) => {
                    tracing::warn!(runtime = name, "JS runtime not recognized, it won't be used");
                    None
                }
            });

        let js_runtime = match (cookies_browser, js_runtime) {
            (Some(_), runtime) => runtime,
            (None, Some(runtime)) => {
                tracing::warn!(
                    runtime = runtime.as_str(),
                    "JS runtime requires a cookie browser, ignoring it"
                );
                None
            }
            (None, None) => None,
        };

        Self {
            format,
            cookies_browser,
            js_runtime,
        }
    }
}

/// Everything the downloader needs for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub entry: VideoEntry,
    pub output_dir: PathBuf,
    pub format: ContainerFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ts: &str, url: &str) -> VideoEntry {
        VideoEntry::new(parse_timestamp(ts).unwrap(), url)
    }

    #[test]
    fn sort_is_stable_for_tied_timestamps() {
        let mut entries = vec![
            entry("2024-02-01T00:00:00Z", "https://youtu.be/c"),
            entry("2024-01-01T00:00:00Z", "https://youtu.be/a"),
            entry("2024-02-01T00:00:00Z", "https://youtu.be/d"),
            entry("2024-01-01T00:00:00Z", "https://youtu.be/b"),
        ];
        sort_entries(&mut entries);
        let urls: Vec<&str> = entries.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://youtu.be/a",
                "https://youtu.be/b",
                "https://youtu.be/c",
                "https://youtu.be/d",
            ]
        );
    }

    #[test]
    fn sort_drops_duplicate_urls_keeping_oldest() {
        let mut entries = vec![
            entry("2024-03-01T00:00:00Z", "https://youtu.be/a"),
            entry("2024-01-01T00:00:00Z", "https://youtu.be/a"),
            entry("2024-02-01T00:00:00Z", "https://youtu.be/b"),
        ];
        sort_entries(&mut entries);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp_string(), "2024-01-01T00:00:00Z");
        assert_eq!(entries[0].url, "https://youtu.be/a");
    }

    #[test]
    fn timestamp_string_uses_z_suffix() {
        let e = entry("2023-05-06T07:08:09+00:00", "u");
        assert_eq!(e.timestamp_string(), "2023-05-06T07:08:09Z");
    }

    #[test]
    fn scope_directories() {
        let root = Path::new("saved");
        assert_eq!(
            Scope::Channel("@Some Channel ".into()).directory(root),
            PathBuf::from("saved/Some Channel")
        );
        assert_eq!(
            Scope::Playlist("PL123".into()).manifest_path(root),
            PathBuf::from("saved/playlists/PL123/video_list.txt")
        );
    }

    #[test]
    fn options_ignore_unknown_names() {
        let options = DownloadOptions::from_names(ContainerFormat::Mkv, Some("lynx"), Some("deno"));
        assert_eq!(options.cookies_browser, None);
        assert_eq!(options.js_runtime, None);
        assert_eq!(options.format, ContainerFormat::Mkv);
    }

    #[test]
    fn options_keep_runtime_only_with_cookies() {
        let options =
            DownloadOptions::from_names(ContainerFormat::Mp4, Some("Firefox"), Some("bogus"));
        assert_eq!(options.cookies_browser, Some(Browser::Firefox));
        assert_eq!(options.js_runtime, None);

        let options = DownloadOptions::from_names(ContainerFormat::Mp4, Some("chrome"), Some("node"));
        assert_eq!(options.js_runtime, Some(JsRuntime::Node));
    }

    #[test]
    fn container_format_parses_case_insensitively() {
        assert_eq!("MKV".parse::<ContainerFormat>().unwrap(), ContainerFormat::Mkv);
        assert!("avi".parse::<ContainerFormat>().is_err());
    }
}
