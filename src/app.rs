#![forbid(unsafe_code)]

//! Executes menu commands: wires the resolver, manifest store and fetch
//! orchestrator together and persists settings edits.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::api::{ApiTransport, UreqTransport};
use crate::config::{
    API_KEY_VAR, ARCHIVE_ROOT_VAR, ArchiverConfig, COOKIES_VAR, DOWNLOADER_VAR, FORMAT_VAR,
    JS_RUNTIME_VAR, upsert_env_value,
};
use crate::downloader::YtDlp;
use crate::fetch::{BatchReport, FetchOrchestrator};
use crate::manifest;
use crate::menu::{Command, Prompter, SettingChange};
use crate::model::{DownloadOptions, Scope, VideoEntry};
use crate::resolver::MetadataResolver;
use crate::timestamps;

/// Directory under the archive root for one-off video downloads.
pub const SINGLE_VIDEO_DIR: &str = "single";

/// Resolve-then-fetch flows for one archive root.
pub struct Archiver<'a, T> {
    resolver: MetadataResolver<T>,
    fetcher: &'a FetchOrchestrator<'a>,
    archive_root: &'a Path,
}

impl<'a, T: ApiTransport> Archiver<'a, T> {
    pub fn new(
        resolver: MetadataResolver<T>,
        fetcher: &'a FetchOrchestrator<'a>,
        archive_root: &'a Path,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            archive_root,
        }
    }

    /// Enumerates the channel's uploads, checkpoints the manifest, then
    /// downloads every entry into the channel directory.
    pub fn archive_channel(
        &self,
        handle: &str,
        options: &DownloadOptions,
    ) -> crate::Result<BatchReport> {
        let entries = self.resolver.resolve_channel(handle, self.archive_root)?;
        let scope = Scope::Channel(handle.to_string());
        self.fetcher
            .fetch_all(&entries, &scope.directory(self.archive_root), options)
    }

    pub fn archive_playlist(
        &self,
        reference: &str,
        options: &DownloadOptions,
    ) -> crate::Result<BatchReport> {
        let (scope, entries) = self.resolver.resolve_playlist(reference, self.archive_root)?;
        self.fetcher
            .fetch_all(&entries, &scope.directory(self.archive_root), options)
    }

    /// Downloads one video into `output_dir`, or `<root>/single` when unset.
    pub fn archive_video(
        &self,
        url: &str,
        output_dir: Option<&Path>,
        options: &DownloadOptions,
    ) -> crate::Result<BatchReport> {
        let published_at = self.resolver.video_published_at(url)?;
        let output_dir = output_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.archive_root.join(SINGLE_VIDEO_DIR));
        let entry = VideoEntry::new(published_at, url.trim());
        self.fetcher.fetch_all(&[entry], &output_dir, options)
    }
}

/// Replays a channel manifest written by an earlier run. The remote listing
/// is not consulted, so no API key is needed.
pub fn resume_channel(
    fetcher: &FetchOrchestrator<'_>,
    archive_root: &Path,
    handle: &str,
    options: &DownloadOptions,
) -> crate::Result<BatchReport> {
    let scope = Scope::Channel(handle.trim().to_string());
    let path = scope.manifest_path(archive_root);
    let entries = manifest::read(&path)?;
    println!("Loaded {} videos from {}", entries.len(), path.display());
    fetcher.fetch_all(&entries, &scope.directory(archive_root), options)
}

/// Runs one menu command against the live API and downloader.
pub fn execute<R: BufRead, W: Write>(
    config: &mut ArchiverConfig,
    command: Command,
    prompter: &mut Prompter<R, W>,
) -> Result<()> {
    let downloader = YtDlp::new(&config.downloader);
    let writer = timestamps::detect();
    tracing::debug!(writer = writer.name(), "timestamp writer selected");
    let fetcher = FetchOrchestrator::new(&downloader, writer.as_ref());

    let report = match command {
        Command::Quit => return Ok(()),
        Command::UpdateDownloader => {
            println!("Updating {}...", downloader.program().display());
            let status = downloader.self_update()?;
            if !status.success() {
                bail!("{} -U exited with {status}", downloader.program().display());
            }
            return Ok(());
        }
        Command::EditSettings(changes) => {
            apply_settings(config, &changes)?;
            println!("Saved {} setting(s) to {}", changes.len(), config.env_path.display());
            return Ok(());
        }
        Command::ResumeChannel { handle, options } => {
            resume_channel(&fetcher, &config.archive_root, &handle, &options)
                .with_context(|| format!("resuming channel {handle}"))?
        }
        Command::DownloadChannel { handle, options } => {
            let archiver = live_archiver(config, prompter, &fetcher)?;
            archiver
                .archive_channel(&handle, &options)
                .with_context(|| format!("archiving channel {handle}"))?
        }
        Command::DownloadPlaylist { reference, options } => {
            let archiver = live_archiver(config, prompter, &fetcher)?;
            archiver
                .archive_playlist(&reference, &options)
                .with_context(|| format!("archiving playlist {reference}"))?
        }
        Command::DownloadVideo {
            url,
            output_dir,
            options,
        } => {
            let archiver = live_archiver(config, prompter, &fetcher)?;
            archiver
                .archive_video(&url, output_dir.as_deref(), &options)
                .with_context(|| format!("archiving video {url}"))?
        }
    };

    report.print_summary();
    Ok(())
}

fn live_archiver<'a, R: BufRead, W: Write>(
    config: &'a mut ArchiverConfig,
    prompter: &mut Prompter<R, W>,
    fetcher: &'a FetchOrchestrator<'a>,
) -> Result<Archiver<'a, UreqTransport>> {
    let api_key = ensure_api_key(config, prompter)?;
    let transport = UreqTransport::new(config.api_base_url.clone(), api_key);
    Ok(Archiver::new(
        MetadataResolver::new(transport),
        fetcher,
        &config.archive_root,
    ))
}

/// Returns the configured API key, asking for one and saving it when unset.
pub fn ensure_api_key<R: BufRead, W: Write>(
    config: &mut ArchiverConfig,
    prompter: &mut Prompter<R, W>,
) -> Result<String> {
    if let Some(key) = config.api_key.as_deref() {
        return Ok(key.to_string());
    }

    let key = prompter
        .ask_required("No API key found. Enter your YouTube Data API key:")
        .context("reading API key")?;
    if key.is_empty() {
        bail!("an API key is required for this operation");
    }
    upsert_env_value(&config.env_path, API_KEY_VAR, &key)?;
    tracing::info!(path = %config.env_path.display(), "API key saved");
    config.api_key = Some(key.clone());
    Ok(key)
}

/// Persists each change and mirrors it into the running configuration.
pub fn apply_settings(config: &mut ArchiverConfig, changes: &[SettingChange]) -> Result<()> {
    for change in changes {
        let value = change.value.trim();
        let optional = (!value.is_empty()).then(|| value.to_string());
        match change.key {
            API_KEY_VAR => config.api_key = optional,
            ARCHIVE_ROOT_VAR => {
                if value.is_empty() {
                    bail!("{ARCHIVE_ROOT_VAR} cannot be empty");
                }
                config.archive_root = PathBuf::from(value);
            }
            DOWNLOADER_VAR => {
                if value.is_empty() {
                    bail!("{DOWNLOADER_VAR} cannot be empty");
                }
                config.downloader = PathBuf::from(value);
            }
            FORMAT_VAR => {
                config.format = value
                    .parse()
                    .with_context(|| format!("invalid {FORMAT_VAR}"))?;
            }
            COOKIES_VAR => config.cookies_browser = optional,
            JS_RUNTIME_VAR => config.js_runtime = optional,
            other => bail!("unknown setting {other}"),
        }
        upsert_env_value(&config.env_path, change.key, value)?;
    }
    Ok(())
}
