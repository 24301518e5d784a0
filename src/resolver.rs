#![forbid(unsafe_code)]

//! Turns operator input (channel handles, playlist URLs, video URLs) into
//! ordered `VideoEntry` lists using the remote API.

use std::path::Path;

use chrono::{DateTime, Utc};
use url::Url;

use crate::api::{self, ApiTransport, ChannelItem, ListResponse, PlaylistItem, VideoItem};
use crate::error::{ArchiveError, Result};
use crate::manifest;
use crate::model::{Scope, VideoEntry, parse_timestamp, sort_entries};

const PAGE_SIZE: &str = "50";
const SHORT_URL_PREFIX: &str = "https://youtu.be/";

/// Channel identity as returned by the `channels` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub uploads_playlist: String,
}

pub struct MetadataResolver<T> {
    transport: T,
}

impl<T: ApiTransport> MetadataResolver<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Looks up a channel by `@handle`, or by legacy username when the input
    /// has no `@` prefix. No match is fatal for the current operation.
    pub fn lookup_channel(&self, handle: &str) -> Result<ChannelInfo> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(ArchiveError::InvalidInput("channel handle is empty".into()));
        }
        let lookup_key = if handle.starts_with('@') {
            "forHandle"
        } else {
            "forUsername"
        };

        let raw = self.transport.get(
            "channels",
            &[("part", "id,contentDetails"), (lookup_key, handle)],
        )?;
        let payload = raw.to_string();
        let response: ListResponse<ChannelItem> = api::decode(raw)?;

        let Some(item) = response.items.into_iter().next() else {
            return Err(ArchiveError::NotFound(format!(
                "could not find channel for '{handle}' (response: {payload})"
            )));
        };
        let id = item.id.clone().ok_or_else(|| {
            ArchiveError::NotFound(format!("channel '{handle}' has no id (response: {payload})"))
        })?;
        let uploads_playlist = item.uploads_playlist().map(str::to_string).ok_or_else(|| {
            ArchiveError::NotFound(format!(
                "could not retrieve uploads playlist for '{handle}' (response: {payload})"
            ))
        })?;

        Ok(ChannelInfo {
            id,
            uploads_playlist,
        })
    }

    /// Walks every page of a playlist, oldest entry first in the result.
    /// Items without a snippet, video id, or readable date are skipped.
    pub fn list_playlist(&self, playlist_id: &str) -> Result<Vec<VideoEntry>> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let response: ListResponse<PlaylistItem> = {
                let mut query = vec![
                    ("part", "snippet,contentDetails"),
                    ("playlistId", playlist_id),
                    ("maxResults", PAGE_SIZE),
                ];
                if let Some(token) = page_token.as_deref() {
                    query.push(("pageToken", token));
                }
                api::decode(self.transport.get("playlistItems", &query)?)?
            };
            pages += 1;

            for item in response.items {
                match entry_from_item(item) {
                    Some(entry) => entries.push(entry),
                    None => tracing::debug!(playlist_id, "skipping playlist item without metadata"),
                }
            }

            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::info!(playlist_id, pages, videos = entries.len(), "playlist enumerated");
        sort_entries(&mut entries);
        Ok(entries)
    }

    /// Resolves a channel's uploads and persists the manifest before
    /// returning, so a checkpoint exists before any download starts.
    pub fn resolve_channel(&self, handle: &str, archive_root: &Path) -> Result<Vec<VideoEntry>> {
        let channel = self.lookup_channel(handle)?;
        tracing::info!(handle = handle.trim(), channel_id = %channel.id, "found channel");
        println!("Found Channel ID: {}", channel.id);
        println!("Fetching video list...");

        let entries = self.list_playlist(&channel.uploads_playlist)?;
        let scope = Scope::Channel(handle.to_string());
        persist(&scope, archive_root, &entries)?;
        Ok(entries)
    }

    /// Resolves a playlist URL or bare id and persists its manifest.
    pub fn resolve_playlist(
        &self,
        reference: &str,
        archive_root: &Path,
    ) -> Result<(Scope, Vec<VideoEntry>)> {
        let playlist_id = extract_playlist_id(reference)?;
        println!("Fetching video list for playlist {playlist_id}...");
        let entries = self.list_playlist(&playlist_id)?;
        let scope = Scope::Playlist(playlist_id);
        persist(&scope, archive_root, &entries)?;
        Ok((scope, entries))
    }

    /// Fetches the original publish time of a single video.
    pub fn video_published_at(&self, video_url: &str) -> Result<DateTime<Utc>> {
        let video_id = extract_video_id(video_url)?;
        let response: ListResponse<VideoItem> = api::decode(
            self.transport
                .get("videos", &[("part", "snippet"), ("id", video_id.as_str())])?,
        )?;

        response
            .items
            .into_iter()
            .next()
            .and_then(|item| item.snippet)
            .and_then(|snippet| snippet.published_at)
            .and_then(|published| parse_timestamp(&published))
            .ok_or_else(|| {
                ArchiveError::NotFound(format!("could not retrieve video metadata for {video_id}"))
            })
    }
}

fn entry_from_item(item: PlaylistItem) -> Option<VideoEntry> {
    let published_at = parse_timestamp(item.video_published_at()?)?;
    let video_id = item
        .snippet?
        .resource_id?
        .video_id
        .filter(|id| !id.is_empty())?;
    Some(VideoEntry::new(
        published_at,
        format!("{SHORT_URL_PREFIX}{video_id}"),
    ))
}

fn persist(scope: &Scope, archive_root: &Path, entries: &[VideoEntry]) -> Result<()> {
    let path = scope.manifest_path(archive_root);
    manifest::write(&path, entries)?;
    println!("Saved {} videos to {}", entries.len(), path.display());
    Ok(())
}

fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn parse_url(value: &str) -> Option<Url> {
    Url::parse(value)
        .ok()
        .or_else(|| {
            // Accept scheme-less input such as `youtube.com/playlist?list=...`.
            if value.contains('/') {
                Url::parse(&format!("https://{value}")).ok()
            } else {
                None
            }
        })
        .filter(|url| url.host_str().is_some())
}

/// Accepts either a URL carrying a `list` query parameter or a bare playlist
/// identifier.
pub fn extract_playlist_id(reference: &str) -> Result<String> {
    let reference = reference.trim();
    if is_identifier(reference) {
        return Ok(reference.to_string());
    }

    parse_url(reference)
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "list")
                .map(|(_, value)| value.into_owned())
        })
        .filter(|id| is_identifier(id))
        .ok_or_else(|| {
            ArchiveError::InvalidInput(format!("no playlist id found in '{reference}'"))
        })
}

/// Extracts the video id from `watch?v=`, `youtu.be/<id>`, or `/shorts/<id>`
/// URLs.
pub fn extract_video_id(video_url: &str) -> Result<String> {
    let invalid = || ArchiveError::InvalidInput(format!("invalid YouTube URL: '{video_url}'"));
    let url = parse_url(video_url.trim()).ok_or_else(invalid)?;

    if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "v") {
        return Some(id.into_owned())
            .filter(|id| is_identifier(id))
            .ok_or_else(invalid);
    }

    let mut segments = url.path_segments().into_iter().flatten();
    let host = url.host_str().unwrap_or_default();
    let candidate = if host.ends_with("youtu.be") {
        segments.next()
    } else {
        match segments.next() {
            Some("shorts") | Some("live") => segments.next(),
            _ => None,
        }
    };

    candidate
        .filter(|id| is_identifier(id))
        .map(str::to_string)
        .ok_or_else(invalid)
}
