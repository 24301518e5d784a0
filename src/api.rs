#![forbid(unsafe_code)]

//! Thin access layer over the YouTube Data API v3.
//!
//! Only the handful of response fields the resolver reads are modelled; every
//! field is optional because the API omits parts freely (deleted or private
//! videos come back without a snippet, for example).

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ArchiveError, Result};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One authenticated GET against the API, returning the decoded JSON body.
///
/// `endpoint` is the resource name (`channels`, `playlistItems`, ...). The
/// credential is the implementation's concern.
pub trait ApiTransport {
    fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value>;
}

/// `ApiTransport` backed by a blocking `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl UreqTransport {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

impl ApiTransport for UreqTransport {
    fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut request = self.agent.get(&url);
        for (key, value) in query {
            request = request.query(key, value);
        }
        request = request.query("key", &self.api_key);

        tracing::debug!(endpoint, "API request");
        match request.call() {
            Ok(response) => response
                .into_json::<Value>()
                .map_err(|err| ArchiveError::Transport(format!("reading {endpoint} response: {err}"))),
            Err(ureq::Error::Status(status, response)) => {
                let body = response
                    .into_string()
                    .unwrap_or_else(|err| format!("<unreadable body: {err}>"));
                Err(ArchiveError::Api { status, body })
            }
            Err(ureq::Error::Transport(err)) => {
                Err(ArchiveError::Transport(self.describe_transport(endpoint, &err)))
            }
        }
    }
}

impl UreqTransport {
    /// Transport errors render the full request URL, which carries the API
    /// key, so only the endpoint, error kind and detail message are kept.
    fn describe_transport(&self, endpoint: &str, err: &ureq::Transport) -> String {
        let mut message = format!("{endpoint} request failed: {}", err.kind());
        if let Some(detail) = err.message() {
            message.push_str(": ");
            message.push_str(detail);
        }
        if !self.api_key.is_empty() {
            message = message.replace(&self.api_key, "<redacted>");
        }
        message
    }
}

/// Decodes a JSON payload into one of the typed responses below.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelItem {
    pub id: Option<String>,
    #[serde(rename = "contentDetails")]
    pub content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    pub related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
pub struct RelatedPlaylists {
    pub uploads: Option<String>,
}

impl ChannelItem {
    pub fn uploads_playlist(&self) -> Option<&str> {
        self.content_details
            .as_ref()?
            .related_playlists
            .as_ref()?
            .uploads
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct PlaylistItem {
    pub snippet: Option<PlaylistItemSnippet>,
    #[serde(rename = "contentDetails")]
    pub content_details: Option<PlaylistItemContentDetails>,
}

impl PlaylistItem {
    /// When the video itself went public. `snippet.publishedAt` is only the
    /// time it was added to the playlist, so it is the fallback.
    pub fn video_published_at(&self) -> Option<&str> {
        self.content_details
            .as_ref()
            .and_then(|details| details.video_published_at.as_deref())
            .or_else(|| self.snippet.as_ref()?.published_at.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub struct PlaylistItemContentDetails {
    #[serde(rename = "videoPublishedAt")]
    pub video_published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistItemSnippet {
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
    #[serde(rename = "resourceId")]
    pub resource_id: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
pub struct ResourceId {
    #[serde(rename = "videoId")]
    pub video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VideoItem {
    pub snippet: Option<VideoSnippet>,
}

#[derive(Debug, Deserialize)]
pub struct VideoSnippet {
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
}
