//! Resolve, checkpoint, fetch and stamp, driven through the public API with a
//! scripted API transport and an in-process downloader.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use serde_json::{Value, json};
use tempfile::tempdir;
use tube_archiver::ArchiveError;
use tube_archiver::api::ApiTransport;
use tube_archiver::app::{self, Archiver};
use tube_archiver::downloader::Downloader;
use tube_archiver::fetch::{FetchOrchestrator, RetryPolicy};
use tube_archiver::manifest;
use tube_archiver::model::{
    ContainerFormat, DownloadOptions, DownloadTarget, MANIFEST_FILE, parse_timestamp,
};
use tube_archiver::resolver::{MetadataResolver, extract_video_id};
use tube_archiver::timestamps::BasicTimestampWriter;

/// Answers like the Data API for one channel (`@Demo`), whose uploads are
/// also reachable as playlist `PL123`, split over two pages.
struct FakeApi;

impl ApiTransport for FakeApi {
    fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> tube_archiver::Result<Value> {
        let param = |name: &str| {
            query
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| *value)
        };
        match endpoint {
            "channels" if param("forHandle") == Some("@Demo") => Ok(json!({
                "items": [{
                    "id": "UCdemo",
                    "contentDetails": { "relatedPlaylists": { "uploads": "PL123" } }
                }]
            })),
            "channels" => Ok(json!({ "items": [] })),
            "playlistItems" if param("playlistId") == Some("PL123") => {
                match param("pageToken") {
                    None => Ok(json!({
                        "items": [
                            item("ccc", "2021-05-05T05:05:05Z"),
                            item("aaa", "2019-01-01T00:00:00Z"),
                        ],
                        "nextPageToken": "page-2"
                    })),
                    Some("page-2") => Ok(json!({
                        "items": [item("bbb", "2020-02-02T02:02:02Z")]
                    })),
                    Some(other) => panic!("unexpected page token {other}"),
                }
            }
            "videos" if param("id") == Some("solo") => Ok(json!({
                "items": [{ "snippet": { "publishedAt": "2012-12-12T12:12:12Z" } }]
            })),
            _ => Err(ArchiveError::Api {
                status: 404,
                body: format!("no fixture for {endpoint}"),
            }),
        }
    }
}

fn item(video_id: &str, published_at: &str) -> Value {
    json!({
        "snippet": {
            "publishedAt": published_at,
            "resourceId": { "kind": "youtube#video", "videoId": video_id }
        }
    })
}

/// Writes `<id>.<ext>` like yt-dlp would, and reports success without
/// writing anything when the file already exists.
#[derive(Default)]
struct FileWritingDownloader {
    failing: HashSet<&'static str>,
    calls: RefCell<Vec<String>>,
}

impl Downloader for FileWritingDownloader {
    fn download(&self, target: &DownloadTarget, _options: &DownloadOptions) -> io::Result<bool> {
        self.calls.borrow_mut().push(target.entry.url.clone());
        let id = extract_video_id(&target.entry.url)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
        if self.failing.contains(id.as_str()) {
            return Ok(false);
        }
        let path = target
            .output_dir
            .join(format!("{id}.{}", target.format.extension()));
        if !path.exists() {
            fs::write(path, id.as_bytes())?;
        }
        Ok(true)
    }
}

fn no_delay() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        delay: Duration::ZERO,
    }
}

fn modified(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

fn at(value: &str) -> SystemTime {
    SystemTime::from(parse_timestamp(value).unwrap())
}

#[test]
fn playlist_is_checkpointed_then_downloaded_oldest_first() {
    let root = tempdir().unwrap();
    let downloader = FileWritingDownloader::default();
    let fetcher = FetchOrchestrator::new(&downloader, &BasicTimestampWriter).with_retry(no_delay());
    let archiver = Archiver::new(MetadataResolver::new(FakeApi), &fetcher, root.path());

    let report = archiver
        .archive_playlist(
            "https://www.youtube.com/playlist?list=PL123",
            &DownloadOptions::default(),
        )
        .unwrap();

    let dir = root.path().join("playlists").join("PL123");
    assert_eq!(
        fs::read_to_string(dir.join(MANIFEST_FILE)).unwrap(),
        "2019-01-01T00:00:00Z https://youtu.be/aaa\n\
         2020-02-02T02:02:02Z https://youtu.be/bbb\n\
         2021-05-05T05:05:05Z https://youtu.be/ccc\n"
    );
    assert_eq!(
        *downloader.calls.borrow(),
        vec![
            "https://youtu.be/aaa",
            "https://youtu.be/bbb",
            "https://youtu.be/ccc"
        ]
    );
    assert_eq!(report.total, 3);
    assert_eq!(report.normalized.len(), 3);
    assert_eq!(modified(&dir.join("aaa.mp4")), at("2019-01-01T00:00:00Z"));
    assert_eq!(modified(&dir.join("bbb.mp4")), at("2020-02-02T02:02:02Z"));
    assert_eq!(modified(&dir.join("ccc.mp4")), at("2021-05-05T05:05:05Z"));
}

#[test]
fn failing_entry_does_not_stop_the_batch() {
    let root = tempdir().unwrap();
    let downloader = FileWritingDownloader {
        failing: HashSet::from(["bbb"]),
        ..FileWritingDownloader::default()
    };
    let fetcher = FetchOrchestrator::new(&downloader, &BasicTimestampWriter).with_retry(no_delay());
    let archiver = Archiver::new(MetadataResolver::new(FakeApi), &fetcher, root.path());

    let report = archiver
        .archive_channel("@Demo", &DownloadOptions::default())
        .unwrap();

    assert_eq!(report.failed, vec!["https://youtu.be/bbb".to_string()]);
    assert_eq!(report.normalized.len(), 2);
    let bbb_calls = downloader
        .calls
        .borrow()
        .iter()
        .filter(|url| url.ends_with("/bbb"))
        .count();
    assert_eq!(bbb_calls, 3);
    assert!(root.path().join("Demo").join("ccc.mp4").exists());
}

#[test]
fn resume_replays_manifest_without_the_api() {
    let root = tempdir().unwrap();
    let options = DownloadOptions {
        format: ContainerFormat::Mkv,
        ..DownloadOptions::default()
    };

    let first = FileWritingDownloader::default();
    let fetcher = FetchOrchestrator::new(&first, &BasicTimestampWriter).with_retry(no_delay());
    Archiver::new(MetadataResolver::new(FakeApi), &fetcher, root.path())
        .archive_channel("@Demo", &options)
        .unwrap();

    let channel_dir = root.path().join("Demo");
    let manifest_before = fs::read_to_string(channel_dir.join(MANIFEST_FILE)).unwrap();
    fs::remove_file(channel_dir.join("bbb.mkv")).unwrap();

    let second = FileWritingDownloader::default();
    let fetcher = FetchOrchestrator::new(&second, &BasicTimestampWriter).with_retry(no_delay());
    let report = app::resume_channel(&fetcher, root.path(), "@Demo", &options).unwrap();

    assert_eq!(second.calls.borrow().len(), 3);
    assert_eq!(report.normalized, vec![channel_dir.join("bbb.mkv")]);
    assert_eq!(report.no_new_file.len(), 2);
    assert_eq!(
        fs::read_to_string(channel_dir.join(MANIFEST_FILE)).unwrap(),
        manifest_before
    );
    assert_eq!(
        modified(&channel_dir.join("bbb.mkv")),
        at("2020-02-02T02:02:02Z")
    );
}

#[test]
fn unknown_channel_fails_before_any_download() {
    let root = tempdir().unwrap();
    let downloader = FileWritingDownloader::default();
    let fetcher = FetchOrchestrator::new(&downloader, &BasicTimestampWriter);
    let archiver = Archiver::new(MetadataResolver::new(FakeApi), &fetcher, root.path());

    let err = archiver
        .archive_channel("@Nobody", &DownloadOptions::default())
        .unwrap_err();

    assert!(matches!(err, ArchiveError::NotFound(_)));
    assert!(downloader.calls.borrow().is_empty());
    assert!(manifest::read(&root.path().join("Nobody").join(MANIFEST_FILE)).is_err());
}

#[test]
fn single_video_lands_in_default_directory() {
    let root = tempdir().unwrap();
    let downloader = FileWritingDownloader::default();
    let fetcher = FetchOrchestrator::new(&downloader, &BasicTimestampWriter);
    let archiver = Archiver::new(MetadataResolver::new(FakeApi), &fetcher, root.path());

    let report = archiver
        .archive_video(
            "https://www.youtube.com/watch?v=solo",
            None,
            &DownloadOptions::default(),
        )
        .unwrap();

    let path = root.path().join(app::SINGLE_VIDEO_DIR).join("solo.mp4");
    assert_eq!(report.normalized, vec![path.clone()]);
    assert_eq!(modified(&path), at("2012-12-12T12:12:12Z"));
}
