//! Drives the real `YtDlp` process wrapper against a shell stub that mimics
//! yt-dlp's `--version` and download behaviour.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::SystemTime;

use tempfile::tempdir;
use tube_archiver::downloader::YtDlp;
use tube_archiver::fetch::{EntryOutcome, FetchOrchestrator};
use tube_archiver::model::{ContainerFormat, DownloadOptions, VideoEntry, parse_timestamp};
use tube_archiver::timestamps::BasicTimestampWriter;

const STUB: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
    echo 2025.01.01
    exit 0
fi
out=""
fmt=""
prev=""
for arg in "$@"; do
    case "$prev" in
        -o) out="$arg" ;;
        --remux-video) fmt="$arg" ;;
    esac
    prev="$arg"
    url="$arg"
done
case "$url" in
    *broken*) exit 1 ;;
esac
dir=$(dirname "$out")
printf 'video' > "$dir/${url##*/}.$fmt"
"#;

fn install_stub(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("yt-dlp");
    fs::write(&path, STUB).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn stub_downloader_round_trip() {
    let tools = tempdir().unwrap();
    let out = tempdir().unwrap();
    let downloader = YtDlp::new(install_stub(tools.path()));
    downloader.ensure_available().unwrap();

    let fetcher = FetchOrchestrator::new(&downloader, &BasicTimestampWriter).with_retry(
        tube_archiver::fetch::RetryPolicy {
            max_attempts: 2,
            delay: std::time::Duration::ZERO,
        },
    );
    let options = DownloadOptions {
        format: ContainerFormat::Mkv,
        ..DownloadOptions::default()
    };
    let published = parse_timestamp("2016-07-08T09:10:11Z").unwrap();

    let ok = VideoEntry::new(published, "https://youtu.be/abc123");
    let outcome = fetcher.fetch_entry(&ok, out.path(), &options);
    let expected = out.path().join("abc123.mkv");
    assert_eq!(outcome, EntryOutcome::Normalized(expected.clone()));
    assert_eq!(
        fs::metadata(&expected).unwrap().modified().unwrap(),
        SystemTime::from(published)
    );

    let broken = VideoEntry::new(published, "https://youtu.be/broken");
    assert_eq!(
        fetcher.fetch_entry(&broken, out.path(), &options),
        EntryOutcome::Failed { attempts: 2 }
    );

    let missing = YtDlp::new(tools.path().join("not-installed"));
    assert!(missing.ensure_available().is_err());
}
