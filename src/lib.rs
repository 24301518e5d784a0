#![forbid(unsafe_code)]

//! Archives YouTube channels, playlists and single videos through `yt-dlp`,
//! stamping every downloaded file with the video's original publish time.
//!
//! The pipeline runs in three stages: [`resolver`] turns a channel handle or
//! playlist into a dated list that [`manifest`] checkpoints to disk, then
//! [`fetch`] walks that list one entry at a time.

pub mod api;
pub mod app;
pub mod config;
pub mod downloader;
pub mod error;
pub mod fetch;
pub mod file_resolver;
pub mod logging;
pub mod manifest;
pub mod menu;
pub mod model;
pub mod resolver;
pub mod timestamps;

pub use error::{ArchiveError, Result};
