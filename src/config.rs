#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

use crate::api::DEFAULT_API_BASE;
use crate::model::{ContainerFormat, DownloadOptions};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_ARCHIVE_ROOT: &str = "saved";
pub const DEFAULT_DOWNLOADER: &str = "yt-dlp";

pub const API_KEY_VAR: &str = "YOUTUBE_API_KEY";
pub const ARCHIVE_ROOT_VAR: &str = "ARCHIVE_ROOT";
pub const DOWNLOADER_VAR: &str = "YT_DLP_PATH";
pub const API_BASE_VAR: &str = "YOUTUBE_API_BASE";
pub const FORMAT_VAR: &str = "VIDEO_FORMAT";
pub const COOKIES_VAR: &str = "COOKIES_BROWSER";
pub const JS_RUNTIME_VAR: &str = "JS_RUNTIME";

/// Settings resolved once at startup and passed to every command.
#[derive(Debug, Clone)]
pub struct ArchiverConfig {
    pub api_key: Option<String>,
    pub archive_root: PathBuf,
    pub downloader: PathBuf,
    pub api_base_url: String,
    pub format: ContainerFormat,
    pub cookies_browser: Option<String>,
    pub js_runtime: Option<String>,
    /// File that settings edits are written back to.
    pub env_path: PathBuf,
}

impl ArchiverConfig {
    /// Downloader options derived from the stored defaults. Unknown names
    /// are dropped with a warning.
    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions::from_names(
            self.format,
            self.cookies_browser.as_deref(),
            self.js_runtime.as_deref(),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub archive_root: Option<PathBuf>,
    pub downloader: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
}

pub fn load_config() -> Result<ArchiverConfig> {
    resolve_config(ConfigOverrides::default())
}

pub fn resolve_config(overrides: ConfigOverrides) -> Result<ArchiverConfig> {
    let env_path = overrides
        .env_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(&env_path)?;
    build_config_with_overrides(&file_vars, env_var_string, overrides, env_path)
}

fn build_config_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: ConfigOverrides,
    env_path: PathBuf,
) -> Result<ArchiverConfig> {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);

    let api_key = non_blank(overrides.api_key).or_else(|| lookup(API_KEY_VAR));
    let archive_root = overrides
        .archive_root
        .or_else(|| lookup(ARCHIVE_ROOT_VAR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE_ROOT));
    let downloader = overrides
        .downloader
        .or_else(|| lookup(DOWNLOADER_VAR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOADER));
    let api_base_url = lookup(API_BASE_VAR).unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let format = match lookup(FORMAT_VAR) {
        Some(value) => value
            .parse::<ContainerFormat>()
            .with_context(|| format!("invalid {FORMAT_VAR}"))?,
        None => ContainerFormat::default(),
    };

    Ok(ArchiverConfig {
        api_key,
        archive_root,
        downloader,
        api_base_url,
        format,
        cookies_browser: lookup(COOKIES_VAR),
        js_runtime: lookup(JS_RUNTIME_VAR),
        env_path,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_var_string(key: &str) -> Option<String> {
    non_blank(env::var(key).ok())
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| non_blank(file_vars.get(key).cloned()))
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .map(unescape_double_quoted)
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| value.to_string());
        vars.insert(key.to_string(), value);
    }
    Ok(vars)
}

fn unescape_double_quoted(value: &str) -> String {
    value.replace("\\\"", "\"").replace("\\\\", "\\")
}

/// Updates or appends a single setting inside the env file while preserving
/// unrelated lines and comments. An empty `value` clears the setting.
pub fn upsert_env_value(path: &Path, key: &str, value: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("Creating {}", parent.display()))?;
    }

    let raw = fs::read_to_string(path).unwrap_or_default();
    let mut lines = Vec::new();
    let mut updated = false;
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");

    for line in raw.lines() {
        let trimmed = line.trim_start();
        let indent_len = line.len() - trimmed.len();
        let indent = &line[..indent_len];
        let (prefix, rest) = if let Some(stripped) = trimmed.strip_prefix("export ") {
            ("export ", stripped)
        } else {
            ("", trimmed)
        };
        let Some((candidate, _)) = rest.split_once('=') else {
            lines.push(line.to_string());
            continue;
        };
        if candidate.trim() == key {
            lines.push(format!("{indent}{prefix}{key}=\"{escaped}\""));
            updated = true;
        } else {
            lines.push(line.to_string());
        }
    }

    if !updated {
        lines.push(format!("{key}=\"{escaped}\""));
    }

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, lines.join("\n") + "\n")
        .with_context(|| format!("Writing {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("Replacing {}", path.display()))?;
    Ok(())
}
