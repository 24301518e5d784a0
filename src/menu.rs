#![forbid(unsafe_code)]

//! Interactive menu. One pass over the prompts produces a [`Command`]; the
//! pipeline itself never reads from the console.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::config::{
    API_KEY_VAR, ARCHIVE_ROOT_VAR, ArchiverConfig, COOKIES_VAR, DOWNLOADER_VAR, FORMAT_VAR,
    JS_RUNTIME_VAR,
};
use crate::model::{Browser, ContainerFormat, DownloadOptions};

/// Typed at a prompt to clear an optional value instead of keeping it.
pub const CLEAR_KEYWORD: &str = "none";

/// A fully specified request for the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    DownloadChannel {
        handle: String,
        options: DownloadOptions,
    },
    ResumeChannel {
        handle: String,
        options: DownloadOptions,
    },
    DownloadVideo {
        url: String,
        output_dir: Option<PathBuf>,
        options: DownloadOptions,
    },
    DownloadPlaylist {
        reference: String,
        options: DownloadOptions,
    },
    UpdateDownloader,
    EditSettings(Vec<SettingChange>),
    Quit,
}

/// One settings key to persist; an empty value clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingChange {
    pub key: &'static str,
    pub value: String,
}

/// Line-based prompts over any reader/writer pair.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Prints `question` and reads one trimmed line. `None` means the input
    /// is exhausted.
    pub fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.output, "{question}\n>")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Like [`ask`](Self::ask) but treats end of input as an error, for
    /// prompts in the middle of a command.
    pub fn ask_required(&mut self, question: &str) -> io::Result<String> {
        self.ask(question)?
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"))
    }

    pub fn say(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, "{message}")
    }
}

const MAIN_MENU: &str = "What do you want to do?\n\
[1] Download an entire channel\n\
[2] Resume a channel from its video list file\n\
[3] Download a single video by URL\n\
[4] Download a playlist\n\
[5] Update the downloader\n\
[6] Edit settings\n\
[7] Quit";

/// Shows the main menu until a valid choice is made, then gathers what that
/// choice needs. End of input is treated as quitting.
pub fn read_command<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    config: &ArchiverConfig,
) -> io::Result<Command> {
    loop {
        let Some(choice) = prompter.ask(MAIN_MENU)? else {
            return Ok(Command::Quit);
        };
        let command = match choice.as_str() {
            "1" => {
                let handle = ask_non_empty(prompter, "Enter channel handle (e.g. @ChannelName):")?;
                let options = read_download_options(prompter, config)?;
                Command::DownloadChannel { handle, options }
            }
            "2" => {
                prompter.say(
                    "INFO: This option resumes from the video list saved by a previous channel download.",
                )?;
                let handle = ask_non_empty(prompter, "Enter channel handle (e.g. @ChannelName):")?;
                let options = read_download_options(prompter, config)?;
                Command::ResumeChannel { handle, options }
            }
            "3" => {
                let url = ask_non_empty(prompter, "Enter video URL:")?;
                let options = read_download_options(prompter, config)?;
                let default_dir = config.archive_root.join("single");
                let output_dir = prompter.ask_required(&format!(
                    "Enter output directory (default: {}):",
                    default_dir.display()
                ))?;
                let output_dir = (!output_dir.is_empty()).then(|| PathBuf::from(output_dir));
                Command::DownloadVideo {
                    url,
                    output_dir,
                    options,
                }
            }
            "4" => {
                let reference = ask_non_empty(prompter, "Enter playlist URL or ID:")?;
                let options = read_download_options(prompter, config)?;
                Command::DownloadPlaylist { reference, options }
            }
            "5" => Command::UpdateDownloader,
            "6" => Command::EditSettings(read_setting_changes(prompter, config)?),
            "7" => Command::Quit,
            _ => {
                prompter.say("Invalid input. Try again.")?;
                continue;
            }
        };
        return Ok(command);
    }
}

fn ask_non_empty<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    question: &str,
) -> io::Result<String> {
    loop {
        let answer = prompter.ask_required(question)?;
        if !answer.is_empty() {
            return Ok(answer);
        }
        prompter.say("A value is required.")?;
    }
}

/// Asks for the container format and cookie/runtime sources, defaulting to
/// the configured values.
pub fn read_download_options<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    config: &ArchiverConfig,
) -> io::Result<DownloadOptions> {
    let format = loop {
        let answer = prompter.ask_required(&format!(
            "Container format, mp4 or mkv (default: {}):",
            config.format
        ))?;
        if answer.is_empty() {
            break config.format;
        }
        match answer.parse::<ContainerFormat>() {
            Ok(format) => break format,
            Err(_) => prompter.say("Please answer mp4 or mkv.")?,
        }
    };

    let browser = ask_optional(
        prompter,
        "Browser to use cookies from (firefox, chrome, safari)",
        config.cookies_browser.as_deref(),
    )?;
    let browser_known = browser
        .as_deref()
        .is_some_and(|name| name.parse::<Browser>().is_ok());
    let runtime = if browser_known {
        ask_optional(
            prompter,
            "JS runtime to use (deno, node, bun, quickjs)",
            config.js_runtime.as_deref(),
        )?
    } else {
        None
    };

    Ok(DownloadOptions::from_names(
        format,
        browser.as_deref(),
        runtime.as_deref(),
    ))
}

/// Blank keeps `current`, `none` clears it, anything else replaces it.
fn ask_optional<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    label: &str,
    current: Option<&str>,
) -> io::Result<Option<String>> {
    let answer = prompter.ask_required(&format!(
        "{label} (current: {}, '{CLEAR_KEYWORD}' to disable):",
        current.unwrap_or(CLEAR_KEYWORD)
    ))?;
    if answer.is_empty() {
        return Ok(current.map(str::to_string));
    }
    if answer.eq_ignore_ascii_case(CLEAR_KEYWORD) {
        return Ok(None);
    }
    Ok(Some(answer))
}

fn read_setting_changes<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    config: &ArchiverConfig,
) -> io::Result<Vec<SettingChange>> {
    prompter.say("Leave a field blank to keep its current value.")?;
    let archive_root = config.archive_root.display().to_string();
    let downloader = config.downloader.display().to_string();
    let format = config.format.to_string();
    let masked_key = config.api_key.as_deref().map(mask_secret);

    let fields: [(&'static str, &str, Option<&str>, bool); 6] = [
        (API_KEY_VAR, "API key", masked_key.as_deref(), true),
        (ARCHIVE_ROOT_VAR, "Archive directory", Some(&archive_root), false),
        (DOWNLOADER_VAR, "Downloader executable", Some(&downloader), false),
        (FORMAT_VAR, "Default container format (mp4/mkv)", Some(&format), false),
        (COOKIES_VAR, "Default cookie browser", config.cookies_browser.as_deref(), true),
        (JS_RUNTIME_VAR, "Default JS runtime", config.js_runtime.as_deref(), true),
    ];

    let mut changes = Vec::new();
    for (key, label, current, clearable) in fields {
        let hint = if clearable {
            format!(", '{CLEAR_KEYWORD}' to clear")
        } else {
            String::new()
        };
        let answer = prompter.ask_required(&format!(
            "{label} (current: {}{hint}):",
            current.unwrap_or("unset")
        ))?;
        if answer.is_empty() {
            continue;
        }
        if key == FORMAT_VAR && answer.parse::<ContainerFormat>().is_err() {
            prompter.say("Unknown format, keeping the current one.")?;
            continue;
        }
        let value = if clearable && answer.eq_ignore_ascii_case(CLEAR_KEYWORD) {
            String::new()
        } else {
            answer
        };
        changes.push(SettingChange { key, value });
    }
    Ok(changes)
}

fn mask_secret(secret: &str) -> String {
    let skip = secret.chars().count().saturating_sub(4);
    let tail: String = secret.chars().skip(skip).collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JsRuntime;
    use std::io::Cursor;

    fn config() -> ArchiverConfig {
        ArchiverConfig {
            api_key: Some("secret-key-1234".into()),
            archive_root: PathBuf::from("saved"),
            downloader: PathBuf::from("yt-dlp"),
            api_base_url: "http://localhost".into(),
            format: ContainerFormat::Mp4,
            cookies_browser: None,
            js_runtime: None,
            env_path: PathBuf::from(".env"),
        }
    }

    fn run(script: &str) -> (io::Result<Command>, String) {
        let mut output = Vec::new();
        let result = {
            let mut prompter = Prompter::new(Cursor::new(script.as_bytes().to_vec()), &mut output);
            read_command(&mut prompter, &config())
        };
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn channel_download_with_cookies_and_runtime() {
        let (command, _) = run("1\n@Someone\nmkv\nfirefox\ndeno\n");
        assert_eq!(
            command.unwrap(),
            Command::DownloadChannel {
                handle: "@Someone".into(),
                options: DownloadOptions {
                    format: ContainerFormat::Mkv,
                    cookies_browser: Some(Browser::Firefox),
                    js_runtime: Some(JsRuntime::Deno),
                },
            }
        );
    }

    #[test]
    fn invalid_choice_reprompts() {
        let (command, output) = run("9\n5\n");
        assert_eq!(command.unwrap(), Command::UpdateDownloader);
        assert!(output.contains("Invalid input. Try again."));
    }

    #[test]
    fn blank_answers_use_configured_defaults() {
        let (command, _) = run("4\nhttps://www.youtube.com/playlist?list=PL1\n\n\n");
        assert_eq!(
            command.unwrap(),
            Command::DownloadPlaylist {
                reference: "https://www.youtube.com/playlist?list=PL1".into(),
                options: DownloadOptions::default(),
            }
        );
    }

    #[test]
    fn unknown_browser_skips_runtime_prompt() {
        let (command, output) = run("2\n@Someone\nmp4\nnetscape\n");
        assert_eq!(
            command.unwrap(),
            Command::ResumeChannel {
                handle: "@Someone".into(),
                options: DownloadOptions::default(),
            }
        );
        assert!(!output.contains("JS runtime"));
    }

    #[test]
    fn single_video_with_custom_directory() {
        let (command, _) = run("3\nhttps://youtu.be/abc\n\nnone\n/tmp/out\n");
        assert_eq!(
            command.unwrap(),
            Command::DownloadVideo {
                url: "https://youtu.be/abc".into(),
                output_dir: Some(PathBuf::from("/tmp/out")),
                options: DownloadOptions::default(),
            }
        );
    }

    #[test]
    fn end_of_input_quits() {
        let (command, _) = run("");
        assert_eq!(command.unwrap(), Command::Quit);
    }

    #[test]
    fn end_of_input_mid_command_is_an_error() {
        let (command, _) = run("1\n@Someone\n");
        assert_eq!(command.unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn settings_collect_only_changed_fields() {
        let (command, output) = run("6\n\n/srv/archive\n\navi\nchrome\nnone\n");
        assert_eq!(
            command.unwrap(),
            Command::EditSettings(vec![
                SettingChange {
                    key: ARCHIVE_ROOT_VAR,
                    value: "/srv/archive".into()
                },
                SettingChange {
                    key: COOKIES_VAR,
                    value: "chrome".into()
                },
                SettingChange {
                    key: JS_RUNTIME_VAR,
                    value: String::new()
                },
            ])
        );
        assert!(output.contains("****1234"));
        assert!(!output.contains("secret-key"));
    }
}
