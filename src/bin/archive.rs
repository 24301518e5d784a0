#![forbid(unsafe_code)]

//! Interactive archiver. Shows the menu, runs the chosen task, repeats.

use anyhow::Result;
use clap::Parser;
use std::io;
use std::path::PathBuf;
use tube_archiver::{
    app,
    config::{ConfigOverrides, resolve_config},
    downloader::YtDlp,
    logging,
    menu::{self, Command, Prompter},
};

#[derive(Parser, Debug)]
#[command(name = "archive", version, about = "Archive YouTube channels and playlists")]
struct Cli {
    /// Settings file read at startup and updated by the settings menu.
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Directory every channel and playlist is archived under.
    #[arg(long, value_name = "DIR")]
    archive_root: Option<PathBuf>,

    /// Path to the yt-dlp executable.
    #[arg(long = "yt-dlp", value_name = "PATH")]
    yt_dlp: Option<PathBuf>,

    /// YouTube Data API key; takes precedence over the settings file.
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,

    /// Log debug detail to stderr.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = resolve_config(ConfigOverrides {
        api_key: cli.api_key,
        archive_root: cli.archive_root,
        downloader: cli.yt_dlp,
        env_path: cli.env_file,
    })?;
    tracing::debug!(
        archive_root = %config.archive_root.display(),
        downloader = %config.downloader.display(),
        settings = %config.env_path.display(),
        "configuration loaded"
    );

    // Settings and self-update stay reachable with a broken install.
    if let Err(err) = YtDlp::new(&config.downloader).ensure_available() {
        eprintln!("Warning: {err:#}");
        eprintln!("Downloads will fail until the downloader is installed or configured.");
    }

    let mut prompter = Prompter::stdio();
    loop {
        let command = match menu::read_command(&mut prompter, &config) {
            Ok(Command::Quit) => break,
            Ok(command) => command,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        };
        if let Err(err) = app::execute(&mut config, command, &mut prompter) {
            eprintln!("Error: {err:#}");
        }
        println!("\n----- TASK COMPLETED -----\n");
    }
    Ok(())
}
