//! Command-line interface
//!
//! `glimmr run` is the daemon. The other commands either talk to it over the
//! control socket or, for library edits, work on the config file directly.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::ConfigStore;
use crate::constants;
use crate::daemon::{self, DaemonOptions};
use crate::ipc::{ControlClient, ControlRequest, ControlResponse};
use crate::library;
use crate::persistence::JsonFile;

/// Periodically show animated GIFs as desktop overlays.
#[derive(Parser, Debug)]
#[command(name = "glimmr", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, global = true, env = constants::config::PATH_ENV)]
    pub config: Option<PathBuf>,

    /// Log at debug level (overrides LOG_LEVEL).
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the daemon.
    Run {
        /// Log surface operations instead of opening windows.
        #[arg(long)]
        headless: bool,

        /// Start the display cycle immediately.
        #[arg(long)]
        start: bool,
    },

    /// Start the display cycle.
    Start,

    /// Stop the display cycle and hide the current image.
    Stop,

    /// Show daemon state.
    Status,

    /// Show an image now for a few seconds (random library image if omitted).
    Show { path: Option<PathBuf> },

    /// Set the target overlay size in pixels.
    Size { pixels: u32 },

    /// Add a .gif file to the library.
    Add { path: PathBuf },

    /// Remove a file from the library.
    Remove { path: PathBuf },

    /// List library images.
    List,

    /// Add every .gif below a directory to the library.
    Import { dir: PathBuf },

    /// Ask the daemon to exit.
    Shutdown,
}

pub fn execute(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(JsonFile::default_path);

    match cli.command {
        Commands::Run { headless, start } => daemon::run(DaemonOptions { config_path, headless, start }),
        Commands::Start => send(ControlRequest::Start),
        Commands::Stop => send(ControlRequest::Stop),
        Commands::Status => send(ControlRequest::Status),
        Commands::Show { path } => {
            let path = path.map(|p| absolute(&p));
            send(ControlRequest::ShowNow { path })
        }
        Commands::Size { pixels } => {
            if pixels == 0 {
                bail!("Size must be positive");
            }
            send(ControlRequest::SetGifSize(pixels))
        }
        Commands::Add { path } => {
            let path = library::validate_new_image(&path)?;
            send_or_edit(ControlRequest::AddPath(path.clone()), &config_path, |store| {
                if !store.add_path(path) {
                    println!("Already in library");
                }
            })
        }
        Commands::Remove { path } => {
            let path = absolute(&path);
            send_or_edit(ControlRequest::RemovePath(path.clone()), &config_path, |store| {
                if !store.remove_path(&path) {
                    println!("Not in library");
                }
            })
        }
        Commands::List => {
            let store = open_store(&config_path);
            for path in &store.get().image_paths {
                println!("{}", path.display());
            }
            Ok(())
        }
        Commands::Import { dir } => {
            let found = library::scan_dir(&dir)?;
            let count = found.len();
            let mut store = open_store(&config_path);
            let added = found.into_iter().filter(|path| store.add_path(path.clone())).count();
            println!("Found {count} images, added {added}");
            Ok(())
        }
        Commands::Shutdown => send(ControlRequest::Shutdown),
    }
}

fn open_store(config_path: &Path) -> ConfigStore {
    ConfigStore::open_with_defaults(Box::new(JsonFile::new(config_path)), library::first_run_defaults)
}

/// Paths are resolved here because the daemon has its own working directory
fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn connect() -> Result<ControlClient> {
    ControlClient::connect().context("glimmr daemon is not running (start it with `glimmr run`)")
}

fn send(request: ControlRequest) -> Result<()> {
    let response = connect()?.request(&request)?;
    print_response(response)
}

/// Prefer the daemon so its in-memory config stays authoritative; fall back
/// to editing the file when nothing is listening.
fn send_or_edit(request: ControlRequest, config_path: &Path, edit: impl FnOnce(&mut ConfigStore)) -> Result<()> {
    match connect() {
        Ok(mut client) => print_response(client.request(&request)?),
        Err(e) => {
            debug!(error = ?e, "No daemon, editing config file directly");
            let mut store = open_store(config_path);
            edit(&mut store);
            info!(config = %config_path.display(), "Library updated");
            Ok(())
        }
    }
}

fn print_response(response: ControlResponse) -> Result<()> {
    match response {
        ControlResponse::Ok => Ok(()),
        ControlResponse::Pong => {
            println!("pong");
            Ok(())
        }
        ControlResponse::Status { running, phase, showing, library_size } => {
            println!("running: {running}");
            println!("phase: {phase:?}");
            match showing {
                Some(path) => println!("showing: {}", path.display()),
                None => println!("showing: -"),
            }
            println!("library: {library_size} images");
            Ok(())
        }
        ControlResponse::Error(message) => bail!(message),
    }
}
