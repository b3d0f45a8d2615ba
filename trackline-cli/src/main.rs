//! trackline CLI - Command-line interface
//!
//! Inspects track files and replays scripted fix sequences through a
//! tracker wired to simulated device services.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::replay::ReplayArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "trackline")]
#[command(version = trackline::VERSION)]
#[command(about = "Power-aware GPS trajectory tracking", long_about = None)]
struct Cli {
    /// Directory for the log file (overrides the config file)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Enable debug-level logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every record of a track file
    Dump {
        /// Track file to read
        track_file: PathBuf,
    },
    /// Feed a scripted fix sequence through a simulated tracker
    Replay {
        /// Script with one `lat,lon,accuracy,unix_seconds` fix per line
        #[arg(long)]
        input: PathBuf,

        /// Track file the accepted fixes are appended to
        #[arg(long)]
        track: PathBuf,

        /// Config file (defaults to ~/.trackline/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Put the application in the background after starting
        #[arg(long)]
        background: bool,

        /// Battery level (0.0 to 1.0) of an unplugged device
        #[arg(long, value_parser = parse_battery_level)]
        battery: Option<f64>,

        /// Clear the track file before replaying
        #[arg(long)]
        clear: bool,
    },
}

fn parse_battery_level(value: &str) -> Result<f64, String> {
    let level: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if (0.0..=1.0).contains(&level) {
        Ok(level)
    } else {
        Err(format!("battery level must be between 0.0 and 1.0, got {}", level))
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Dump { track_file } => commands::dump::run(&track_file),
        Commands::Replay {
            input,
            track,
            config,
            background,
            battery,
            clear,
        } => {
            let runner = CliRunner::new(config.as_deref(), cli.log_dir.as_deref(), cli.debug)?;
            commands::replay::run(
                ReplayArgs {
                    input,
                    track,
                    background,
                    battery,
                    clear,
                },
                &runner,
            )
        }
    }
}
