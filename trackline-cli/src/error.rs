//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use trackline::config::ConfigFileError;
use trackline::error::{PersistenceError, TrackerError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be loaded
    Config(ConfigFileError),
    /// Track file could not be read or written
    Track(PersistenceError),
    /// Replay script could not be read
    ScriptRead {
        path: PathBuf,
        error: std::io::Error,
    },
    /// Replay script line is malformed
    ScriptParse { line: usize, reason: String },
    /// Tracker stopped accepting commands
    Tracker(TrackerError),
    /// Async runtime could not be created
    Runtime(std::io::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::ScriptParse { .. } => {
                eprintln!();
                eprintln!("Replay scripts hold one fix per line:");
                eprintln!("  latitude,longitude,accuracy_m,unix_seconds");
                eprintln!("Lines starting with '#' are ignored; a blank line ends a batch.");
            }
            CliError::Config(ConfigFileError::InvalidValue { .. }) => {
                eprintln!();
                eprintln!("Fix the value in the config file or remove the key to use the default.");
            }
            _ => {}
        }

        process::exit(match self {
            CliError::ScriptParse { .. } | CliError::Config(_) => 2,
            _ => 1,
        })
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Track(e) => write!(f, "Track file error: {}", e),
            CliError::ScriptRead { path, error } => {
                write!(f, "Failed to read script '{}': {}", path.display(), error)
            }
            CliError::ScriptParse { line, reason } => {
                write!(f, "Invalid script line {}: {}", line, reason)
            }
            CliError::Tracker(e) => write!(f, "Tracker error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Track(e) => Some(e),
            CliError::ScriptRead { error, .. } => Some(error),
            CliError::Tracker(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<PersistenceError> for CliError {
    fn from(e: PersistenceError) -> Self {
        CliError::Track(e)
    }
}

impl From<TrackerError> for CliError {
    fn from(e: TrackerError) -> Self {
        CliError::Tracker(e)
    }
}
