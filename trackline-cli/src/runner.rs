//! CLI runner for common setup.
//!
//! Encapsulates configuration loading and logging initialization so command
//! handlers start from the same state.

use std::path::Path;

use tracing::info;
use trackline::config::ConfigFile;
use trackline::logging::{init_logging, LoggingGuard};

use crate::error::CliError;

/// Runner that manages CLI lifecycle.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Load configuration and initialize logging.
    ///
    /// `config_path` overrides the default `~/.trackline/config.ini` and
    /// `log_dir` overrides the configured log directory. Logs go to the file
    /// only; stdout belongs to command output.
    pub fn new(
        config_path: Option<&Path>,
        log_dir: Option<&Path>,
        debug_mode: bool,
    ) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let log_dir = log_dir.unwrap_or(config.logging.directory.as_path());
        let logging_guard = init_logging(log_dir, &config.logging.file, false, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("trackline v{}", trackline::VERSION);
        info!(command, "trackline CLI command");
    }
}
