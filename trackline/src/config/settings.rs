//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing logic.

use std::path::PathBuf;
use std::time::Duration;

use super::defaults::*;
use super::file::config_directory;
use super::tracker::TrackerConfig;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// `[tracker]` thresholds and budgets
    pub tracker: TrackerConfig,
    /// `[daemon]` scheduling settings
    pub daemon: DaemonSettings,
    /// `[logging]` settings
    pub logging: LoggingSettings,
}

/// Tracker daemon settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSettings {
    /// Interval of the first-fix/next-fix deadline watchdog.
    pub watchdog_interval: Duration,
    /// Delay between a region exit and the restart it schedules.
    pub region_restart_delay: Duration,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Directory holding the log file.
    pub directory: PathBuf,
    /// Log file name.
    pub file: String,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            region_restart_delay: DEFAULT_REGION_RESTART_DELAY,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: config_directory().join("logs"),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            daemon: DaemonSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}
