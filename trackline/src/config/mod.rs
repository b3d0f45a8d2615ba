//! Configuration for the tracker and its daemon.
//!
//! [`TrackerConfig`] holds the thresholds consumed by the state machine.
//! [`ConfigFile`] groups it with daemon and logging settings loaded from
//! `~/.trackline/config.ini`:
//!
//! ```ini
//! [tracker]
//! minimum_horizontal_accuracy = 50
//! max_wait_for_first_fix_secs = 60
//!
//! [daemon]
//! watchdog_interval_secs = 5
//!
//! [logging]
//! directory = ~/.trackline/logs
//! ```
//!
//! Missing keys keep their defaults. Durations are given in seconds.

pub mod defaults;
mod file;
mod parser;
mod settings;
mod tracker;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, DaemonSettings, LoggingSettings};
pub use tracker::TrackerConfig;
