//! Power-aware tracking.
//!
//! - [`TrackerMachine`] - the state machine deciding what the device should do
//! - [`TrackerDaemon`] - single-writer task driving the machine
//! - [`TrackerHandle`] - cloneable, non-blocking entry point for device events
//!
//! # Wiring
//!
//! Ports are built first and handed to the machine, which is then handed to
//! the daemon:
//!
//! ```ignore
//! let machine = TrackerMachine::new(config, ports, store, sink)?;
//! let (daemon, handle) = TrackerDaemon::new(machine, TrackerDaemonConfig::default());
//! tokio::spawn(daemon.run(shutdown.clone()));
//! handle.start()?;
//! ```

mod daemon;
mod handle;
mod machine;
mod state;

pub use daemon::{TrackerCommand, TrackerDaemon, TrackerDaemonConfig, MIN_WATCHDOG_INTERVAL};
pub use handle::TrackerHandle;
pub use machine::{ScheduledRestart, TrackerMachine, TrackerPorts, REGION_ID_PREFIX};
pub use state::{TrackState, TrackerState, TrackerStatus};
