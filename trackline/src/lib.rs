//! trackline - power-aware GPS trajectory tracking
//!
//! This library turns a stream of raw location fixes into a durable,
//! down-sampled trajectory while adapting how the device samples its
//! position (continuous, deferred, geofence-triggered, paused) to battery,
//! authorization and movement.
//!
//! # High-Level API
//!
//! ```ignore
//! use trackline::observer::ChannelEventSink;
//! use trackline::persistence::TrackFile;
//! use trackline::tracker::{TrackerDaemon, TrackerDaemonConfig, TrackerMachine, TrackerPorts};
//!
//! let (sink, mut events) = ChannelEventSink::new();
//! let machine = TrackerMachine::new(config, ports, Arc::new(TrackFile::new(path)), Arc::new(sink))?;
//! let (daemon, handle) = TrackerDaemon::new(machine, TrackerDaemonConfig::default());
//! tokio::spawn(daemon.run(shutdown.clone()));
//!
//! handle.start()?;
//! handle.fixes(batch)?;
//! while let Some(event) = events.recv().await {
//!     println!("{event}");
//! }
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod fix;
pub mod logging;
pub mod observer;
pub mod persistence;
pub mod ports;
pub mod sim;
pub mod tracker;

/// Version of the trackline library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
