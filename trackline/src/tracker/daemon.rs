//! Tracker daemon: the single writer of tracker state.
//!
//! The [`TrackerDaemon`] owns the [`TrackerMachine`] and drains one command
//! channel, so events from independent sources (positioning callbacks,
//! battery notifications, geofence exits) are applied in one strict order.
//!
//! # Architecture
//!
//! ```text
//!  TrackerHandle ──► command channel ──► TrackerDaemon::run ──► TrackerMachine
//!        ▲                                  │      │
//!        │                                  │      └─► watchdog tick (deadlines)
//!        └── ResumeFromRegion ◄── restart task (child CancellationToken)
//!                                           │
//!                                           └─► watch channel (TrackerStatus)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use trackline::tracker::{TrackerDaemon, TrackerDaemonConfig};
//!
//! let (daemon, handle) = TrackerDaemon::new(machine, TrackerDaemonConfig::default());
//!
//! let shutdown = CancellationToken::new();
//! tokio::spawn(daemon.run(shutdown.clone()));
//!
//! handle.start()?;
//! handle.fixes(batch)?;
//! handle.flush().await?;
//! ```

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handle::TrackerHandle;
use super::machine::{ScheduledRestart, TrackerMachine};
use super::state::TrackerStatus;
use crate::config::defaults::{DEFAULT_REGION_RESTART_DELAY, DEFAULT_WATCHDOG_INTERVAL};
use crate::config::DaemonSettings;
use crate::error::PositioningError;
use crate::fix::Fix;
use crate::ports::{AppState, AuthorizationStatus, BatteryState};

// =============================================================================
// Configuration
// =============================================================================

/// Shortest watchdog period the daemon runs with.
pub const MIN_WATCHDOG_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for the tracker daemon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerDaemonConfig {
    /// How often first-fix and next-fix deadlines are checked.
    pub watchdog_interval: Duration,

    /// Delay between a region exit and the restart it triggers.
    pub region_restart_delay: Duration,
}

impl Default for TrackerDaemonConfig {
    fn default() -> Self {
        Self {
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            region_restart_delay: DEFAULT_REGION_RESTART_DELAY,
        }
    }
}

impl TrackerDaemonConfig {
    /// Watchdog period actually used, never below [`MIN_WATCHDOG_INTERVAL`].
    pub fn watchdog_period(&self) -> Duration {
        if self.watchdog_interval < MIN_WATCHDOG_INTERVAL {
            warn!(
                configured_ms = self.watchdog_interval.as_millis() as u64,
                "Watchdog interval too short, using minimum"
            );
            MIN_WATCHDOG_INTERVAL
        } else {
            self.watchdog_interval
        }
    }
}

impl From<&DaemonSettings> for TrackerDaemonConfig {
    fn from(settings: &DaemonSettings) -> Self {
        Self {
            watchdog_interval: settings.watchdog_interval,
            region_restart_delay: settings.region_restart_delay,
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

/// One unit of work for the tracker.
#[derive(Debug)]
pub enum TrackerCommand {
    Start,
    Stop,
    Fixes(Vec<Fix>),
    PositioningError(PositioningError),
    DeferredUpdatesFinished(Option<PositioningError>),
    AuthorizationChanged(AuthorizationStatus),
    UpdatesPaused,
    UpdatesResumed,
    BatteryLevelChanged(f64),
    BatteryStateChanged(BatteryState),
    RegionExited(String),
    RegionMonitoringStarted(String),
    RegionMonitoringFailed {
        region_id: Option<String>,
        reason: String,
    },
    /// Scheduled restart after a region exit.
    ResumeFromRegion(String),
    AppStateChanged(AppState),
    AppTerminating,
    /// Run the deadline checks now instead of waiting for the watchdog.
    CheckDeadlines,
    /// Barrier: acknowledged once every earlier command has been handled.
    Flush(oneshot::Sender<()>),
}

// =============================================================================
// Daemon
// =============================================================================

/// Long-running owner of a [`TrackerMachine`].
pub struct TrackerDaemon {
    machine: TrackerMachine,
    config: TrackerDaemonConfig,
    command_rx: mpsc::UnboundedReceiver<TrackerCommand>,
    /// Weak so the daemon ends once every handle is dropped.
    command_tx: mpsc::WeakUnboundedSender<TrackerCommand>,
    status_tx: watch::Sender<TrackerStatus>,
}

impl TrackerDaemon {
    /// Create a daemon and the handle used to feed it.
    pub fn new(machine: TrackerMachine, config: TrackerDaemonConfig) -> (Self, TrackerHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(machine.status());

        let daemon = Self {
            machine,
            config,
            command_rx,
            command_tx: command_tx.downgrade(),
            status_tx,
        };
        let handle = TrackerHandle::new(command_tx, status_rx);

        (daemon, handle)
    }

    /// Run until `shutdown` is cancelled or every handle has been dropped.
    ///
    /// Returns the machine so callers can inspect the final state.
    pub async fn run(mut self, shutdown: CancellationToken) -> TrackerMachine {
        info!(
            watchdog_secs = self.config.watchdog_interval.as_secs_f64(),
            "Tracker daemon starting"
        );

        let mut watchdog = tokio::time::interval(self.config.watchdog_period());
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Watchdog ahead of commands: ready at most once per period.
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Tracker daemon shutting down");
                    break;
                }

                _ = watchdog.tick() => {
                    self.machine.check_deadlines();
                }

                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        info!("All tracker handles dropped");
                        break;
                    };
                    self.handle_command(command, &shutdown);
                }
            }

            self.publish_status();
        }

        info!(state = %self.machine.state(), "Tracker daemon stopped");
        self.machine
    }

    fn handle_command(&mut self, command: TrackerCommand, shutdown: &CancellationToken) {
        match command {
            TrackerCommand::Start => self.machine.start(),
            TrackerCommand::Stop => self.machine.stop(),
            TrackerCommand::Fixes(batch) => self.machine.on_fixes(&batch),
            TrackerCommand::PositioningError(error) => self.machine.on_positioning_error(error),
            TrackerCommand::DeferredUpdatesFinished(error) => {
                self.machine.on_deferred_finished(error)
            }
            TrackerCommand::AuthorizationChanged(status) => {
                self.machine.on_authorization_changed(status)
            }
            TrackerCommand::UpdatesPaused => self.machine.on_updates_paused(),
            TrackerCommand::UpdatesResumed => self.machine.on_updates_resumed(),
            TrackerCommand::BatteryLevelChanged(level) => {
                self.machine.on_battery_level_changed(level)
            }
            TrackerCommand::BatteryStateChanged(state) => {
                self.machine.on_battery_state_changed(state)
            }
            TrackerCommand::RegionExited(id) => {
                if let Some(restart) = self.machine.on_region_exited(&id) {
                    self.schedule_restart(restart, shutdown);
                }
            }
            TrackerCommand::RegionMonitoringStarted(id) => {
                self.machine.on_region_monitoring_started(&id)
            }
            TrackerCommand::RegionMonitoringFailed { region_id, reason } => self
                .machine
                .on_region_monitoring_failed(region_id.as_deref(), &reason),
            TrackerCommand::ResumeFromRegion(id) => self.machine.resume_from_region(&id),
            TrackerCommand::AppStateChanged(state) => self.machine.on_app_state_changed(state),
            TrackerCommand::AppTerminating => self.machine.on_app_terminating(),
            TrackerCommand::CheckDeadlines => self.machine.check_deadlines(),
            TrackerCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    /// Spawn the region-exit restart as an independent unit of work.
    ///
    /// The task holds a child of the daemon's shutdown token so a daemon that
    /// has shut down never restarts a session.
    fn schedule_restart(&self, restart: ScheduledRestart, shutdown: &CancellationToken) {
        let token = shutdown.child_token();
        let delay = self.config.region_restart_delay;
        let command_tx = self.command_tx.clone();

        debug!(
            region = %restart.region_id,
            delay_secs = delay.as_secs_f64(),
            "Scheduling restart after region exit"
        );

        tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    debug!(region = %restart.region_id, "Region restart cancelled");
                }

                _ = tokio::time::sleep(delay) => {
                    if let Some(tx) = command_tx.upgrade() {
                        let _ = tx.send(TrackerCommand::ResumeFromRegion(restart.region_id));
                    }
                }
            }
        });
    }

    fn publish_status(&self) {
        let status = self.machine.status();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}
