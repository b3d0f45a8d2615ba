//! Handle for feeding events to a running tracker.
//!
//! The [`TrackerHandle`] is returned by [`TrackerDaemon::new`](super::TrackerDaemon::new).
//! Device services call it from any thread or task; every method except
//! [`TrackerHandle::flush`] only enqueues and returns immediately.
//!
//! # Example
//!
//! ```ignore
//! let handle = tracker_handle.clone();
//!
//! // From the positioning callback
//! handle.fixes(batch)?;
//!
//! // From the power service
//! handle.battery_level_changed(0.15)?;
//!
//! // Current status without waiting
//! println!("Tracker is {}", handle.status().state);
//! ```

use tokio::sync::{mpsc, oneshot, watch};

use super::daemon::TrackerCommand;
use super::state::TrackerStatus;
use crate::error::{PositioningError, TrackerError};
use crate::fix::Fix;
use crate::ports::{AppState, AuthorizationStatus, BatteryState};

/// Cloneable sender side of a [`TrackerDaemon`](super::TrackerDaemon).
///
/// All clones feed the same daemon. Methods return
/// [`TrackerError::Closed`] once the daemon has stopped.
#[derive(Clone, Debug)]
pub struct TrackerHandle {
    command_tx: mpsc::UnboundedSender<TrackerCommand>,
    status_rx: watch::Receiver<TrackerStatus>,
}

impl TrackerHandle {
    pub(crate) fn new(
        command_tx: mpsc::UnboundedSender<TrackerCommand>,
        status_rx: watch::Receiver<TrackerStatus>,
    ) -> Self {
        Self {
            command_tx,
            status_rx,
        }
    }

    /// Enqueue a raw command.
    pub fn send(&self, command: TrackerCommand) -> Result<(), TrackerError> {
        self.command_tx
            .send(command)
            .map_err(|_| TrackerError::Closed)
    }

    pub fn start(&self) -> Result<(), TrackerError> {
        self.send(TrackerCommand::Start)
    }

    pub fn stop(&self) -> Result<(), TrackerError> {
        self.send(TrackerCommand::Stop)
    }

    /// Deliver a batch of raw fixes from the positioning service.
    pub fn fixes(&self, batch: Vec<Fix>) -> Result<(), TrackerError> {
        self.send(TrackerCommand::Fixes(batch))
    }

    pub fn positioning_error(&self, error: PositioningError) -> Result<(), TrackerError> {
        self.send(TrackerCommand::PositioningError(error))
    }

    /// Deferred delivery ended, with the error the platform reported if any.
    pub fn deferred_updates_finished(
        &self,
        error: Option<PositioningError>,
    ) -> Result<(), TrackerError> {
        self.send(TrackerCommand::DeferredUpdatesFinished(error))
    }

    pub fn authorization_changed(&self, status: AuthorizationStatus) -> Result<(), TrackerError> {
        self.send(TrackerCommand::AuthorizationChanged(status))
    }

    pub fn updates_paused(&self) -> Result<(), TrackerError> {
        self.send(TrackerCommand::UpdatesPaused)
    }

    pub fn updates_resumed(&self) -> Result<(), TrackerError> {
        self.send(TrackerCommand::UpdatesResumed)
    }

    pub fn battery_level_changed(&self, level: f64) -> Result<(), TrackerError> {
        self.send(TrackerCommand::BatteryLevelChanged(level))
    }

    pub fn battery_state_changed(&self, state: BatteryState) -> Result<(), TrackerError> {
        self.send(TrackerCommand::BatteryStateChanged(state))
    }

    pub fn region_exited(&self, region_id: impl Into<String>) -> Result<(), TrackerError> {
        self.send(TrackerCommand::RegionExited(region_id.into()))
    }

    pub fn region_monitoring_started(
        &self,
        region_id: impl Into<String>,
    ) -> Result<(), TrackerError> {
        self.send(TrackerCommand::RegionMonitoringStarted(region_id.into()))
    }

    pub fn region_monitoring_failed(
        &self,
        region_id: Option<String>,
        reason: impl Into<String>,
    ) -> Result<(), TrackerError> {
        self.send(TrackerCommand::RegionMonitoringFailed {
            region_id,
            reason: reason.into(),
        })
    }

    pub fn app_state_changed(&self, state: AppState) -> Result<(), TrackerError> {
        self.send(TrackerCommand::AppStateChanged(state))
    }

    pub fn app_terminating(&self) -> Result<(), TrackerError> {
        self.send(TrackerCommand::AppTerminating)
    }

    /// Run the first-fix and next-fix deadline checks now.
    pub fn check_deadlines(&self) -> Result<(), TrackerError> {
        self.send(TrackerCommand::CheckDeadlines)
    }

    /// Wait until every command sent before this call has been handled.
    pub async fn flush(&self) -> Result<(), TrackerError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(TrackerCommand::Flush(ack_tx))?;
        ack_rx.await.map_err(|_| TrackerError::Closed)
    }

    /// Most recently published status.
    pub fn status(&self) -> TrackerStatus {
        self.status_rx.borrow().clone()
    }

    /// Receiver notified whenever the status changes.
    pub fn subscribe(&self) -> watch::Receiver<TrackerStatus> {
        self.status_rx.clone()
    }
}
