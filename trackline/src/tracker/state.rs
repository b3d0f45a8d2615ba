//! Tracker state types.
//!
//! - [`TrackerState`] - which mode the tracker is in
//! - [`TrackState`] - everything the state machine owns
//! - [`TrackerStatus`] - snapshot published to consumers

use chrono::{DateTime, Utc};

use crate::fix::Fix;
use crate::ports::AppState;

/// Tracking mode.
///
/// `Started`, `Deferring` and `MonitoringRegion` are the active modes; the
/// remaining ones mean no positioning session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerState {
    /// Not tracking.
    #[default]
    Stopped,
    /// Continuous location updates.
    Started,
    /// Updates running with deferred (batched) delivery allowed.
    Deferring,
    /// Updates stopped; waiting for the device to leave a stationary region.
    MonitoringRegion,
    /// Suspended until the battery recovers or the device is plugged in.
    PausedOnLowBattery,
    /// Suspended until "always" authorization is granted.
    PausedOnAuthorizationRefused,
}

impl TrackerState {
    /// Returns true for the modes with a positioning or geofence session.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Started | Self::Deferring | Self::MonitoringRegion)
    }

    /// Returns true if fix batches are processed in this mode.
    pub fn accepts_fixes(&self) -> bool {
        matches!(self, Self::Started | Self::Deferring)
    }
}

impl std::fmt::Display for TrackerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Started => write!(f, "Started"),
            Self::Deferring => write!(f, "Deferring"),
            Self::MonitoringRegion => write!(f, "MonitoringRegion"),
            Self::PausedOnLowBattery => write!(f, "PausedOnLowBattery"),
            Self::PausedOnAuthorizationRefused => write!(f, "PausedOnAuthorizationRefused"),
        }
    }
}

/// State owned and mutated only by the tracking state machine.
///
/// Cleared on every stop (except `state`, `awaiting_authorization` and
/// `app_state`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackState {
    pub state: TrackerState,

    /// Most recent significant fix of this cycle.
    pub last_fix: Option<Fix>,

    /// Where the device was when it last moved noticeably.
    pub stationary_anchor: Option<Fix>,

    /// When the current start cycle began.
    pub started_at: Option<DateTime<Utc>>,

    /// Timestamp of the first accepted fix of this cycle.
    pub first_fix_at: Option<DateTime<Utc>>,

    /// Id of the region being monitored while `MonitoringRegion`.
    pub region: Option<String>,

    /// A start was requested while authorization was undetermined.
    pub awaiting_authorization: bool,

    /// Foreground/background state of the host application.
    pub app_state: AppState,
}

impl TrackState {
    /// Forget the per-cycle bookkeeping.
    pub(crate) fn reset_cycle(&mut self) {
        self.last_fix = None;
        self.stationary_anchor = None;
        self.started_at = None;
        self.first_fix_at = None;
        self.region = None;
    }
}

/// Snapshot of the tracker published after every command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerStatus {
    pub state: TrackerState,
    pub last_fix: Option<Fix>,
    pub started_at: Option<DateTime<Utc>>,
    pub region: Option<String>,
}

impl From<&TrackState> for TrackerStatus {
    fn from(track: &TrackState) -> Self {
        Self {
            state: track.state,
            last_fix: track.last_fix,
            started_at: track.started_at,
            region: track.region.clone(),
        }
    }
}
