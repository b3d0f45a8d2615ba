//! The tracking state machine.
//!
//! [`TrackerMachine`] owns the [`TrackState`] and reacts to every external
//! event class: fix batches, deferred-delivery completion, authorization,
//! battery, geofence and application lifecycle changes. It commands the
//! device ports directly and reports through its [`EventSink`].
//!
//! # State Machine
//!
//! ```text
//! Stopped --[start, authorized always]--> Started
//! Started --[backgrounded batch]--> Deferring --[foreground / start]--> Started
//! Started|Deferring --[stationary]--> MonitoringRegion --[region exit]--> Started
//! any active --[low battery]--> PausedOnLowBattery --[recovered]--> Started
//! any active --[authorization refused]--> PausedOnAuthorizationRefused
//! PausedOnAuthorizationRefused --[authorized always]--> Started
//! ```
//!
//! The machine is not thread-safe by itself. It is driven by exactly one
//! owner, the [`TrackerDaemon`](super::TrackerDaemon), which serializes all
//! events into one order.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::state::{TrackState, TrackerState, TrackerStatus};
use crate::config::TrackerConfig;
use crate::error::{PositioningError, TrackerError};
use crate::filter;
use crate::fix::Fix;
use crate::observer::{EventSink, TrackerEvent};
use crate::persistence::TrackStore;
use crate::ports::{
    AppState, AuthorizationStatus, BatteryState, Clock, GeofencePort, PositioningPort, PowerPort,
    Region,
};

/// Prefix of the identifiers given to stationary regions.
pub const REGION_ID_PREFIX: &str = "trackline.region";

/// The device services a tracker commands.
#[derive(Clone)]
pub struct TrackerPorts {
    pub positioning: Arc<dyn PositioningPort>,
    pub geofence: Arc<dyn GeofencePort>,
    pub power: Arc<dyn PowerPort>,
    pub clock: Arc<dyn Clock>,
}

/// Restart requested by a region exit.
///
/// The restart must run as its own unit of work, after the current one, and
/// is handed back to the machine through
/// [`TrackerMachine::resume_from_region`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRestart {
    pub region_id: String,
}

/// Tracking state machine.
pub struct TrackerMachine {
    config: TrackerConfig,
    ports: TrackerPorts,
    store: Arc<dyn TrackStore>,
    sink: Arc<dyn EventSink>,
    track: TrackState,
    regions_created: u64,
}

impl TrackerMachine {
    /// Create a stopped tracker.
    ///
    /// Fails with [`TrackerError::InvalidConfig`] when `config` does not pass
    /// [`TrackerConfig::validate`].
    pub fn new(
        config: TrackerConfig,
        ports: TrackerPorts,
        store: Arc<dyn TrackStore>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, TrackerError> {
        config
            .validate()
            .map_err(|(field, reason)| TrackerError::InvalidConfig { field, reason })?;

        Ok(Self {
            config,
            ports,
            store,
            sink,
            track: TrackState::default(),
            regions_created: 0,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> TrackerState {
        self.track.state
    }

    pub fn track(&self) -> &TrackState {
        &self.track
    }

    pub fn status(&self) -> TrackerStatus {
        TrackerStatus::from(&self.track)
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Start (or resume) tracking.
    pub fn start(&mut self) {
        match self.track.state {
            TrackerState::Started => {
                debug!("Start requested while already started");
            }
            TrackerState::Deferring => {
                self.ports.positioning.disallow_deferred_updates();
                self.set_state(TrackerState::Started);
            }
            TrackerState::MonitoringRegion => {
                if let Some(id) = self.track.region.take() {
                    self.ports.geofence.stop_monitoring(&id);
                }
                self.track.state = TrackerState::Stopped;
                self.begin_cycle();
            }
            TrackerState::Stopped
            | TrackerState::PausedOnLowBattery
            | TrackerState::PausedOnAuthorizationRefused => self.begin_cycle(),
        }
    }

    /// Stop tracking and clear the cycle.
    ///
    /// Commands for the current mode are issued before any state is cleared.
    pub fn stop(&mut self) {
        match self.track.state {
            TrackerState::Stopped => {
                self.track.awaiting_authorization = false;
                debug!("Stop requested while already stopped");
                return;
            }
            TrackerState::Started => {
                self.ports.positioning.stop_updates();
            }
            TrackerState::Deferring => {
                self.ports.positioning.disallow_deferred_updates();
                self.ports.positioning.stop_updates();
            }
            TrackerState::MonitoringRegion => {
                self.ports.positioning.stop_updates();
            }
            TrackerState::PausedOnLowBattery | TrackerState::PausedOnAuthorizationRefused => {}
        }

        if let Some(id) = self.track.region.take() {
            self.ports.geofence.stop_monitoring(&id);
        }

        self.track.reset_cycle();
        self.track.awaiting_authorization = false;
        self.set_state(TrackerState::Stopped);
        self.sink.emit(TrackerEvent::Stopped);
    }

    /// Run the Stopped -> Started path: check availability and authorization,
    /// then begin a fresh cycle.
    fn begin_cycle(&mut self) {
        if !self.ports.positioning.services_enabled() {
            warn!("Location services disabled");
            self.refuse(AuthorizationStatus::Denied);
            return;
        }

        match self.ports.positioning.authorization_status() {
            AuthorizationStatus::AuthorizedAlways => {}
            AuthorizationStatus::NotDetermined => {
                info!("Authorization not determined, requesting always authorization");
                self.track.reset_cycle();
                self.track.awaiting_authorization = true;
                self.set_state(TrackerState::Stopped);
                self.ports.positioning.request_always_authorization();
                return;
            }
            status => {
                self.refuse(status);
                return;
            }
        }

        self.track.reset_cycle();
        self.track.awaiting_authorization = false;
        self.track.started_at = Some(self.ports.clock.now());
        self.ports.positioning.start_updates();
        self.set_state(TrackerState::Started);
        self.sink.emit(TrackerEvent::Started);
    }

    /// Park until authorization changes.
    fn refuse(&mut self, status: AuthorizationStatus) {
        warn!(status = %status, "Location authorization refused");
        self.track.reset_cycle();
        self.track.awaiting_authorization = false;
        self.set_state(TrackerState::PausedOnAuthorizationRefused);
        self.sink.emit(TrackerEvent::AuthorizationRefused(status));
    }

    fn set_state(&mut self, state: TrackerState) {
        if self.track.state != state {
            info!(from = %self.track.state, to = %state, "Tracker state changed");
            self.track.state = state;
        }
    }

    // =========================================================================
    // Fix batches
    // =========================================================================

    /// Handle a batch of raw fixes from the positioning service.
    ///
    /// Batches arriving outside `Started`/`Deferring` are dropped.
    pub fn on_fixes(&mut self, batch: &[Fix]) {
        if !self.track.state.accepts_fixes() {
            debug!(
                state = %self.track.state,
                count = batch.len(),
                "Dropping fix batch while not tracking"
            );
            return;
        }

        if batch.len() > 1 {
            debug!(count = batch.len(), "Received batched fixes");
        }

        let accepted = filter::accept(
            batch,
            self.track.last_fix.as_ref(),
            self.track.started_at,
            self.config.minimum_horizontal_accuracy(),
        );

        if self.track.last_fix.is_none() && self.first_fix_overdue(batch, &accepted) {
            self.fail_location_timeout();
            return;
        }

        let mut significant = Vec::new();

        let stationary = if accepted.is_empty() {
            self.last_fix_is_stale()
        } else {
            let first = accepted[0];
            if self.track.last_fix.is_none() {
                self.track.last_fix = Some(first);
                self.track.first_fix_at = Some(first.timestamp);
                significant.push(first);
            }
            if self.track.stationary_anchor.is_none() {
                self.track.stationary_anchor = Some(first);
            }

            for fix in &accepted {
                let last = self.track.last_fix.as_ref();
                // Equal timestamps inside one batch never both get in
                let is_significant = filter::is_later_than(fix, last, None)
                    && filter::is_significant(
                        fix,
                        last,
                        self.config.minimum_significant_time_interval(),
                        self.config.minimum_significant_distance(),
                    );
                if is_significant {
                    self.track.last_fix = Some(*fix);
                    significant.push(*fix);
                }
            }

            self.update_stationary_anchor(&accepted)
        };

        debug!(
            received = batch.len(),
            accepted = accepted.len(),
            significant = significant.len(),
            stationary,
            "Processed fix batch"
        );

        if !significant.is_empty() {
            self.publish(significant);
        }

        self.resolve_power_mode(stationary);
    }

    /// Watchdog tick: enforce the first-fix deadline and detect staleness
    /// when no batch arrives at all.
    pub fn check_deadlines(&mut self) {
        if !self.track.state.accepts_fixes() {
            return;
        }

        if self.track.last_fix.is_none() {
            let Some(started_at) = self.track.started_at else {
                return;
            };
            if elapsed(started_at, self.ports.clock.now()) > self.config.max_wait_for_first_fix()
            {
                self.fail_location_timeout();
            }
            return;
        }

        if self.last_fix_is_stale() {
            self.resolve_power_mode(true);
        }
    }

    /// First-fix deadline, measured against the batch's own timestamps.
    ///
    /// Overdue once the batch reaches past the deadline without a single
    /// accepted fix inside it.
    fn first_fix_overdue(&self, batch: &[Fix], accepted: &[Fix]) -> bool {
        let (Some(started_at), Some(newest)) = (
            self.track.started_at,
            batch.iter().map(|fix| fix.timestamp).max(),
        ) else {
            return false;
        };

        let deadline = self.config.max_wait_for_first_fix();
        elapsed(started_at, newest) > deadline
            && !accepted
                .iter()
                .any(|fix| elapsed(started_at, fix.timestamp) <= deadline)
    }

    /// If no fix arrived for longer than the next-fix wait, anchor on the last
    /// fix and report the device stationary.
    fn last_fix_is_stale(&mut self) -> bool {
        let Some(last) = self.track.last_fix else {
            return false;
        };
        let waited = elapsed(last.timestamp, self.ports.clock.now());
        if waited > self.config.max_wait_for_next_fix() {
            debug!(waited_secs = waited.as_secs(), "No new fix, device considered stationary");
            self.track.stationary_anchor = Some(last);
            true
        } else {
            false
        }
    }

    /// Advance the stationary anchor for an accepted batch.
    ///
    /// Returns true when the device has not moved for the stationary interval.
    fn update_stationary_anchor(&mut self, accepted: &[Fix]) -> bool {
        let (Some(anchor), Some(newest)) = (self.track.stationary_anchor, accepted.last()) else {
            return false;
        };

        if filter::has_moved(accepted, &anchor, self.config.minimum_stationary_distance()) {
            self.track.stationary_anchor = Some(*newest);
            false
        } else if newest.elapsed_since(&anchor) >= self.config.minimum_stationary_time_interval()
        {
            self.track.stationary_anchor = Some(*newest);
            true
        } else {
            false
        }
    }

    /// Persist, then emit, one ordered batch of significant fixes.
    fn publish(&mut self, fixes: Vec<Fix>) {
        let persisted = self.store.append(&fixes);

        if let (Some(first), Some(last)) = (fixes.first(), fixes.last()) {
            info!(count = fixes.len(), first = %first, last = %last, "Locations updated");
        }
        self.sink.emit(TrackerEvent::LocationsUpdated(fixes));

        if let Err(e) = persisted {
            warn!(error = %e, "Failed to persist locations");
            self.sink.emit(TrackerEvent::Error(TrackerError::Persistence(e)));
        }
    }

    fn fail_location_timeout(&mut self) {
        let waited = self.config.max_wait_for_first_fix();
        warn!(waited_secs = waited.as_secs(), "No usable location before deadline");
        self.sink
            .emit(TrackerEvent::Error(TrackerError::LocationTimeout { waited }));
        self.stop();
    }

    // =========================================================================
    // Power modes
    // =========================================================================

    /// Pick exactly one of: low-battery pause, region monitoring, deferring,
    /// or stop deferring.
    fn resolve_power_mode(&mut self, stationary: bool) {
        if self.battery_is_low(
            self.ports.power.battery_level(),
            self.ports.power.battery_state(),
        ) {
            self.pause_on_low_battery();
        } else if stationary {
            self.start_monitoring_region();
        } else if self.track.app_state == AppState::Background {
            self.start_deferring();
        } else {
            self.stop_deferring();
        }
    }

    fn battery_is_low(&self, level: f64, state: BatteryState) -> bool {
        level <= self.config.minimum_battery_level() && !state.is_plugged()
    }

    fn pause_on_low_battery(&mut self) {
        info!(
            level = self.ports.power.battery_level(),
            threshold = self.config.minimum_battery_level(),
            "Battery low, pausing tracking"
        );
        self.stop();
        self.set_state(TrackerState::PausedOnLowBattery);
    }

    fn start_monitoring_region(&mut self) {
        let Some(center) = self.track.stationary_anchor else {
            return;
        };

        if self.track.state == TrackerState::Deferring {
            self.ports.positioning.disallow_deferred_updates();
        }
        self.ports.positioning.stop_updates();

        self.regions_created += 1;
        let region = Region {
            id: format!("{REGION_ID_PREFIX}.{}", self.regions_created),
            center,
            radius: self.config.region_radius(),
        };
        info!(
            region = %region.id,
            center = %center,
            radius = region.radius,
            "Device stationary, monitoring region"
        );

        self.track.region = Some(region.id.clone());
        self.ports.geofence.start_monitoring(region);
        self.set_state(TrackerState::MonitoringRegion);
    }

    fn start_deferring(&mut self) {
        if self.track.state != TrackerState::Started
            || !self.ports.positioning.deferred_updates_available()
        {
            return;
        }

        let warmed_up = self.track.first_fix_at.is_some_and(|first| {
            elapsed(first, self.ports.clock.now()) >= self.config.deferring_warmup()
        });
        if !warmed_up {
            return;
        }

        self.ports.positioning.allow_deferred_updates(
            self.config.max_deferring_distance(),
            self.config.max_deferring_timeout(),
        );
        self.set_state(TrackerState::Deferring);
    }

    fn stop_deferring(&mut self) {
        if self.track.state == TrackerState::Deferring {
            self.ports.positioning.disallow_deferred_updates();
            self.set_state(TrackerState::Started);
        }
    }

    // =========================================================================
    // Device events
    // =========================================================================

    /// Deferred delivery ended.
    pub fn on_deferred_finished(&mut self, error: Option<PositioningError>) {
        if self.track.state != TrackerState::Deferring {
            debug!(error = ?error, "Deferred updates finished while not deferring");
            return;
        }

        match error {
            Some(PositioningError::DeferredFailed) => {
                warn!("Deferred updates failed, restarting tracking");
                self.stop();
                self.start();
            }
            other => {
                debug!(error = ?other, "Deferred updates finished");
                self.set_state(TrackerState::Started);
            }
        }
    }

    /// Positioning driver failure.
    pub fn on_positioning_error(&mut self, error: PositioningError) {
        if error.is_transient() {
            debug!(error = %error, "Ignoring transient positioning error");
            return;
        }
        if error == PositioningError::DeferredFailed {
            self.on_deferred_finished(Some(error));
            return;
        }
        if !self.track.state.is_active() {
            debug!(error = %error, state = %self.track.state, "Ignoring positioning error while inactive");
            return;
        }

        warn!(error = %error, "Positioning failed");
        let permission = error.is_permission();
        self.sink
            .emit(TrackerEvent::Error(TrackerError::Positioning(error)));
        self.stop();
        if permission {
            self.refuse(AuthorizationStatus::Denied);
        }
    }

    /// Authorization changed.
    pub fn on_authorization_changed(&mut self, status: AuthorizationStatus) {
        info!(status = %status, state = %self.track.state, "Authorization changed");

        match status {
            AuthorizationStatus::AuthorizedAlways => {
                let pending = self.track.state == TrackerState::Stopped
                    && self.track.awaiting_authorization;
                if pending || self.track.state == TrackerState::PausedOnAuthorizationRefused {
                    self.start();
                }
            }
            refused if refused.is_refused() => {
                if self.track.state.is_active()
                    || self.track.state == TrackerState::PausedOnLowBattery
                {
                    self.stop();
                    self.refuse(refused);
                } else if self.track.awaiting_authorization {
                    self.refuse(refused);
                }
            }
            _ => {}
        }
    }

    /// The platform paused location updates.
    pub fn on_updates_paused(&mut self) {
        if self.track.state.accepts_fixes() {
            info!("Location updates paused");
            self.sink.emit(TrackerEvent::Paused);
        }
    }

    /// The platform resumed location updates.
    pub fn on_updates_resumed(&mut self) {
        if self.track.state.accepts_fixes() {
            info!("Location updates resumed");
            self.sink.emit(TrackerEvent::Resumed);
        }
    }

    pub fn on_battery_level_changed(&mut self, level: f64) {
        let state = self.ports.power.battery_state();
        self.on_power_changed(level, state);
    }

    pub fn on_battery_state_changed(&mut self, state: BatteryState) {
        let level = self.ports.power.battery_level();
        self.on_power_changed(level, state);
    }

    fn on_power_changed(&mut self, level: f64, state: BatteryState) {
        let low = self.battery_is_low(level, state);
        debug!(level, battery = %state, low, "Power changed");

        if low && self.track.state.is_active() {
            self.pause_on_low_battery();
        } else if !low && self.track.state == TrackerState::PausedOnLowBattery {
            info!(level, battery = %state, "Battery recovered, resuming tracking");
            self.start();
        }
    }

    pub fn on_app_state_changed(&mut self, app_state: AppState) {
        debug!(app_state = ?app_state, "Application state changed");
        self.track.app_state = app_state;
        if app_state == AppState::Foreground {
            self.stop_deferring();
        }
    }

    pub fn on_app_terminating(&mut self) {
        info!("Application terminating, stopping tracker");
        self.stop();
    }

    // =========================================================================
    // Geofence events
    // =========================================================================

    /// The device left a monitored region.
    ///
    /// Returns the restart to schedule when the exit matches the current
    /// region. The restart itself happens in [`Self::resume_from_region`].
    pub fn on_region_exited(&mut self, region_id: &str) -> Option<ScheduledRestart> {
        if self.is_current_region(region_id) {
            info!(region = region_id, "Exited stationary region");
            Some(ScheduledRestart {
                region_id: region_id.to_string(),
            })
        } else {
            debug!(region = region_id, "Ignoring exit from unknown region");
            None
        }
    }

    /// Run a restart scheduled by a region exit, if it still applies.
    pub fn resume_from_region(&mut self, region_id: &str) {
        if self.is_current_region(region_id) {
            self.start();
        } else {
            debug!(
                region = region_id,
                state = %self.track.state,
                "Discarding stale region restart"
            );
        }
    }

    pub fn on_region_monitoring_started(&mut self, region_id: &str) {
        debug!(region = region_id, "Region monitoring started");
    }

    /// The geofence service could not monitor the region; fall back to
    /// continuous updates.
    pub fn on_region_monitoring_failed(&mut self, region_id: Option<&str>, reason: &str) {
        let applies = self.track.state == TrackerState::MonitoringRegion
            && region_id.is_none_or(|id| self.track.region.as_deref() == Some(id));
        if !applies {
            debug!(region = ?region_id, reason, "Ignoring region monitoring failure");
            return;
        }

        warn!(region = ?region_id, reason, "Region monitoring failed, restarting updates");
        self.sink.emit(TrackerEvent::Error(TrackerError::RegionMonitoring {
            region_id: region_id.map(str::to_string),
            reason: reason.to_string(),
        }));
        self.start();
    }

    fn is_current_region(&self, region_id: &str) -> bool {
        self.track.state == TrackerState::MonitoringRegion
            && self.track.region.as_deref() == Some(region_id)
    }
}

/// Time from `from` to `to`; negative spans count as zero.
fn elapsed(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or(Duration::ZERO)
}
