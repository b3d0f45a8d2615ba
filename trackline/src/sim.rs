//! Simulated device services for deterministic tracking sessions.
//!
//! Every simulated port records the commands it receives so that scripted
//! scenarios (tests, the `replay` command) can assert on or print them.
//! Device conditions (authorization, battery) are set directly; the
//! corresponding events still have to be delivered to the tracker through
//! its handle, exactly as a real device service would.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

use crate::error::PersistenceError;
use crate::fix::Fix;
use crate::persistence::TrackStore;
use crate::ports::{
    AuthorizationStatus, BatteryState, Clock, GeofencePort, PositioningPort, PowerPort, Region,
};

// =============================================================================
// Clock
// =============================================================================

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = self.now.lock();
        *now = now.checked_add_signed(delta).unwrap_or(*now);
    }

    /// Jump to an absolute time (backwards jumps are allowed).
    pub fn set(&self, time: DateTime<Utc>) {
        *self.now.lock() = time;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// =============================================================================
// Positioning
// =============================================================================

/// Command received by [`SimulatedPositioning`].
#[derive(Debug, Clone, PartialEq)]
pub enum PositioningCommand {
    RequestAlwaysAuthorization,
    StartUpdates,
    StopUpdates,
    AllowDeferredUpdates { max_distance: f64, timeout: Duration },
    DisallowDeferredUpdates,
}

impl std::fmt::Display for PositioningCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestAlwaysAuthorization => write!(f, "request-always-authorization"),
            Self::StartUpdates => write!(f, "start-updates"),
            Self::StopUpdates => write!(f, "stop-updates"),
            Self::AllowDeferredUpdates {
                max_distance,
                timeout,
            } => write!(
                f,
                "allow-deferred-updates({max_distance:.0}m, {}s)",
                timeout.as_secs()
            ),
            Self::DisallowDeferredUpdates => write!(f, "disallow-deferred-updates"),
        }
    }
}

#[derive(Debug)]
struct PositioningInner {
    services_enabled: bool,
    authorization: AuthorizationStatus,
    deferred_available: bool,
    commands: Vec<PositioningCommand>,
}

/// Scriptable positioning service.
///
/// Starts with services enabled, `AuthorizedAlways`, and deferred delivery
/// available.
#[derive(Debug)]
pub struct SimulatedPositioning {
    inner: Mutex<PositioningInner>,
}

impl SimulatedPositioning {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PositioningInner {
                services_enabled: true,
                authorization: AuthorizationStatus::AuthorizedAlways,
                deferred_available: true,
                commands: Vec::new(),
            }),
        }
    }

    pub fn set_services_enabled(&self, enabled: bool) {
        self.inner.lock().services_enabled = enabled;
    }

    pub fn set_authorization(&self, status: AuthorizationStatus) {
        self.inner.lock().authorization = status;
    }

    pub fn set_deferred_available(&self, available: bool) {
        self.inner.lock().deferred_available = available;
    }

    /// All commands received so far, oldest first.
    pub fn commands(&self) -> Vec<PositioningCommand> {
        self.inner.lock().commands.clone()
    }

    /// Drain the recorded commands.
    pub fn take_commands(&self) -> Vec<PositioningCommand> {
        std::mem::take(&mut self.inner.lock().commands)
    }

    fn record(&self, command: PositioningCommand) {
        self.inner.lock().commands.push(command);
    }
}

impl Default for SimulatedPositioning {
    fn default() -> Self {
        Self::new()
    }
}

impl PositioningPort for SimulatedPositioning {
    fn services_enabled(&self) -> bool {
        self.inner.lock().services_enabled
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        self.inner.lock().authorization
    }

    fn request_always_authorization(&self) {
        self.record(PositioningCommand::RequestAlwaysAuthorization);
    }

    fn deferred_updates_available(&self) -> bool {
        self.inner.lock().deferred_available
    }

    fn start_updates(&self) {
        self.record(PositioningCommand::StartUpdates);
    }

    fn stop_updates(&self) {
        self.record(PositioningCommand::StopUpdates);
    }

    fn allow_deferred_updates(&self, max_distance: f64, timeout: Duration) {
        self.record(PositioningCommand::AllowDeferredUpdates {
            max_distance,
            timeout,
        });
    }

    fn disallow_deferred_updates(&self) {
        self.record(PositioningCommand::DisallowDeferredUpdates);
    }
}

// =============================================================================
// Geofence
// =============================================================================

/// Command received by [`SimulatedGeofence`].
#[derive(Debug, Clone, PartialEq)]
pub enum GeofenceCommand {
    StartMonitoring(Region),
    StopMonitoring(String),
}

impl std::fmt::Display for GeofenceCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartMonitoring(region) => write!(
                f,
                "start-monitoring({}, <{:.6},{:.6}>, {:.0}m)",
                region.id, region.center.latitude, region.center.longitude, region.radius
            ),
            Self::StopMonitoring(id) => write!(f, "stop-monitoring({id})"),
        }
    }
}

/// Recording geofence service.
#[derive(Debug, Default)]
pub struct SimulatedGeofence {
    commands: Mutex<Vec<GeofenceCommand>>,
}

impl SimulatedGeofence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<GeofenceCommand> {
        self.commands.lock().clone()
    }

    pub fn take_commands(&self) -> Vec<GeofenceCommand> {
        std::mem::take(&mut *self.commands.lock())
    }

    /// The most recently started region, if it has not been stopped since.
    pub fn monitored_region(&self) -> Option<Region> {
        let commands = self.commands.lock();
        match commands.last() {
            Some(GeofenceCommand::StartMonitoring(region)) => Some(region.clone()),
            _ => None,
        }
    }
}

impl GeofencePort for SimulatedGeofence {
    fn start_monitoring(&self, region: Region) {
        self.commands
            .lock()
            .push(GeofenceCommand::StartMonitoring(region));
    }

    fn stop_monitoring(&self, id: &str) {
        self.commands
            .lock()
            .push(GeofenceCommand::StopMonitoring(id.to_string()));
    }
}

// =============================================================================
// Power
// =============================================================================

/// Power service with a settable battery.
///
/// Starts full-charge and unplugged.
#[derive(Debug)]
pub struct SimulatedPower {
    battery: Mutex<(f64, BatteryState)>,
}

impl SimulatedPower {
    pub fn new() -> Self {
        Self::with_level(1.0, BatteryState::Unplugged)
    }

    pub fn with_level(level: f64, state: BatteryState) -> Self {
        Self {
            battery: Mutex::new((level, state)),
        }
    }

    pub fn set_level(&self, level: f64) {
        self.battery.lock().0 = level;
    }

    pub fn set_state(&self, state: BatteryState) {
        self.battery.lock().1 = state;
    }
}

impl Default for SimulatedPower {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerPort for SimulatedPower {
    fn battery_level(&self) -> f64 {
        self.battery.lock().0
    }

    fn battery_state(&self) -> BatteryState {
        self.battery.lock().1
    }
}

// =============================================================================
// Persistence
// =============================================================================

/// In-memory track store.
#[derive(Debug, Default)]
pub struct MemoryTrackStore {
    fixes: Mutex<Vec<Fix>>,
}

impl MemoryTrackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrackStore for MemoryTrackStore {
    fn append(&self, fixes: &[Fix]) -> Result<(), PersistenceError> {
        self.fixes.lock().extend_from_slice(fixes);
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<Fix>, PersistenceError> {
        Ok(self.fixes.lock().clone())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        self.fixes.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_477_000_000, 0).unwrap()
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(epoch());
        assert_eq!(clock.now(), epoch());

        clock.advance(Duration::from_secs(90));
        assert_eq!((clock.now() - epoch()).num_seconds(), 90);

        clock.set(epoch());
        assert_eq!(clock.now(), epoch());
    }

    #[test]
    fn test_positioning_records_commands() {
        let positioning = SimulatedPositioning::new();
        positioning.start_updates();
        positioning.allow_deferred_updates(500.0, Duration::from_secs(30));
        positioning.stop_updates();

        assert_eq!(
            positioning.take_commands(),
            vec![
                PositioningCommand::StartUpdates,
                PositioningCommand::AllowDeferredUpdates {
                    max_distance: 500.0,
                    timeout: Duration::from_secs(30)
                },
                PositioningCommand::StopUpdates,
            ]
        );
        assert!(positioning.commands().is_empty());
    }

    #[test]
    fn test_positioning_conditions() {
        let positioning = SimulatedPositioning::new();
        assert!(positioning.services_enabled());
        assert_eq!(
            positioning.authorization_status(),
            AuthorizationStatus::AuthorizedAlways
        );

        positioning.set_authorization(AuthorizationStatus::Denied);
        positioning.set_deferred_available(false);
        assert_eq!(positioning.authorization_status(), AuthorizationStatus::Denied);
        assert!(!positioning.deferred_updates_available());
    }

    #[test]
    fn test_geofence_monitored_region() {
        let geofence = SimulatedGeofence::new();
        let region = Region {
            id: "trackline.region.1".into(),
            center: Fix::new(37.0, -122.0, 5.0, epoch()),
            radius: 50.0,
        };

        geofence.start_monitoring(region.clone());
        assert_eq!(geofence.monitored_region(), Some(region));

        geofence.stop_monitoring("trackline.region.1");
        assert_eq!(geofence.monitored_region(), None);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTrackStore::new();
        let fix = Fix::new(37.0, -122.0, 5.0, epoch());
        store.append(&[fix]).unwrap();
        store.append(&[fix]).unwrap();
        assert_eq!(store.read_all().unwrap().len(), 2);

        store.clear().unwrap();
        assert!(store.read_all().unwrap().is_empty());
    }
}
