//! Device service ports consumed by the tracker.
//!
//! The tracker never talks to hardware directly. It commands three narrow
//! device services through these traits and reads time through [`Clock`]:
//!
//! - [`PositioningPort`] - start/stop updates, deferred delivery, authorization
//! - [`GeofencePort`] - circular region monitoring
//! - [`PowerPort`] - battery level and charging state
//!
//! Events flowing the other way (fix batches, region exits, battery changes)
//! are delivered through [`TrackerHandle`](crate::tracker::TrackerHandle).
//!
//! # Thread Safety
//!
//! Ports are shared as `Arc<dyn ...>` and must be `Send + Sync`. Every command
//! must return without waiting for the device service to act on it.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::fix::Fix;

/// Location authorization granted to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationStatus {
    /// Updates allowed at any time, including in the background.
    AuthorizedAlways,
    /// Updates allowed only while the application is in use.
    AuthorizedWhenInUse,
    /// The user refused location access.
    Denied,
    /// Location access is restricted by policy.
    Restricted,
    /// The user has not been asked yet.
    NotDetermined,
}

impl AuthorizationStatus {
    /// Returns true if this status rules out background tracking.
    pub fn is_refused(&self) -> bool {
        matches!(
            self,
            Self::Denied | Self::Restricted | Self::AuthorizedWhenInUse
        )
    }
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthorizedAlways => write!(f, "authorizedAlways"),
            Self::AuthorizedWhenInUse => write!(f, "authorizedWhenInUse"),
            Self::Denied => write!(f, "denied"),
            Self::Restricted => write!(f, "restricted"),
            Self::NotDetermined => write!(f, "notDetermined"),
        }
    }
}

/// Battery charging state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatteryState {
    Charging,
    Unplugged,
    Full,
    #[default]
    Unknown,
}

impl BatteryState {
    /// Returns true if the device is connected to external power.
    pub fn is_plugged(&self) -> bool {
        matches!(self, Self::Charging | Self::Full)
    }
}

impl std::fmt::Display for BatteryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Charging => write!(f, "charging"),
            Self::Unplugged => write!(f, "unplugged"),
            Self::Full => write!(f, "full"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Foreground/background state of the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Foreground,
    Background,
}

/// A circular region handed to the geofence service.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Identifier echoed back in geofence events.
    pub id: String,
    /// Center of the region (the stationary anchor).
    pub center: Fix,
    /// Radius in meters.
    pub radius: f64,
}

/// Positioning service (GPS driver).
pub trait PositioningPort: Send + Sync {
    /// Returns true if location services are enabled on the device.
    fn services_enabled(&self) -> bool;

    /// Current authorization status.
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Ask the user for "always" authorization.
    ///
    /// The answer arrives later as an authorization change event.
    fn request_always_authorization(&self);

    /// Returns true if the platform supports deferred (batched) delivery.
    fn deferred_updates_available(&self) -> bool;

    /// Begin delivering fixes.
    fn start_updates(&self);

    /// Stop delivering fixes.
    fn stop_updates(&self);

    /// Allow the platform to batch fixes until `max_distance` meters have been
    /// travelled or `timeout` has elapsed.
    fn allow_deferred_updates(&self, max_distance: f64, timeout: Duration);

    /// Return to immediate delivery.
    fn disallow_deferred_updates(&self);
}

/// Geofence (region monitoring) service.
pub trait GeofencePort: Send + Sync {
    /// Start monitoring a region; the tracker only cares about exits.
    fn start_monitoring(&self, region: Region);

    /// Stop monitoring the region with the given id.
    fn stop_monitoring(&self, id: &str);
}

/// Power service.
pub trait PowerPort: Send + Sync {
    /// Battery level as a fraction in `[0, 1]`.
    fn battery_level(&self) -> f64;

    /// Current charging state.
    fn battery_state(&self) -> BatteryState;
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_statuses() {
        assert!(AuthorizationStatus::Denied.is_refused());
        assert!(AuthorizationStatus::Restricted.is_refused());
        assert!(AuthorizationStatus::AuthorizedWhenInUse.is_refused());
        assert!(!AuthorizationStatus::AuthorizedAlways.is_refused());
        assert!(!AuthorizationStatus::NotDetermined.is_refused());
    }

    #[test]
    fn test_authorization_status_display() {
        assert_eq!(
            AuthorizationStatus::AuthorizedAlways.to_string(),
            "authorizedAlways"
        );
        assert_eq!(AuthorizationStatus::Restricted.to_string(), "restricted");
    }

    #[test]
    fn test_battery_plugged() {
        assert!(BatteryState::Charging.is_plugged());
        assert!(BatteryState::Full.is_plugged());
        assert!(!BatteryState::Unplugged.is_plugged());
        assert!(!BatteryState::Unknown.is_plugged());
    }

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock;
        let first = clock.now();
        assert!(clock.now() >= first);
    }
}
