//! Error types for the tracker.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::ports::AuthorizationStatus;

/// Errors reported by the positioning driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositioningError {
    /// The driver could not determine a location right now.
    #[error("Location currently unknown")]
    LocationUnknown,

    /// The user or policy denied access to location services.
    #[error("Location access denied")]
    Denied,

    /// Deferred delivery failed and was cancelled by the platform.
    #[error("Deferred location updates failed")]
    DeferredFailed,

    /// The network needed for assisted positioning is unavailable.
    #[error("Positioning network unavailable")]
    Network,

    /// Any other driver failure.
    #[error("Positioning driver error: {0}")]
    Driver(String),
}

impl PositioningError {
    /// Returns true for momentary blips that should be dropped silently.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LocationUnknown)
    }

    /// Returns true if the error indicates a permissions problem.
    pub fn is_permission(&self) -> bool {
        matches!(self, Self::Denied)
    }
}

/// Errors from the track store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Reading or writing the track file failed.
    #[error("Track file I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Coarse classification of tracker errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Single bad fix or driver blip. Never surfaced.
    Transient,
    /// No usable fix within the deadline.
    Timeout,
    /// Non-transient positioning failure.
    DriverFailure,
    /// Location access refused.
    AuthorizationDenied,
    /// Deferred delivery path fault, recovered locally.
    DeferredDeliveryFailed,
    /// Track store failure.
    Persistence,
    /// Rejected tracker configuration.
    Configuration,
    /// The tracker service is no longer running.
    Service,
}

/// Errors surfaced by the tracker to its event sink and callers.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// No usable fix arrived before the first-fix deadline.
    #[error("No usable location within {}s", .waited.as_secs())]
    LocationTimeout { waited: Duration },

    /// Non-transient positioning driver failure.
    #[error(transparent)]
    Positioning(#[from] PositioningError),

    /// Location authorization is insufficient for tracking.
    #[error("Location authorization refused ({0})")]
    AuthorizationRefused(AuthorizationStatus),

    /// The geofence service could not monitor the stationary region.
    #[error("Region monitoring failed for {}: {reason}", .region_id.as_deref().unwrap_or("unknown region"))]
    RegionMonitoring {
        region_id: Option<String>,
        reason: String,
    },

    /// The track store rejected an append.
    #[error("Failed to persist locations: {0}")]
    Persistence(#[from] PersistenceError),

    /// The tracker configuration failed validation.
    #[error("Invalid tracker configuration: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },

    /// The tracker daemon has shut down.
    #[error("Tracker service is not running")]
    Closed,
}

impl TrackerError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LocationTimeout { .. } => ErrorKind::Timeout,
            Self::Positioning(e) if e.is_transient() => ErrorKind::Transient,
            Self::Positioning(PositioningError::DeferredFailed) => {
                ErrorKind::DeferredDeliveryFailed
            }
            Self::Positioning(e) if e.is_permission() => ErrorKind::AuthorizationDenied,
            Self::Positioning(_) | Self::RegionMonitoring { .. } => ErrorKind::DriverFailure,
            Self::AuthorizationRefused(_) => ErrorKind::AuthorizationDenied,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::InvalidConfig { .. } => ErrorKind::Configuration,
            Self::Closed => ErrorKind::Service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positioning_error_classification() {
        assert!(PositioningError::LocationUnknown.is_transient());
        assert!(!PositioningError::Network.is_transient());
        assert!(PositioningError::Denied.is_permission());
        assert!(!PositioningError::Driver("gps off".into()).is_permission());
    }

    #[test]
    fn test_tracker_error_kinds() {
        assert_eq!(
            TrackerError::LocationTimeout {
                waited: Duration::from_secs(60)
            }
            .kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            TrackerError::from(PositioningError::LocationUnknown).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            TrackerError::from(PositioningError::DeferredFailed).kind(),
            ErrorKind::DeferredDeliveryFailed
        );
        assert_eq!(
            TrackerError::from(PositioningError::Denied).kind(),
            ErrorKind::AuthorizationDenied
        );
        assert_eq!(
            TrackerError::from(PositioningError::Network).kind(),
            ErrorKind::DriverFailure
        );
        assert_eq!(
            TrackerError::AuthorizationRefused(AuthorizationStatus::Restricted).kind(),
            ErrorKind::AuthorizationDenied
        );
        assert_eq!(TrackerError::Closed.kind(), ErrorKind::Service);
        assert_eq!(
            TrackerError::InvalidConfig {
                field: "region_radius",
                reason: "must be greater than zero"
            }
            .kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_error_messages() {
        let timeout = TrackerError::LocationTimeout {
            waited: Duration::from_secs(60),
        };
        assert_eq!(timeout.to_string(), "No usable location within 60s");

        let refused = TrackerError::AuthorizationRefused(AuthorizationStatus::Denied);
        assert_eq!(
            refused.to_string(),
            "Location authorization refused (denied)"
        );

        let region = TrackerError::RegionMonitoring {
            region_id: None,
            reason: "too many regions".into(),
        };
        assert_eq!(
            region.to_string(),
            "Region monitoring failed for unknown region: too many regions"
        );
    }
}
