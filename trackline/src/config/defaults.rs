//! Default values for every configuration setting.

use std::time::Duration;

// =============================================================================
// Power
// =============================================================================

/// Battery fraction at or below which tracking pauses (unless plugged in).
pub const DEFAULT_MINIMUM_BATTERY_LEVEL: f64 = 0.2;

// =============================================================================
// Fix filtering
// =============================================================================

/// Fixes less accurate than this (meters) are discarded.
pub const DEFAULT_MINIMUM_HORIZONTAL_ACCURACY: f64 = 50.0;

/// A fix this long after the last accepted one is significant.
pub const DEFAULT_MINIMUM_SIGNIFICANT_TIME_INTERVAL: Duration = Duration::from_secs(30);

/// A fix this far (meters) from the last accepted one is significant.
pub const DEFAULT_MINIMUM_SIGNIFICANT_DISTANCE: f64 = 10.0;

// =============================================================================
// Deadlines
// =============================================================================

/// How long a start cycle may go without any usable fix.
pub const DEFAULT_MAX_WAIT_FOR_FIRST_FIX: Duration = Duration::from_secs(60);

/// How long without a new fix before the position is considered stationary.
pub const DEFAULT_MAX_WAIT_FOR_NEXT_FIX: Duration = Duration::from_secs(120);

// =============================================================================
// Deferred delivery
// =============================================================================

/// Distance budget (meters) handed to the platform when deferring.
pub const DEFAULT_MAX_DEFERRING_DISTANCE: f64 = 500.0;

/// Time budget handed to the platform when deferring.
pub const DEFAULT_MAX_DEFERRING_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimum time since the first fix of a cycle before deferring.
pub const DEFAULT_DEFERRING_WARMUP: Duration = Duration::from_secs(15);

// =============================================================================
// Stationary detection and region monitoring
// =============================================================================

/// Movement beyond this distance (meters) from the anchor resets the
/// stationary timer.
pub const DEFAULT_MINIMUM_STATIONARY_DISTANCE: f64 = 20.0;

/// Time without movement after which the device is deemed stationary.
pub const DEFAULT_MINIMUM_STATIONARY_TIME_INTERVAL: Duration = Duration::from_secs(180);

/// Radius (meters) of the region monitored while stationary.
pub const DEFAULT_REGION_RADIUS: f64 = 50.0;

// =============================================================================
// Daemon
// =============================================================================

/// Interval of the deadline watchdog.
pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(5);

/// Delay between a region exit and the scheduled restart.
pub const DEFAULT_REGION_RESTART_DELAY: Duration = Duration::ZERO;

// =============================================================================
// Logging
// =============================================================================

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "trackline.log";
