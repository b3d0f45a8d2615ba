//! Tracker configuration.

use std::time::Duration;

use super::defaults::*;

/// Thresholds and budgets for one tracker instance.
///
/// Immutable once the tracker is built. Use the `with_*` setters to derive a
/// custom configuration from the defaults.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use trackline::config::TrackerConfig;
///
/// let config = TrackerConfig::new()
///     .with_minimum_horizontal_accuracy(25.0)
///     .with_minimum_significant_time_interval(Duration::from_secs(10));
///
/// assert_eq!(config.minimum_horizontal_accuracy(), 25.0);
/// assert_eq!(config.minimum_significant_distance(), 10.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    minimum_battery_level: f64,
    minimum_horizontal_accuracy: f64,
    max_wait_for_first_fix: Duration,
    max_wait_for_next_fix: Duration,
    minimum_significant_time_interval: Duration,
    minimum_significant_distance: f64,
    max_deferring_distance: f64,
    max_deferring_timeout: Duration,
    deferring_warmup: Duration,
    minimum_stationary_distance: f64,
    minimum_stationary_time_interval: Duration,
    region_radius: f64,
}

impl TrackerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Battery fraction at or below which tracking pauses. Default: 0.2.
    pub fn with_minimum_battery_level(mut self, level: f64) -> Self {
        self.minimum_battery_level = level;
        self
    }

    /// Worst accepted horizontal accuracy in meters. Default: 50m.
    pub fn with_minimum_horizontal_accuracy(mut self, meters: f64) -> Self {
        self.minimum_horizontal_accuracy = meters;
        self
    }

    /// Deadline for the first usable fix of a cycle. Default: 60s.
    pub fn with_max_wait_for_first_fix(mut self, wait: Duration) -> Self {
        self.max_wait_for_first_fix = wait;
        self
    }

    /// Staleness after which the position is considered stationary.
    /// Default: 120s.
    pub fn with_max_wait_for_next_fix(mut self, wait: Duration) -> Self {
        self.max_wait_for_next_fix = wait;
        self
    }

    pub fn with_minimum_significant_time_interval(mut self, interval: Duration) -> Self {
        self.minimum_significant_time_interval = interval;
        self
    }

    pub fn with_minimum_significant_distance(mut self, meters: f64) -> Self {
        self.minimum_significant_distance = meters;
        self
    }

    /// Distance budget for deferred delivery. Default: 500m.
    pub fn with_max_deferring_distance(mut self, meters: f64) -> Self {
        self.max_deferring_distance = meters;
        self
    }

    /// Time budget for deferred delivery. Default: 30s.
    pub fn with_max_deferring_timeout(mut self, timeout: Duration) -> Self {
        self.max_deferring_timeout = timeout;
        self
    }

    /// Minimum time since the first fix before deferring. Default: 15s.
    pub fn with_deferring_warmup(mut self, warmup: Duration) -> Self {
        self.deferring_warmup = warmup;
        self
    }

    pub fn with_minimum_stationary_distance(mut self, meters: f64) -> Self {
        self.minimum_stationary_distance = meters;
        self
    }

    pub fn with_minimum_stationary_time_interval(mut self, interval: Duration) -> Self {
        self.minimum_stationary_time_interval = interval;
        self
    }

    /// Radius of the stationary region. Default: 50m.
    pub fn with_region_radius(mut self, meters: f64) -> Self {
        self.region_radius = meters;
        self
    }

    pub fn minimum_battery_level(&self) -> f64 {
        self.minimum_battery_level
    }

    pub fn minimum_horizontal_accuracy(&self) -> f64 {
        self.minimum_horizontal_accuracy
    }

    pub fn max_wait_for_first_fix(&self) -> Duration {
        self.max_wait_for_first_fix
    }

    pub fn max_wait_for_next_fix(&self) -> Duration {
        self.max_wait_for_next_fix
    }

    pub fn minimum_significant_time_interval(&self) -> Duration {
        self.minimum_significant_time_interval
    }

    pub fn minimum_significant_distance(&self) -> f64 {
        self.minimum_significant_distance
    }

    pub fn max_deferring_distance(&self) -> f64 {
        self.max_deferring_distance
    }

    pub fn max_deferring_timeout(&self) -> Duration {
        self.max_deferring_timeout
    }

    pub fn deferring_warmup(&self) -> Duration {
        self.deferring_warmup
    }

    pub fn minimum_stationary_distance(&self) -> f64 {
        self.minimum_stationary_distance
    }

    pub fn minimum_stationary_time_interval(&self) -> Duration {
        self.minimum_stationary_time_interval
    }

    pub fn region_radius(&self) -> f64 {
        self.region_radius
    }

    /// Check that every threshold is usable.
    ///
    /// Returns the name of the first offending setting and the reason.
    pub fn validate(&self) -> Result<(), (&'static str, &'static str)> {
        if !(0.0..=1.0).contains(&self.minimum_battery_level) {
            return Err(("minimum_battery_level", "must be a fraction between 0 and 1"));
        }

        let distances = [
            ("minimum_horizontal_accuracy", self.minimum_horizontal_accuracy),
            ("minimum_significant_distance", self.minimum_significant_distance),
            ("max_deferring_distance", self.max_deferring_distance),
            ("minimum_stationary_distance", self.minimum_stationary_distance),
            ("region_radius", self.region_radius),
        ];
        for (name, value) in distances {
            if !value.is_finite() || value < 0.0 {
                return Err((name, "must be a finite, non-negative distance in meters"));
            }
        }

        if self.region_radius == 0.0 {
            return Err(("region_radius", "must be greater than zero"));
        }

        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            minimum_battery_level: DEFAULT_MINIMUM_BATTERY_LEVEL,
            minimum_horizontal_accuracy: DEFAULT_MINIMUM_HORIZONTAL_ACCURACY,
            max_wait_for_first_fix: DEFAULT_MAX_WAIT_FOR_FIRST_FIX,
            max_wait_for_next_fix: DEFAULT_MAX_WAIT_FOR_NEXT_FIX,
            minimum_significant_time_interval: DEFAULT_MINIMUM_SIGNIFICANT_TIME_INTERVAL,
            minimum_significant_distance: DEFAULT_MINIMUM_SIGNIFICANT_DISTANCE,
            max_deferring_distance: DEFAULT_MAX_DEFERRING_DISTANCE,
            max_deferring_timeout: DEFAULT_MAX_DEFERRING_TIMEOUT,
            deferring_warmup: DEFAULT_DEFERRING_WARMUP,
            minimum_stationary_distance: DEFAULT_MINIMUM_STATIONARY_DISTANCE,
            minimum_stationary_time_interval: DEFAULT_MINIMUM_STATIONARY_TIME_INTERVAL,
            region_radius: DEFAULT_REGION_RADIUS,
        }
    }
}
