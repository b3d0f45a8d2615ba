//! Position samples delivered by the positioning subsystem.
//!
//! A [`Fix`] is a single timestamped position with its horizontal accuracy.
//! It is immutable once created and cheap to copy.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// A single position sample.
///
/// # Accuracy
///
/// `horizontal_accuracy` is the radius of uncertainty in meters (lower is
/// better). A negative value means the platform could not determine the
/// accuracy and the fix must be treated as invalid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,

    /// Horizontal accuracy in meters.
    pub horizontal_accuracy: f64,

    /// When the fix was measured.
    pub timestamp: DateTime<Utc>,
}

impl Fix {
    /// Create a new fix.
    pub fn new(
        latitude: f64,
        longitude: f64,
        horizontal_accuracy: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            horizontal_accuracy,
            timestamp,
        }
    }

    /// Create a fix from a unix timestamp expressed in (fractional) seconds.
    ///
    /// Returns `None` when the timestamp is not finite or out of range.
    pub fn from_unix_seconds(
        latitude: f64,
        longitude: f64,
        horizontal_accuracy: f64,
        unix_seconds: f64,
    ) -> Option<Self> {
        let timestamp = unix_seconds_to_datetime(unix_seconds)?;
        Some(Self::new(latitude, longitude, horizontal_accuracy, timestamp))
    }

    /// The fix timestamp as fractional unix seconds.
    pub fn unix_seconds(&self) -> f64 {
        datetime_to_unix_seconds(self.timestamp)
    }

    /// Coordinate as a `(latitude, longitude)` pair.
    #[inline]
    pub fn coordinate(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    /// Returns true if the coordinate is a geometrically valid position.
    pub fn has_valid_coordinate(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance to another fix, in meters.
    pub fn distance_to(&self, other: &Fix) -> f64 {
        distance_m(self.coordinate(), other.coordinate())
    }

    /// Time elapsed from `earlier` to this fix.
    ///
    /// Negative intervals saturate to zero.
    pub fn elapsed_since(&self, earlier: &Fix) -> Duration {
        (self.timestamp - earlier.timestamp)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

impl std::fmt::Display for Fix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<{:.6},{:.6}> +/- {:.1}m @ {}",
            self.latitude,
            self.longitude,
            self.horizontal_accuracy,
            self.timestamp.to_rfc3339()
        )
    }
}

/// Calculate the great-circle distance between two positions.
///
/// Uses the haversine formula, which is accurate over the short distances
/// the tracker compares.
///
/// # Arguments
///
/// * `from` - First position as (latitude, longitude) in degrees
/// * `to` - Second position as (latitude, longitude) in degrees
///
/// # Example
///
/// ```
/// use trackline::fix::distance_m;
///
/// // One degree of latitude is about 111km
/// let dist = distance_m((0.0, 0.0), (1.0, 0.0));
/// assert!((dist - 111_195.0).abs() < 10.0);
/// ```
pub fn distance_m(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;

    let lat1_rad = lat1 * DEG_TO_RAD;
    let lat2_rad = lat2 * DEG_TO_RAD;
    let delta_lat = (lat2 - lat1) * DEG_TO_RAD;
    let delta_lon = (lon2 - lon1) * DEG_TO_RAD;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Convert a datetime to fractional unix seconds.
pub fn datetime_to_unix_seconds(timestamp: DateTime<Utc>) -> f64 {
    timestamp.timestamp() as f64 + f64::from(timestamp.timestamp_subsec_nanos()) / 1e9
}

/// Convert fractional unix seconds to a datetime (nanosecond resolution).
pub fn unix_seconds_to_datetime(unix_seconds: f64) -> Option<DateTime<Utc>> {
    if !unix_seconds.is_finite() {
        return None;
    }
    let secs = unix_seconds.floor();
    if secs < i64::MIN as f64 || secs > i64::MAX as f64 {
        return None;
    }
    let nanos = ((unix_seconds - secs) * 1e9).round() as u32;
    // Rounding can push the fraction to a full second.
    if nanos >= 1_000_000_000 {
        return DateTime::from_timestamp(secs as i64 + 1, 0);
    }
    DateTime::from_timestamp(secs as i64, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_distance_zero_for_same_point() {
        assert_eq!(distance_m((37.0, -122.0), (37.0, -122.0)), 0.0);
    }

    #[test]
    fn test_distance_one_degree_longitude_at_equator() {
        let dist = distance_m((0.0, 0.0), (0.0, 1.0));
        assert!((dist - 111_195.0).abs() < 10.0, "got {}", dist);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = (53.630278, 9.988333);
        let b = (43.629444, 1.363889);
        assert!((distance_m(a, b) - distance_m(b, a)).abs() < 1e-6);
    }

    #[test]
    fn test_valid_coordinate_bounds() {
        assert!(Fix::new(90.0, 180.0, 5.0, at(0)).has_valid_coordinate());
        assert!(Fix::new(-90.0, -180.0, 5.0, at(0)).has_valid_coordinate());
        assert!(!Fix::new(90.1, 0.0, 5.0, at(0)).has_valid_coordinate());
        assert!(!Fix::new(0.0, -180.5, 5.0, at(0)).has_valid_coordinate());
        assert!(!Fix::new(f64::NAN, 0.0, 5.0, at(0)).has_valid_coordinate());
    }

    #[test]
    fn test_elapsed_since_saturates() {
        let earlier = Fix::new(0.0, 0.0, 5.0, at(100));
        let later = Fix::new(0.0, 0.0, 5.0, at(130));
        assert_eq!(later.elapsed_since(&earlier), Duration::from_secs(30));
        assert_eq!(earlier.elapsed_since(&later), Duration::ZERO);
    }

    #[test]
    fn test_unix_seconds_conversion() {
        let fix = Fix::from_unix_seconds(37.0, -122.0, 5.0, 1_477_000_000.25).unwrap();
        assert_eq!(fix.timestamp.timestamp(), 1_477_000_000);
        assert_eq!(fix.timestamp.timestamp_subsec_millis(), 250);
        assert_eq!(fix.unix_seconds(), 1_477_000_000.25);
    }

    #[test]
    fn test_unix_seconds_rejects_non_finite() {
        assert!(unix_seconds_to_datetime(f64::NAN).is_none());
        assert!(unix_seconds_to_datetime(f64::INFINITY).is_none());
    }

    #[test]
    fn test_display() {
        let fix = Fix::new(37.0, -122.0, 5.0, at(0));
        assert_eq!(
            fix.to_string(),
            "<37.000000,-122.000000> +/- 5.0m @ 1970-01-01T00:00:00+00:00"
        );
    }
}
