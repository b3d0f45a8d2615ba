//! INI parsing logic for converting `Ini` → `ConfigFile`.

use std::path::PathBuf;
use std::time::Duration;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [tracker] section
    if let Some(section) = ini.section(Some("tracker")) {
        let mut tracker = config.tracker;
        if let Some(v) = fraction(section, "tracker", "minimum_battery_level")? {
            tracker = tracker.with_minimum_battery_level(v);
        }
        if let Some(v) = meters(section, "tracker", "minimum_horizontal_accuracy")? {
            tracker = tracker.with_minimum_horizontal_accuracy(v);
        }
        if let Some(v) = seconds(section, "tracker", "max_wait_for_first_fix_secs")? {
            tracker = tracker.with_max_wait_for_first_fix(v);
        }
        if let Some(v) = seconds(section, "tracker", "max_wait_for_next_fix_secs")? {
            tracker = tracker.with_max_wait_for_next_fix(v);
        }
        if let Some(v) = seconds(section, "tracker", "minimum_significant_time_interval_secs")? {
            tracker = tracker.with_minimum_significant_time_interval(v);
        }
        if let Some(v) = meters(section, "tracker", "minimum_significant_distance")? {
            tracker = tracker.with_minimum_significant_distance(v);
        }
        if let Some(v) = meters(section, "tracker", "max_deferring_distance")? {
            tracker = tracker.with_max_deferring_distance(v);
        }
        if let Some(v) = seconds(section, "tracker", "max_deferring_timeout_secs")? {
            tracker = tracker.with_max_deferring_timeout(v);
        }
        if let Some(v) = seconds(section, "tracker", "deferring_warmup_secs")? {
            tracker = tracker.with_deferring_warmup(v);
        }
        if let Some(v) = meters(section, "tracker", "minimum_stationary_distance")? {
            tracker = tracker.with_minimum_stationary_distance(v);
        }
        if let Some(v) = seconds(section, "tracker", "minimum_stationary_time_interval_secs")? {
            tracker = tracker.with_minimum_stationary_time_interval(v);
        }
        if let Some(v) = meters(section, "tracker", "region_radius")? {
            tracker = tracker.with_region_radius(v);
        }
        if let Err((key, reason)) = tracker.validate() {
            let value = section.get(key).unwrap_or_default();
            return Err(invalid("tracker", key, value, reason));
        }
        config.tracker = tracker;
    }

    // [daemon] section
    if let Some(section) = ini.section(Some("daemon")) {
        if let Some(v) = seconds(section, "daemon", "watchdog_interval_secs")? {
            if v.is_zero() {
                return Err(invalid(
                    "daemon",
                    "watchdog_interval_secs",
                    "0",
                    "must be greater than zero",
                ));
            }
            config.daemon.watchdog_interval = v;
        }
        if let Some(v) = seconds(section, "daemon", "region_restart_delay_secs")? {
            config.daemon.region_restart_delay = v;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn number(
    section: &Properties,
    name: &str,
    key: &str,
    reason: &str,
) -> Result<Option<f64>, ConfigFileError> {
    let Some(raw) = section.get(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(Some(v)),
        _ => Err(invalid(name, key, raw, reason)),
    }
}

/// Parse a distance in meters.
fn meters(section: &Properties, name: &str, key: &str) -> Result<Option<f64>, ConfigFileError> {
    number(section, name, key, "must be a non-negative distance in meters")
}

/// Parse a fraction in `[0, 1]`.
fn fraction(section: &Properties, name: &str, key: &str) -> Result<Option<f64>, ConfigFileError> {
    let reason = "must be a fraction between 0 and 1";
    match number(section, name, key, reason)? {
        Some(v) if v > 1.0 => Err(invalid(name, key, &v.to_string(), reason)),
        other => Ok(other),
    }
}

/// Parse a duration given in (fractional) seconds.
fn seconds(
    section: &Properties,
    name: &str,
    key: &str,
) -> Result<Option<Duration>, ConfigFileError> {
    let reason = "must be a non-negative number of seconds";
    match number(section, name, key, reason)? {
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(|_| invalid(name, key, &secs.to_string(), reason)),
        None => Ok(None),
    }
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_tracker_section() {
        let config = parse(
            r#"
[tracker]
minimum_battery_level = 0.15
minimum_horizontal_accuracy = 25
max_wait_for_first_fix_secs = 90
max_wait_for_next_fix_secs = 240
minimum_significant_time_interval_secs = 10
minimum_significant_distance = 5
max_deferring_distance = 1000
max_deferring_timeout_secs = 60
deferring_warmup_secs = 20
minimum_stationary_distance = 40
minimum_stationary_time_interval_secs = 300
region_radius = 100
"#,
        )
        .unwrap();

        let tracker = config.tracker;
        assert_eq!(tracker.minimum_battery_level(), 0.15);
        assert_eq!(tracker.minimum_horizontal_accuracy(), 25.0);
        assert_eq!(tracker.max_wait_for_first_fix(), Duration::from_secs(90));
        assert_eq!(tracker.max_wait_for_next_fix(), Duration::from_secs(240));
        assert_eq!(
            tracker.minimum_significant_time_interval(),
            Duration::from_secs(10)
        );
        assert_eq!(tracker.minimum_significant_distance(), 5.0);
        assert_eq!(tracker.max_deferring_distance(), 1000.0);
        assert_eq!(tracker.max_deferring_timeout(), Duration::from_secs(60));
        assert_eq!(tracker.deferring_warmup(), Duration::from_secs(20));
        assert_eq!(tracker.minimum_stationary_distance(), 40.0);
        assert_eq!(
            tracker.minimum_stationary_time_interval(),
            Duration::from_secs(300)
        );
        assert_eq!(tracker.region_radius(), 100.0);
    }

    #[test]
    fn test_partial_config() {
        let config = parse("[daemon]\nwatchdog_interval_secs = 2.5\n").unwrap();
        assert_eq!(config.daemon.watchdog_interval, Duration::from_millis(2500));
        assert_eq!(
            config.daemon.region_restart_delay,
            DEFAULT_REGION_RESTART_DELAY
        );
        assert_eq!(
            config.tracker.minimum_horizontal_accuracy(),
            DEFAULT_MINIMUM_HORIZONTAL_ACCURACY
        );
    }

    #[test]
    fn test_invalid_number() {
        let err = parse("[tracker]\nregion_radius = wide\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, key, value, .. } => {
                assert_eq!(section, "tracker");
                assert_eq!(key, "region_radius");
                assert_eq!(value, "wide");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_negative_distance_rejected() {
        assert!(parse("[tracker]\nminimum_significant_distance = -3\n").is_err());
    }

    #[test]
    fn test_battery_fraction_out_of_range() {
        assert!(parse("[tracker]\nminimum_battery_level = 20\n").is_err());
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(parse("[tracker]\nregion_radius = 0\n").is_err());
        assert!(parse("[daemon]\nwatchdog_interval_secs = 0\n").is_err());
    }

    #[test]
    fn test_logging_section() {
        let config = parse("[logging]\ndirectory = /var/log/trackline\nfile = session.log\n")
            .unwrap();
        assert_eq!(config.logging.directory, PathBuf::from("/var/log/trackline"));
        assert_eq!(config.logging.file, "session.log");
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/tracks");
        if dirs::home_dir().is_some() {
            assert!(!expanded.starts_with("~"));
            assert!(expanded.ends_with("tracks"));
        }
        assert_eq!(expand_tilde("/tmp/tracks"), PathBuf::from("/tmp/tracks"));
    }
}
