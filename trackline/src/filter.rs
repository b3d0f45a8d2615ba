//! Sample filter: pure predicates over individual fixes.
//!
//! These functions hold no state of their own. The tracking state machine
//! feeds them its current reference fix and configuration thresholds.
//!
//! - [`is_valid`] - accuracy within `[0, max]` and a valid coordinate
//! - [`is_later_than`] - strictly after the reference fix (or not before a floor)
//! - [`is_significant`] - better accuracy, enough time, or enough distance
//! - [`accept`] - validity and ordering applied to a batch, sorted ascending

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::fix::Fix;

/// Returns true if the fix is usable at all.
///
/// A fix is valid when its horizontal accuracy is known (non-negative), no
/// worse than `maximum_accuracy` meters, and its coordinate lies within the
/// valid latitude/longitude ranges.
pub fn is_valid(fix: &Fix, maximum_accuracy: f64) -> bool {
    fix.horizontal_accuracy >= 0.0
        && fix.horizontal_accuracy <= maximum_accuracy
        && fix.has_valid_coordinate()
}

/// Returns true if the fix is newer than the reference.
///
/// With a reference fix the timestamp must be strictly later. Without one,
/// the fix must not predate `floor` (the start of the current cycle).
pub fn is_later_than(fix: &Fix, reference: Option<&Fix>, floor: Option<DateTime<Utc>>) -> bool {
    match reference {
        Some(reference) => fix.timestamp > reference.timestamp,
        None => floor.is_none_or(|floor| fix.timestamp >= floor),
    }
}

/// Returns true if the fix materially improves knowledge of the position.
///
/// Any of the following makes a fix significant relative to `reference`:
/// - its accuracy is strictly better
/// - at least `min_interval` has elapsed since the reference
/// - it lies at least `min_distance` meters away from the reference
///
/// The first fix of a cycle (no reference) is always significant.
pub fn is_significant(
    fix: &Fix,
    reference: Option<&Fix>,
    min_interval: Duration,
    min_distance: f64,
) -> bool {
    let Some(reference) = reference else {
        return true;
    };

    fix.horizontal_accuracy < reference.horizontal_accuracy
        || fix.elapsed_since(reference) >= min_interval
        || fix.distance_to(reference) >= min_distance
}

/// Returns true if any fix lies at least `min_distance` meters from `anchor`.
pub fn has_moved(fixes: &[Fix], anchor: &Fix, min_distance: f64) -> bool {
    fixes.iter().any(|fix| fix.distance_to(anchor) >= min_distance)
}

/// Keep the usable, newer-than-reference fixes of a batch, oldest first.
///
/// Batches from deferred delivery may arrive out of temporal order, so the
/// result is sorted ascending by timestamp.
pub fn accept(
    batch: &[Fix],
    reference: Option<&Fix>,
    floor: Option<DateTime<Utc>>,
    maximum_accuracy: f64,
) -> Vec<Fix> {
    let mut accepted: Vec<Fix> = batch
        .iter()
        .filter(|fix| is_valid(fix, maximum_accuracy) && is_later_than(fix, reference, floor))
        .copied()
        .collect();
    accepted.sort_by_key(|fix| fix.timestamp);
    accepted
}
