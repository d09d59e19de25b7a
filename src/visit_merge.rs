//! Folding a fresh observation into an open visit.
//!
//! Position, track and the passthrough telemetry always take the latest value.
//! Altitudes and speeds keep the highest value seen during the visit, which is
//! what "highest / fastest seen" statistics are computed from. Identity and
//! first-seen columns are never touched.
//!
//! Merging is pure and idempotent, so replaying a snapshot after a failed write
//! cannot skew a visit.

use crate::spatial_filter::RangedObservation;
use crate::visits::{CycleTime, Visit};

/// Merge `ranged` into `existing` as seen at `seen_at`
pub fn merge_observation(existing: &Visit, ranged: &RangedObservation, seen_at: CycleTime) -> Visit {
    let observation = &ranged.observation;
    let mut merged = existing.clone();

    merged.last_seen = seen_at.at;
    merged.last_seen_epoch = seen_at.epoch;
    merged.last_seen_lat = ranged.latitude;
    merged.last_seen_lon = ranged.longitude;
    merged.last_seen_distance_km = ranged.distance_km;
    merged.updated_at = seen_at.at;

    merged.overwrite_telemetry(observation);

    merged.alt_baro = max_observed(existing.alt_baro, observation.alt_baro);
    merged.alt_geom = max_observed(existing.alt_geom, observation.alt_geom);
    merged.ground_speed = max_observed(existing.ground_speed, observation.ground_speed);
    merged.ias = max_observed(existing.ias, observation.ias);
    merged.tas = max_observed(existing.tas, observation.tas);

    merged
}

/// Highest of two optional readings; a missing reading never wins over a present one
fn max_observed<T: PartialOrd + Copy>(stored: Option<T>, observed: Option<T>) -> Option<T> {
    match (stored, observed) {
        (Some(stored), Some(observed)) if observed > stored => Some(observed),
        (Some(stored), _) => Some(stored),
        (None, observed) => observed,
    }
}
