use tracing::trace;

use crate::cheap_ruler::CheapRuler;
use crate::readsb::Observation;

/// Where the receiver is
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// An observation that passed the spatial filter, with its distance from the observer.
///
/// The distance is computed once here and persisted as the visit's last-seen
/// distance, so the stored value always matches the value used for filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct RangedObservation {
    pub observation: Observation,
    pub distance_km: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl RangedObservation {
    pub fn hex(&self) -> &str {
        &self.observation.hex
    }
}

/// Keeps aircraft strictly inside a radius around the observer
#[derive(Debug, Clone, Copy)]
pub struct SpatialFilter {
    origin: ObserverLocation,
    radius_km: f64,
    ruler: CheapRuler,
}

impl SpatialFilter {
    pub fn new(origin: ObserverLocation, radius_km: f64) -> Self {
        Self {
            origin,
            radius_km,
            ruler: CheapRuler::new(origin.latitude),
        }
    }

    /// Distance in kilometres from the observer
    pub fn distance_km(&self, latitude: f64, longitude: f64) -> f64 {
        self.ruler.distance(
            self.origin.latitude,
            self.origin.longitude,
            latitude,
            longitude,
        )
    }

    /// Range-check a single observation. Aircraft without a position never pass.
    pub fn check(&self, observation: Observation) -> Option<RangedObservation> {
        let (latitude, longitude) = observation.position()?;
        let distance_km = self.distance_km(latitude, longitude);

        if distance_km < self.radius_km {
            Some(RangedObservation {
                observation,
                distance_km,
                latitude,
                longitude,
            })
        } else {
            trace!(
                "Dropping {} at {:.1}km (radius {:.1}km)",
                observation.hex, distance_km, self.radius_km
            );
            None
        }
    }

    /// Reduce a snapshot to the aircraft inside the radius, preserving order
    pub fn filter(&self, observations: Vec<Observation>) -> Vec<RangedObservation> {
        observations
            .into_iter()
            .filter_map(|observation| self.check(observation))
            .collect()
    }
}
