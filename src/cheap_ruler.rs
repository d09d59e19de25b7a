//! Fast planar approximation of geodesic distances for short ranges.
//!
//! A ruler is built once for a reference latitude and then measures distances
//! around that latitude with a couple of multiplications instead of the
//! trigonometry the Haversine formula needs. Within a few hundred kilometres of
//! the reference latitude the error stays well under 0.5%, which is plenty for
//! deciding whether an aircraft is inside a receiver's area of interest.

/// WGS84 equatorial radius in kilometres
const EARTH_RADIUS_KM: f64 = 6378.137;
/// WGS84 flattening
const FLATTENING: f64 = 1.0 / 298.257223563;
const ECCENTRICITY_SQUARED: f64 = FLATTENING * (2.0 - FLATTENING);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheapRuler {
    /// Kilometres per degree of longitude at the reference latitude
    kx: f64,
    /// Kilometres per degree of latitude at the reference latitude
    ky: f64,
}

impl CheapRuler {
    /// Create a ruler measuring in kilometres around `latitude`
    pub fn new(latitude: f64) -> Self {
        let m = EARTH_RADIUS_KM.to_radians();
        let cos_lat = latitude.to_radians().cos();
        let w2 = 1.0 / (1.0 - ECCENTRICITY_SQUARED * (1.0 - cos_lat * cos_lat));
        let w = w2.sqrt();

        Self {
            kx: m * w * cos_lat,
            ky: m * w * w2 * (1.0 - ECCENTRICITY_SQUARED),
        }
    }

    /// Distance in kilometres between two points
    pub fn distance(&self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
        let dx = wrap_longitude(lon2 - lon1) * self.kx;
        let dy = (lat2 - lat1) * self.ky;
        (dx * dx + dy * dy).sqrt()
    }

    /// Point offset from (`lat`, `lon`) by `east_km` and `north_km`, as (lat, lon)
    pub fn offset(&self, lat: f64, lon: f64, east_km: f64, north_km: f64) -> (f64, f64) {
        (lat + north_km / self.ky, lon + east_km / self.kx)
    }
}

/// Normalise a longitude difference into [-180, 180)
fn wrap_longitude(delta: f64) -> f64 {
    let mut delta = delta;
    while delta < -180.0 {
        delta += 360.0;
    }
    while delta >= 180.0 {
        delta -= 360.0;
    }
    delta
}
