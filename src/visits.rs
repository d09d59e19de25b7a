use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::readsb::{FetchError, Observation};
use crate::spatial_filter::RangedObservation;

/// The time a reconciliation cycle runs "at": the snapshot's own `now`.
///
/// Every timestamp written during a cycle comes from this value, so a replayed
/// snapshot produces exactly the same rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleTime {
    pub epoch: f64,
    pub at: DateTime<Utc>,
}

impl CycleTime {
    pub fn from_epoch(epoch: f64) -> Result<Self, FetchError> {
        if !epoch.is_finite() || epoch < 0.0 {
            return Err(FetchError::InvalidTimestamp(epoch));
        }

        let secs = epoch.trunc() as i64;
        let nanos = (epoch.fract() * 1e9).round().min(999_999_999.0) as u32;
        let at = DateTime::from_timestamp(secs, nanos)
            .ok_or(FetchError::InvalidTimestamp(epoch))?;

        Ok(Self { epoch, at })
    }
}

/// One aircraft's continuous period of visibility.
///
/// This single struct is the row for reads, inserts and updates. Identity and
/// first-seen columns are skipped by the update changeset; `None` values are
/// written as NULL so an update always mirrors the merged state exactly.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::visits)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct Visit {
    pub id: Uuid,
    #[diesel(skip_update)]
    pub hex: String,
    pub callsign: Option<String>,
    #[diesel(skip_update)]
    pub first_seen: DateTime<Utc>,
    #[diesel(skip_update)]
    pub first_seen_epoch: f64,
    pub last_seen: DateTime<Utc>,
    pub last_seen_epoch: f64,
    pub last_seen_lat: f64,
    pub last_seen_lon: f64,
    pub last_seen_distance_km: f64,
    pub source_type: Option<String>,
    pub registration: Option<String>,
    pub type_code: Option<String>,
    pub category: Option<String>,
    pub squawk: Option<String>,
    pub emergency: Option<String>,
    pub alt_baro: Option<i32>,
    pub alt_geom: Option<i32>,
    pub ground_speed: Option<f64>,
    pub ias: Option<i32>,
    pub tas: Option<i32>,
    pub track: Option<f64>,
    pub baro_rate: Option<i32>,
    pub nav_qnh: Option<f64>,
    pub nav_altitude_mcp: Option<i32>,
    pub nav_heading: Option<f64>,
    pub nic: Option<i32>,
    pub rc: Option<i32>,
    pub seen_pos: Option<f64>,
    pub receiver_distance: Option<f64>,
    pub receiver_direction: Option<f64>,
    pub adsb_version: Option<i32>,
    pub nic_baro: Option<i32>,
    pub nac_p: Option<i32>,
    pub nac_v: Option<i32>,
    pub sil: Option<i32>,
    pub sil_type: Option<String>,
    pub alert: Option<i32>,
    pub spi: Option<i32>,
    pub mlat: Vec<String>,
    pub tisb: Vec<String>,
    pub messages: Option<i64>,
    pub seen: Option<f64>,
    pub rssi: Option<f64>,
    pub db_flags: Option<i32>,
    #[diesel(skip_update)]
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    /// Start a new visit from an aircraft with no open visit
    pub fn from_observation(ranged: &RangedObservation, seen_at: CycleTime) -> Self {
        let observation = &ranged.observation;
        let mut visit = Self {
            id: Uuid::now_v7(),
            hex: observation.hex.clone(),
            callsign: None,
            first_seen: seen_at.at,
            first_seen_epoch: seen_at.epoch,
            last_seen: seen_at.at,
            last_seen_epoch: seen_at.epoch,
            last_seen_lat: ranged.latitude,
            last_seen_lon: ranged.longitude,
            last_seen_distance_km: ranged.distance_km,
            source_type: None,
            registration: None,
            type_code: None,
            category: None,
            squawk: None,
            emergency: None,
            alt_baro: observation.alt_baro,
            alt_geom: observation.alt_geom,
            ground_speed: observation.ground_speed,
            ias: observation.ias,
            tas: observation.tas,
            track: None,
            baro_rate: None,
            nav_qnh: None,
            nav_altitude_mcp: None,
            nav_heading: None,
            nic: None,
            rc: None,
            seen_pos: None,
            receiver_distance: None,
            receiver_direction: None,
            adsb_version: None,
            nic_baro: None,
            nac_p: None,
            nac_v: None,
            sil: None,
            sil_type: None,
            alert: None,
            spi: None,
            mlat: Vec::new(),
            tisb: Vec::new(),
            messages: None,
            seen: None,
            rssi: None,
            db_flags: None,
            created_at: seen_at.at,
            updated_at: seen_at.at,
        };
        visit.overwrite_telemetry(observation);
        visit
    }

    /// Copy every non-monotonic telemetry field from the observation
    pub(crate) fn overwrite_telemetry(&mut self, observation: &Observation) {
        self.callsign = observation.callsign.clone();
        self.source_type = observation.source_type.clone();
        self.registration = observation.registration.clone();
        self.type_code = observation.type_code.clone();
        self.category = observation.category.clone();
        self.squawk = observation.squawk.clone();
        self.emergency = observation.emergency.clone();
        self.track = observation.track;
        self.baro_rate = observation.baro_rate;
        self.nav_qnh = observation.nav_qnh;
        self.nav_altitude_mcp = observation.nav_altitude_mcp;
        self.nav_heading = observation.nav_heading;
        self.nic = observation.nic;
        self.rc = observation.rc;
        self.seen_pos = observation.seen_pos;
        self.receiver_distance = observation.receiver_distance;
        self.receiver_direction = observation.receiver_direction;
        self.adsb_version = observation.adsb_version;
        self.nic_baro = observation.nic_baro;
        self.nac_p = observation.nac_p;
        self.nac_v = observation.nac_v;
        self.sil = observation.sil;
        self.sil_type = observation.sil_type.clone();
        self.alert = observation.alert;
        self.spi = observation.spi;
        self.mlat = observation.mlat.clone();
        self.tisb = observation.tisb.clone();
        self.messages = observation.messages;
        self.seen = observation.seen;
        self.rssi = observation.rssi;
        self.db_flags = observation.db_flags;
    }
}
