//! readsb / tar1090 `aircraft.json` feed
//!
//! The receiver publishes a full snapshot of every aircraft it currently hears.
//! Only a handful of fields drive reconciliation (hex, callsign, position,
//! altitudes, speeds, track); everything else is carried through to the visit
//! row verbatim.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors raised while fetching or decoding a feed snapshot
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("feed returned malformed JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("feed snapshot has an unusable timestamp: {0}")]
    InvalidTimestamp(f64),
}

/// One full snapshot of the receiver's aircraft table
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Snapshot {
    /// Seconds since the Unix epoch, fractional
    pub now: f64,
    /// Running count of Mode S messages received
    #[serde(default)]
    pub messages: Option<i64>,
    #[serde(default)]
    pub aircraft: Vec<Observation>,
}

impl Snapshot {
    /// Trim callsigns, normalise hex codes and drop entries without an identifier
    pub fn normalize(&mut self) {
        self.aircraft.retain_mut(|observation| {
            observation.normalize();
            !observation.hex.is_empty()
        });
    }
}

/// A single aircraft within a snapshot
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Observation {
    pub hex: String,
    /// Message source, e.g. `adsb_icao`, `mlat`, `tisb_other`
    #[serde(rename = "type", default)]
    pub source_type: Option<String>,
    #[serde(rename = "flight", default)]
    pub callsign: Option<String>,
    #[serde(rename = "r", default)]
    pub registration: Option<String>,
    #[serde(rename = "t", default)]
    pub type_code: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub squawk: Option<String>,
    #[serde(default)]
    pub emergency: Option<String>,
    #[serde(default, deserialize_with = "deserialize_altitude")]
    pub alt_baro: Option<i32>,
    #[serde(default)]
    pub alt_geom: Option<i32>,
    #[serde(rename = "gs", default)]
    pub ground_speed: Option<f64>,
    #[serde(default)]
    pub ias: Option<i32>,
    #[serde(default)]
    pub tas: Option<i32>,
    #[serde(default)]
    pub track: Option<f64>,
    #[serde(default)]
    pub baro_rate: Option<i32>,
    #[serde(default)]
    pub nav_qnh: Option<f64>,
    #[serde(default)]
    pub nav_altitude_mcp: Option<i32>,
    #[serde(default)]
    pub nav_heading: Option<f64>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub nic: Option<i32>,
    #[serde(default)]
    pub rc: Option<i32>,
    #[serde(default)]
    pub seen_pos: Option<f64>,
    #[serde(rename = "r_dst", default)]
    pub receiver_distance: Option<f64>,
    #[serde(rename = "r_dir", default)]
    pub receiver_direction: Option<f64>,
    #[serde(rename = "version", default)]
    pub adsb_version: Option<i32>,
    #[serde(default)]
    pub nic_baro: Option<i32>,
    #[serde(default)]
    pub nac_p: Option<i32>,
    #[serde(default)]
    pub nac_v: Option<i32>,
    #[serde(default)]
    pub sil: Option<i32>,
    #[serde(default)]
    pub sil_type: Option<String>,
    #[serde(default)]
    pub alert: Option<i32>,
    #[serde(default)]
    pub spi: Option<i32>,
    /// Names of the fields that were derived from MLAT
    #[serde(default)]
    pub mlat: Vec<String>,
    /// Names of the fields that were derived from TIS-B
    #[serde(default)]
    pub tisb: Vec<String>,
    #[serde(default)]
    pub messages: Option<i64>,
    #[serde(default)]
    pub seen: Option<f64>,
    #[serde(default)]
    pub rssi: Option<f64>,
    #[serde(rename = "dbFlags", default)]
    pub db_flags: Option<i32>,
}

impl Observation {
    /// Last reported position as (lat, lon), if the receiver has one
    pub fn position(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lon)
    }

    fn normalize(&mut self) {
        self.hex = self.hex.trim().to_ascii_lowercase();
        // readsb pads callsigns to eight characters
        self.callsign = self
            .callsign
            .take()
            .map(|callsign| callsign.trim().to_string())
            .filter(|callsign| !callsign.is_empty());
    }
}

/// readsb reports `"ground"` instead of a number for aircraft on the ground
fn deserialize_altitude<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Altitude {
        Feet(i32),
        Text(String),
    }

    Ok(
        match Option::<Altitude>::deserialize(deserializer)? {
            Some(Altitude::Feet(feet)) => Some(feet),
            Some(Altitude::Text(text)) if text.eq_ignore_ascii_case("ground") => Some(0),
            Some(Altitude::Text(_)) | None => None,
        },
    )
}

/// Anything that can produce feed snapshots
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError>;
}

/// HTTP client for a readsb `aircraft.json` endpoint
#[derive(Debug, Clone)]
pub struct ReadsbClient {
    client: reqwest::Client,
    url: String,
}

impl ReadsbClient {
    /// Every request made by this client is bounded by `timeout`
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("skylog/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SnapshotSource for ReadsbClient {
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let snapshot: Snapshot = serde_json::from_slice(&body)?;
        debug!(
            "Fetched snapshot from {}: now={} aircraft={} messages={:?}",
            self.url,
            snapshot.now,
            snapshot.aircraft.len(),
            snapshot.messages
        );

        Ok(snapshot)
    }
}
