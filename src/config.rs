use clap::Args;
use std::time::Duration;
use thiserror::Error;

use crate::spatial_filter::ObserverLocation;
use crate::staleness::StalenessWindow;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("latitude {0} is outside -90..=90")]
    Latitude(f64),

    #[error("longitude {0} is outside -180..=180")]
    Longitude(f64),

    #[error("radius must be a positive number of kilometres, got {0}")]
    Radius(f64),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("feed URL must not be empty")]
    MissingFeedUrl,
}

/// Database connection settings shared by every command
#[derive(Debug, Clone, Args)]
pub struct DatabaseArgs {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Maximum number of pooled connections
    #[arg(long, env = "DB_POOL_SIZE", default_value_t = 4)]
    pub db_pool_size: u32,
}

/// Settings for the reconciliation service
#[derive(Debug, Clone, Args)]
pub struct ReconcileArgs {
    /// Observer latitude in degrees
    #[arg(long, env = "LATITUDE", allow_negative_numbers = true)]
    pub latitude: f64,

    /// Observer longitude in degrees
    #[arg(long, env = "LONGITUDE", allow_negative_numbers = true)]
    pub longitude: f64,

    /// Only aircraft strictly closer than this many kilometres are tracked
    #[arg(long, env = "RADIUS")]
    pub radius: f64,

    /// URL of the receiver's aircraft.json
    #[arg(long, env = "READSB_AIRCRAFT_JSON")]
    pub feed_url: String,

    /// Seconds without an observation after which a visit is considered over
    #[arg(long, env = "STALENESS_WINDOW_SECS", default_value_t = StalenessWindow::DEFAULT_SECS)]
    pub staleness_window_secs: u64,

    /// Seconds between reconciliation cycles
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 2)]
    pub poll_interval_secs: u64,

    /// Upper bound on a single feed request
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 5)]
    pub fetch_timeout_secs: u64,

    /// Upper bound on a single database call
    #[arg(long, env = "STORE_TIMEOUT_SECS", default_value_t = 10)]
    pub store_timeout_secs: u64,

    /// Serve Prometheus metrics on this port when set
    #[arg(long, env = "METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Validated reconciliation settings
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub observer: ObserverLocation,
    pub radius_km: f64,
    pub staleness_window: StalenessWindow,
    pub poll_interval: Duration,
    pub feed_url: String,
    pub fetch_timeout: Duration,
    pub store_timeout: Duration,
    pub metrics_port: Option<u16>,
}

impl TryFrom<ReconcileArgs> for Config {
    type Error = ConfigError;

    fn try_from(args: ReconcileArgs) -> Result<Self, Self::Error> {
        let config = Config {
            observer: ObserverLocation {
                latitude: args.latitude,
                longitude: args.longitude,
            },
            radius_km: args.radius,
            staleness_window: StalenessWindow::from_secs(args.staleness_window_secs),
            poll_interval: Duration::from_secs(args.poll_interval_secs),
            feed_url: args.feed_url.trim().to_string(),
            fetch_timeout: Duration::from_secs(args.fetch_timeout_secs),
            store_timeout: Duration::from_secs(args.store_timeout_secs),
            metrics_port: args.metrics_port,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ObserverLocation {
            latitude,
            longitude,
        } = self.observer;

        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ConfigError::Latitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ConfigError::Longitude(longitude));
        }
        if !self.radius_km.is_finite() || self.radius_km <= 0.0 {
            return Err(ConfigError::Radius(self.radius_km));
        }
        if self.feed_url.is_empty() {
            return Err(ConfigError::MissingFeedUrl);
        }

        for (name, duration) in [
            ("staleness window", self.staleness_window.duration()),
            ("poll interval", self.poll_interval),
            ("fetch timeout", self.fetch_timeout),
            ("store timeout", self.store_timeout),
        ] {
            if duration.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }

        Ok(())
    }
}
