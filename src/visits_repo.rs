use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::schema::visits;
use crate::visits::Visit;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// Failures that prevent a store call from running at all
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to get database connection: {0}")]
    Connection(#[from] r2d2::Error),

    #[error("database query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("database call did not finish within {0:?}")]
    Timeout(Duration),

    #[error("database task panicked or was cancelled: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A single row of a batch that could not be written
#[derive(Debug, Clone, PartialEq)]
pub struct WriteFailure {
    pub visit_id: Uuid,
    pub hex: String,
    pub reason: String,
}

/// Per-item result of a batched insert or update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub written: Vec<Uuid>,
    pub failed: Vec<WriteFailure>,
}

impl BatchOutcome {
    pub fn record_success(&mut self, visit: &Visit) {
        self.written.push(visit.id);
    }

    pub fn record_failure(&mut self, visit: &Visit, reason: impl Into<String>) {
        self.failed.push(WriteFailure {
            visit_id: visit.id,
            hex: visit.hex.clone(),
            reason: reason.into(),
        });
    }

    /// Every item of `batch` counted as failed for the same reason
    pub fn all_failed(batch: &[Visit], reason: &str) -> Self {
        let mut outcome = Self::default();
        for visit in batch {
            outcome.record_failure(visit, reason);
        }
        outcome
    }
}

/// Storage operations the reconciliation cycle depends on.
///
/// Batch writes are per-statement independent: a failing item is reported in the
/// returned [`BatchOutcome`] and never aborts or rolls back its neighbours. An
/// `Err` means the batch could not be attempted.
#[async_trait]
pub trait VisitStore: Send + Sync {
    /// The most recent visit (by last-seen) for each hex code, one row per hex
    async fn find_latest_visits(&self, hex_codes: &[String]) -> Result<Vec<Visit>, StoreError>;

    /// Insert newly started visits
    async fn insert_visits(&self, batch: Vec<Visit>) -> Result<BatchOutcome, StoreError>;

    /// Write merged visits back, keyed by row id
    async fn update_visits(&self, batch: Vec<Visit>) -> Result<BatchOutcome, StoreError>;
}

/// Postgres-backed [`VisitStore`].
///
/// Calls run one at a time. A call that times out keeps the repository busy
/// until its blocking task has actually returned, so the next read never sees
/// a row that an abandoned write is still about to change.
#[derive(Clone)]
pub struct VisitsRepository {
    pool: PgPool,
    timeout: Duration,
    in_flight: Arc<Mutex<()>>,
}

impl VisitsRepository {
    /// Every call is bounded by `timeout`, including time spent waiting for
    /// an earlier call to finish
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self {
            pool,
            timeout,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Run `operation` on a pooled connection off the async runtime
    async fn with_connection<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgPooledConnection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        let in_flight = self.in_flight.clone();
        let call = async move {
            let guard = in_flight.lock_owned().await;
            // The guard moves into the task and is released only when it returns
            tokio::task::spawn_blocking(move || {
                let _guard = guard;
                let mut conn = pool.get()?;
                operation(&mut conn)
            })
            .await
            .unwrap_or_else(|e| Err(StoreError::Task(e)))
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }

    /// Number of visits currently open, for startup logging
    pub async fn count_open_visits(&self, now_epoch: f64, window_secs: f64) -> Result<i64, StoreError> {
        self.with_connection(move |conn| {
            let count = visits::table
                .filter(visits::last_seen_epoch.ge(now_epoch - window_secs))
                .select(diesel::dsl::count_distinct(visits::hex))
                .get_result::<i64>(conn)?;
            Ok(count)
        })
        .await
    }
}

#[async_trait]
impl VisitStore for VisitsRepository {
    #[tracing::instrument(skip_all, fields(hex_codes = hex_codes.len()))]
    async fn find_latest_visits(&self, hex_codes: &[String]) -> Result<Vec<Visit>, StoreError> {
        if hex_codes.is_empty() {
            return Ok(Vec::new());
        }

        let hex_codes = hex_codes.to_vec();
        let requested = hex_codes.len();
        self.with_connection(move |conn| {
            // SELECT DISTINCT ON (hex) ... ORDER BY hex, last_seen_epoch DESC
            let rows = visits::table
                .filter(visits::hex.eq_any(hex_codes))
                .distinct_on(visits::hex)
                .order_by((visits::hex, visits::last_seen_epoch.desc()))
                .select(Visit::as_select())
                .load::<Visit>(conn)?;
            debug!("Found {} latest visits for {} hex codes", rows.len(), requested);
            Ok(rows)
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(batch = batch.len()))]
    async fn insert_visits(&self, batch: Vec<Visit>) -> Result<BatchOutcome, StoreError> {
        if batch.is_empty() {
            return Ok(BatchOutcome::default());
        }

        self.with_connection(move |conn| {
            let mut outcome = BatchOutcome::default();

            // One autocommit statement per row: a failing row cannot take the others with it
            for visit in &batch {
                match diesel::insert_into(visits::table).values(visit).execute(conn) {
                    Ok(_) => outcome.record_success(visit),
                    Err(e) => {
                        warn!("Failed to insert visit {} for {}: {}", visit.id, visit.hex, e);
                        outcome.record_failure(visit, e.to_string());
                    }
                }
            }

            Ok(outcome)
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(batch = batch.len()))]
    async fn update_visits(&self, batch: Vec<Visit>) -> Result<BatchOutcome, StoreError> {
        if batch.is_empty() {
            return Ok(BatchOutcome::default());
        }

        self.with_connection(move |conn| {
            let mut outcome = BatchOutcome::default();

            for visit in &batch {
                match diesel::update(visits::table.find(visit.id))
                    .set(visit)
                    .execute(conn)
                {
                    Ok(0) => {
                        warn!("Visit {} for {} no longer exists, update skipped", visit.id, visit.hex);
                        outcome.record_failure(visit, "no row with this id");
                    }
                    Ok(_) => outcome.record_success(visit),
                    Err(e) => {
                        warn!("Failed to update visit {} for {}: {}", visit.id, visit.hex, e);
                        outcome.record_failure(visit, e.to_string());
                    }
                }
            }

            Ok(outcome)
        })
        .await
    }
}
