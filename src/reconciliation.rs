//! One reconciliation cycle: fetch, filter, classify, merge, write.
//!
//! A cycle either aborts before touching the store (fetch failure), aborts
//! before writing (classification failure), or runs both write batches to the
//! end. Individual rows that fail to write are reported and left for the next
//! snapshot to repair.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::readsb::{FetchError, Snapshot, SnapshotSource};
use crate::scheduler::ScheduledJob;
use crate::session_classifier::classify;
use crate::spatial_filter::SpatialFilter;
use crate::staleness::StalenessWindow;
use crate::visit_merge::merge_observation;
use crate::visits::{CycleTime, Visit};
use crate::visits_repo::{BatchOutcome, StoreError, VisitStore};

/// Reasons a cycle stops before its writes
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("failed to fetch snapshot: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to look up open visits: {0}")]
    Classification(#[source] StoreError),
}

impl CycleError {
    /// Label used for the failure metric
    pub fn stage(&self) -> &'static str {
        match self {
            CycleError::Fetch(_) => "fetch",
            CycleError::Classification(_) => "classify",
        }
    }
}

/// Summary of a completed cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// The snapshot's `now`, used as the cycle time
    pub snapshot_epoch: f64,
    pub aircraft_total: usize,
    pub in_range: usize,
    pub new_visits: usize,
    pub continuing_visits: usize,
    pub inserted: usize,
    pub updated: usize,
    pub failed_writes: usize,
}

pub struct Reconciler {
    source: Arc<dyn SnapshotSource>,
    store: Arc<dyn VisitStore>,
    filter: SpatialFilter,
    window: StalenessWindow,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        store: Arc<dyn VisitStore>,
        filter: SpatialFilter,
        window: StalenessWindow,
    ) -> Self {
        Self {
            source,
            store,
            filter,
            window,
        }
    }

    /// Fetch the current snapshot and reconcile it against the store
    #[tracing::instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let start = Instant::now();
        metrics::counter!("reconcile.cycles_total").increment(1);

        let result = match self.source.fetch_snapshot().await {
            Ok(snapshot) => self.reconcile(snapshot).await,
            Err(e) => Err(CycleError::Fetch(e)),
        };

        metrics::histogram!("reconcile.cycle_duration_ms").record(start.elapsed().as_millis() as f64);
        if let Err(e) = &result {
            metrics::counter!("reconcile.cycle_failures_total", "stage" => e.stage()).increment(1);
        }

        result
    }

    /// Reconcile an already fetched snapshot
    pub async fn reconcile(&self, mut snapshot: Snapshot) -> Result<CycleReport, CycleError> {
        let aircraft_total = snapshot.aircraft.len();
        snapshot.normalize();
        let seen_at = CycleTime::from_epoch(snapshot.now)?;

        let in_range = self.filter.filter(snapshot.aircraft);
        metrics::gauge!("reconcile.aircraft_in_range").set(in_range.len() as f64);

        let mut report = CycleReport {
            snapshot_epoch: seen_at.epoch,
            aircraft_total,
            in_range: in_range.len(),
            ..Default::default()
        };

        let classification = classify(self.store.as_ref(), in_range, seen_at.epoch, self.window)
            .await
            .map_err(CycleError::Classification)?;

        report.new_visits = classification.new.len();
        report.continuing_visits = classification.continuing.len();

        let inserts: Vec<Visit> = classification
            .new
            .iter()
            .map(|ranged| Visit::from_observation(ranged, seen_at))
            .collect();

        let updates: Vec<Visit> = classification
            .continuing
            .iter()
            .map(|continuing| merge_observation(&continuing.visit, &continuing.observation, seen_at))
            .collect();

        debug!(
            "Cycle at {:.1}: {} new, {} continuing",
            seen_at.epoch,
            inserts.len(),
            updates.len()
        );

        let inserted = if inserts.is_empty() {
            BatchOutcome::default()
        } else {
            let result = self.store.insert_visits(inserts.clone()).await;
            settle_batch("insert", &inserts, result)
        };

        let updated = if updates.is_empty() {
            BatchOutcome::default()
        } else {
            let result = self.store.update_visits(updates.clone()).await;
            settle_batch("update", &updates, result)
        };

        report.inserted = inserted.written.len();
        report.updated = updated.written.len();
        report.failed_writes = inserted.failed.len() + updated.failed.len();

        metrics::counter!("reconcile.visits_inserted_total").increment(report.inserted as u64);
        metrics::counter!("reconcile.visits_updated_total").increment(report.updated as u64);

        info!(
            "Reconciled snapshot {:.1}: {} aircraft, {} in range, {} inserted, {} updated, {} failed",
            report.snapshot_epoch,
            report.aircraft_total,
            report.in_range,
            report.inserted,
            report.updated,
            report.failed_writes
        );

        Ok(report)
    }
}

/// Turn a batch result into per-item outcomes; a batch that could not be
/// attempted counts every item as failed
fn settle_batch(
    op: &'static str,
    batch: &[Visit],
    result: Result<BatchOutcome, StoreError>,
) -> BatchOutcome {
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("{} batch of {} visits could not be written: {}", op, batch.len(), e);
            BatchOutcome::all_failed(batch, &e.to_string())
        }
    };

    for failure in &outcome.failed {
        debug!(
            "Failed to {} visit {} for {}: {}",
            op, failure.visit_id, failure.hex, failure.reason
        );
    }
    if !outcome.failed.is_empty() {
        metrics::counter!("reconcile.write_failures_total", "op" => op)
            .increment(outcome.failed.len() as u64);
    }

    outcome
}

#[async_trait]
impl ScheduledJob for Reconciler {
    async fn run(&self) -> anyhow::Result<()> {
        self.run_cycle().await?;
        Ok(())
    }
}
