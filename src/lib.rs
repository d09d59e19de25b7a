//! skylog - keeps a rolling record of the aircraft a local ADS-B receiver sees
//!
//! Every poll the receiver's `aircraft.json` snapshot is narrowed to a radius
//! around the observer and reconciled against a table of visits: one row per
//! aircraft per continuous period of visibility, updated in place while the
//! aircraft stays in view.

pub mod cheap_ruler;
pub mod config;
pub mod db;
pub mod instance_lock;
pub mod metrics;
pub mod readsb;
pub mod reconciliation;
pub mod scheduler;
pub mod schema;
pub mod session_classifier;
pub mod spatial_filter;
pub mod staleness;
pub mod visit_merge;
pub mod visits;
pub mod visits_repo;

pub use readsb::{Observation, ReadsbClient, Snapshot, SnapshotSource};
pub use reconciliation::{CycleError, CycleReport, Reconciler};
pub use spatial_filter::{ObserverLocation, RangedObservation, SpatialFilter};
pub use staleness::StalenessWindow;
pub use visits::{CycleTime, Visit};
pub use visits_repo::{BatchOutcome, StoreError, VisitStore, VisitsRepository, WriteFailure};
