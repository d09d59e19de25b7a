//! Deciding whether each aircraft in a snapshot continues an open visit or
//! starts a new one.
//!
//! The store is asked once per cycle for the most recent visit of every hex in
//! the snapshot. A returned row only counts as continuing when it is still open
//! under the staleness window; older rows are history and are never reopened,
//! so an aircraft that reappears after the window gets a fresh visit.

use std::collections::HashMap;
use tracing::{debug, trace};

use crate::spatial_filter::RangedObservation;
use crate::staleness::StalenessWindow;
use crate::visits::Visit;
use crate::visits_repo::{StoreError, VisitStore};

/// An aircraft whose open visit will be merged and updated
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuingAircraft {
    pub visit: Visit,
    pub observation: RangedObservation,
}

/// Every distinct aircraft of a snapshot lands in exactly one of the two lists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub continuing: Vec<ContinuingAircraft>,
    pub new: Vec<RangedObservation>,
}

impl Classification {
    pub fn len(&self) -> usize {
        self.continuing.len() + self.new.len()
    }

    pub fn is_empty(&self) -> bool {
        self.continuing.is_empty() && self.new.is_empty()
    }
}

/// Collapse repeated hex codes within one snapshot; the last occurrence wins
/// but keeps the position of the first
pub fn dedupe_by_hex(observations: Vec<RangedObservation>) -> Vec<RangedObservation> {
    let mut index_by_hex: HashMap<String, usize> = HashMap::with_capacity(observations.len());
    let mut unique: Vec<RangedObservation> = Vec::with_capacity(observations.len());

    for observation in observations {
        match index_by_hex.get(observation.hex()) {
            Some(&index) => {
                trace!("Duplicate hex {} in snapshot, keeping latest entry", observation.hex());
                unique[index] = observation;
            }
            None => {
                index_by_hex.insert(observation.hex().to_string(), unique.len());
                unique.push(observation);
            }
        }
    }

    unique
}

/// Split observations into continuing and new given the latest stored visit per hex
pub fn partition(
    observations: Vec<RangedObservation>,
    latest_visits: Vec<Visit>,
    now_epoch: f64,
    window: StalenessWindow,
) -> Classification {
    let mut open_visits: HashMap<String, Visit> = HashMap::with_capacity(latest_visits.len());

    for visit in latest_visits {
        // Guard the one-row-per-hex contract: only the most recent row may count
        if let Some(current) = open_visits.get(&visit.hex)
            && current.last_seen_epoch >= visit.last_seen_epoch
        {
            continue;
        }
        open_visits.insert(visit.hex.clone(), visit);
    }

    open_visits.retain(|hex, visit| {
        let open = window.is_open(visit.last_seen_epoch, now_epoch);
        if !open {
            debug!(
                "Latest visit {} for {} is stale ({:.0}s old), starting a new visit",
                visit.id,
                hex,
                now_epoch - visit.last_seen_epoch
            );
        }
        open
    });

    let mut classification = Classification::default();
    for observation in dedupe_by_hex(observations) {
        match open_visits.remove(observation.hex()) {
            Some(visit) => classification
                .continuing
                .push(ContinuingAircraft { visit, observation }),
            None => classification.new.push(observation),
        }
    }

    classification
}

/// Query the store for the latest visit of every aircraft and partition them.
///
/// An empty snapshot never touches the store.
pub async fn classify(
    store: &dyn VisitStore,
    observations: Vec<RangedObservation>,
    now_epoch: f64,
    window: StalenessWindow,
) -> Result<Classification, StoreError> {
    if observations.is_empty() {
        return Ok(Classification::default());
    }

    let mut hex_codes: Vec<String> = observations.iter().map(|o| o.hex().to_string()).collect();
    hex_codes.sort_unstable();
    hex_codes.dedup();

    let latest_visits = store.find_latest_visits(&hex_codes).await?;
    Ok(partition(observations, latest_visits, now_epoch, window))
}
