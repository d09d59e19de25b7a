//! Open/stale decision for visits.
//!
//! A visit is never explicitly closed. Whether it is still open is decided at
//! read time by comparing its last-seen epoch with the current cycle time, and
//! that comparison lives here and nowhere else.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StalenessWindow(Duration);

impl StalenessWindow {
    pub const DEFAULT_SECS: u64 = 300;

    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    /// A visit last seen at `last_seen_epoch` is open at `now_epoch` while its
    /// age does not exceed the window (age == window is still open)
    pub fn is_open(&self, last_seen_epoch: f64, now_epoch: f64) -> bool {
        now_epoch - last_seen_epoch <= self.0.as_secs_f64()
    }
}

impl Default for StalenessWindow {
    fn default() -> Self {
        Self::from_secs(Self::DEFAULT_SECS)
    }
}
