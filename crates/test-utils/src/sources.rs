//! Fake hazard sources that never touch the network.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use hazard_common::{HazardError, HazardResult, HazardSnapshot};
use hazard_source::HazardSource;

/// Serves fixed snapshots per day and counts fetches.
///
/// Days without a configured snapshot return an empty snapshot.
#[derive(Default)]
pub struct StaticHazardSource {
    snapshots: HashMap<u8, HazardSnapshot>,
    calls: AtomicUsize,
}

impl StaticHazardSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(mut self, snapshot: HazardSnapshot) -> Self {
        self.snapshots.insert(snapshot.day, snapshot);
        self
    }

    /// Number of `fetch` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HazardSource for StaticHazardSource {
    async fn fetch(&self, day: u8) -> HazardResult<HazardSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .snapshots
            .get(&day)
            .cloned()
            .unwrap_or_else(|| HazardSnapshot::empty(day)))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Fails every fetch with `UpstreamFetchFailed` and counts attempts.
#[derive(Default)]
pub struct FailingHazardSource {
    calls: AtomicUsize,
}

impl FailingHazardSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HazardSource for FailingHazardSource {
    async fn fetch(&self, day: u8) -> HazardResult<HazardSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(HazardError::UpstreamFetchFailed(format!(
            "simulated timeout for day {}",
            day
        )))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
