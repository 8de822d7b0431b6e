//! The hazard source interface and day-to-layer mapping.

use async_trait::async_trait;
use std::sync::Arc;

use hazard_common::tile::{validate_day, MAX_DAY};
use hazard_common::{HazardError, HazardResult, HazardSnapshot};

/// Produces the hazard snapshot for a forecast day.
///
/// An upstream that reports no features yields an empty snapshot, not an
/// error. Errors mean the data could not be obtained and must not be cached.
#[async_trait]
pub trait HazardSource: Send + Sync {
    async fn fetch(&self, day: u8) -> HazardResult<HazardSnapshot>;

    /// Short source name for logs and metrics.
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<S: HazardSource + ?Sized> HazardSource for Arc<S> {
    async fn fetch(&self, day: u8) -> HazardResult<HazardSnapshot> {
        (**self).fetch(day).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Upstream layer id for each forecast day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayLayers([u32; MAX_DAY as usize]);

impl Default for DayLayers {
    fn default() -> Self {
        Self([1, 2, 3])
    }
}

impl DayLayers {
    pub fn new(layers: [u32; MAX_DAY as usize]) -> Self {
        Self(layers)
    }

    /// Parse a comma-separated list such as `"1,2,3"`.
    pub fn parse(value: &str) -> HazardResult<Self> {
        let ids = value
            .split(',')
            .map(|part| {
                part.trim().parse::<u32>().map_err(|_| {
                    HazardError::invalid("HAZARD_DAY_LAYERS", format!("'{}' is not a layer id", part))
                })
            })
            .collect::<HazardResult<Vec<u32>>>()?;

        let layers: [u32; MAX_DAY as usize] = ids.try_into().map_err(|ids: Vec<u32>| {
            HazardError::invalid(
                "HAZARD_DAY_LAYERS",
                format!("expected {} layer ids, got {}", MAX_DAY, ids.len()),
            )
        })?;
        Ok(Self(layers))
    }

    /// Layer id for `day` (1-based).
    pub fn layer_for(&self, day: u8) -> HazardResult<u32> {
        validate_day(day)?;
        Ok(self.0[(day - 1) as usize])
    }
}
