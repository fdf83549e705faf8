use crate::domain::{GeoPoint, WeatherSample};
use async_trait::async_trait;

/// External meteorology source. Production wiring injects a real adapter;
/// tests inject deterministic fakes.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current conditions at a location.
    async fn current(&self, location: GeoPoint) -> anyhow::Result<WeatherSample>;

    /// 3-hourly forecast covering `horizon_hours` from now.
    async fn forecast(
        &self,
        location: GeoPoint,
        horizon_hours: u32,
    ) -> anyhow::Result<Vec<WeatherSample>>;
}
