use std::sync::Arc;
use std::time::Duration;

use crate::domain::{GeoPoint, PipelineError, WeatherAnalysis, WeatherSample};
use crate::ports::WeatherProvider;
use crate::resilience::CircuitBreaker;

use super::cache::WeatherCache;
use super::suitability::suitability_score;
use super::windows::extract_burn_windows;

/// Upstream weather call budget.
pub const WEATHER_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Forecast horizon used for burn-window extraction.
pub const FORECAST_HORIZON_HOURS: u32 = 24;

/// Weather Analyzer service. Owns the process-wide cache and the circuit
/// breaker guarding the provider; the analyzer itself holds no per-batch
/// state.
pub struct WeatherAnalyzer {
    provider: Arc<dyn WeatherProvider>,
    cache: WeatherCache,
    breaker: CircuitBreaker,
    call_timeout: Duration,
}

impl WeatherAnalyzer {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self {
            provider,
            cache: WeatherCache::default(),
            breaker: CircuitBreaker::default(),
            call_timeout: WEATHER_CALL_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_timeout(provider: Arc<dyn WeatherProvider>, call_timeout: Duration) -> Self {
        Self {
            provider,
            cache: WeatherCache::default(),
            breaker: CircuitBreaker::default(),
            call_timeout,
        }
    }

    /// Analyze one location: current sample, 3-hourly forecast, suitability,
    /// acceptable burn windows.
    ///
    /// Fails `ExternalUnavailable` only when neither the provider nor a
    /// cached fallback can produce a current sample. A forecast failure
    /// degrades to an empty window list.
    pub async fn analyze(&self, location: GeoPoint) -> Result<WeatherAnalysis, PipelineError> {
        let current = self
            .cache
            .get_or_fetch(location, || self.guarded_current(location))
            .await?;

        let forecast = match self.guarded_forecast(location).await {
            Ok(forecast) => forecast,
            Err(err) => {
                tracing::warn!(
                    lat = location.lat,
                    lon = location.lon,
                    error = %err,
                    "forecast unavailable, continuing without burn windows"
                );
                Vec::new()
            }
        };

        let suitability = suitability_score(&current);
        let burn_windows = extract_burn_windows(&forecast);
        let embedding = super::embedding::weather_embedding(&current);

        Ok(WeatherAnalysis {
            current,
            forecast,
            suitability,
            burn_windows,
            embedding,
        })
    }

    async fn guarded_current(&self, location: GeoPoint) -> anyhow::Result<WeatherSample> {
        if !self.breaker.try_acquire() {
            anyhow::bail!("weather circuit open");
        }
        match tokio::time::timeout(self.call_timeout, self.provider.current(location)).await {
            Ok(Ok(sample)) => {
                self.breaker.record_success();
                Ok(sample)
            }
            Ok(Err(err)) => {
                self.breaker.record_failure();
                Err(err)
            }
            Err(_) => {
                self.breaker.record_failure();
                anyhow::bail!("weather call timed out after {:?}", self.call_timeout)
            }
        }
    }

    async fn guarded_forecast(&self, location: GeoPoint) -> anyhow::Result<Vec<WeatherSample>> {
        if !self.breaker.try_acquire() {
            anyhow::bail!("weather circuit open");
        }
        match tokio::time::timeout(
            self.call_timeout,
            self.provider.forecast(location, FORECAST_HORIZON_HOURS),
        )
        .await
        {
            Ok(Ok(forecast)) => {
                self.breaker.record_success();
                Ok(forecast)
            }
            Ok(Err(err)) => {
                self.breaker.record_failure();
                Err(err)
            }
            Err(_) => {
                self.breaker.record_failure();
                anyhow::bail!("forecast call timed out after {:?}", self.call_timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WeatherReliability;
    use crate::ports::weather_provider::MockWeatherProvider;
    use chrono::Utc;

    fn sample(location: GeoPoint, wind: f64) -> WeatherSample {
        WeatherSample {
            location,
            observation_time: Utc::now(),
            temperature_f: 72.0,
            humidity_pct: 45.0,
            wind_speed_mph: wind,
            wind_direction_deg: 270.0,
            pressure_in_hg: 29.92,
            cloud_cover_pct: 10.0,
            precipitation_prob_pct: 0.0,
            visibility_mi: 10.0,
            reliability: WeatherReliability::Normal,
        }
    }

    #[tokio::test]
    async fn test_analyze_good_weather() {
        let location = GeoPoint::new(38.5, -121.5);
        let mut provider = MockWeatherProvider::new();
        provider
            .expect_current()
            .returning(move |loc| Ok(sample(loc, 7.0)));
        provider.expect_forecast().returning(move |loc, _| {
            Ok((0..8).map(|_| sample(loc, 7.0)).collect())
        });

        let analyzer = WeatherAnalyzer::new(Arc::new(provider));
        let analysis = analyzer.analyze(location).await.unwrap();

        assert!((analysis.suitability - 1.0).abs() < 1e-12);
        assert_eq!(analysis.forecast.len(), 8);
        assert!(!analysis.burn_windows.is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_without_fallback_fails() {
        let mut provider = MockWeatherProvider::new();
        provider
            .expect_current()
            .returning(|_| Err(anyhow::anyhow!("upstream 503")));
        provider.expect_forecast().returning(|_, _| Ok(vec![]));

        let analyzer = WeatherAnalyzer::new(Arc::new(provider));
        let err = analyzer
            .analyze(GeoPoint::new(38.5, -121.5))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ExternalUnavailable(_)));
    }

    #[tokio::test]
    async fn test_forecast_failure_degrades_to_no_windows() {
        let location = GeoPoint::new(38.5, -121.5);
        let mut provider = MockWeatherProvider::new();
        provider
            .expect_current()
            .returning(move |loc| Ok(sample(loc, 7.0)));
        provider
            .expect_forecast()
            .returning(|_, _| Err(anyhow::anyhow!("upstream 503")));

        let analyzer = WeatherAnalyzer::new(Arc::new(provider));
        let analysis = analyzer.analyze(location).await.unwrap();
        assert!(analysis.burn_windows.is_empty());
        assert!(analysis.forecast.is_empty());
    }

    struct SlowProvider;

    #[async_trait::async_trait]
    impl WeatherProvider for SlowProvider {
        async fn current(&self, location: GeoPoint) -> anyhow::Result<WeatherSample> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(sample(location, 7.0))
        }

        async fn forecast(
            &self,
            _location: GeoPoint,
            _horizon_hours: u32,
        ) -> anyhow::Result<Vec<WeatherSample>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let analyzer = WeatherAnalyzer::with_timeout(Arc::new(SlowProvider), Duration::from_millis(10));
        let err = analyzer
            .analyze(GeoPoint::new(38.5, -121.5))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ExternalUnavailable(_)));
    }
}
