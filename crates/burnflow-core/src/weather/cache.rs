/// Process-wide weather cache.
///
/// Entries are keyed by (lat, lon) rounded to 3 decimals with a 10-minute
/// TTL. Population is single-flight: N concurrent requests for the same key
/// trigger one upstream call. Expired entries are retained so a provider
/// failure can fall back to the last successful sample, marked low
/// reliability.
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;

use crate::domain::{GeoPoint, PipelineError, WeatherReliability, WeatherSample};

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

struct Entry {
    sample: WeatherSample,
    fetched_at: Instant,
}

pub struct WeatherCache {
    ttl: Duration,
    entries: Mutex<HashMap<(i64, i64), Entry>>,
    /// Per-key fetch lock; holders of a key's lock are the only ones allowed
    /// to call upstream for it.
    in_flight: Mutex<HashMap<(i64, i64), Arc<AsyncMutex<()>>>>,
}

impl Default for WeatherCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl WeatherCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn fresh(&self, key: (i64, i64)) -> Option<WeatherSample> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&key)
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .map(|e| e.sample.clone())
    }

    fn stale(&self, key: (i64, i64)) -> Option<WeatherSample> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(&key).map(|e| e.sample.clone())
    }

    fn store(&self, key: (i64, i64), sample: WeatherSample) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            Entry {
                sample,
                fetched_at: Instant::now(),
            },
        );
    }

    fn fetch_lock(&self, key: (i64, i64)) -> Arc<AsyncMutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.entry(key).or_default().clone()
    }

    /// Return the cached sample for `location`, or populate the cache with a
    /// single upstream call shared by all concurrent requesters of the key.
    ///
    /// On upstream failure the last successful sample (if any) is returned
    /// with `reliability = Low`; with no fallback the call fails
    /// `ExternalUnavailable`.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        location: GeoPoint,
        fetch: F,
    ) -> Result<WeatherSample, PipelineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<WeatherSample>>,
    {
        let key = location.rounded_key();

        if let Some(sample) = self.fresh(key) {
            return Ok(sample);
        }

        let lock = self.fetch_lock(key);
        let _guard = lock.lock().await;

        // A concurrent holder may have populated the key while we waited.
        if let Some(sample) = self.fresh(key) {
            return Ok(sample);
        }

        match fetch().await {
            Ok(sample) => {
                self.store(key, sample.clone());
                Ok(sample)
            }
            Err(err) => {
                tracing::warn!(lat = location.lat, lon = location.lon, error = %err, "weather fetch failed");
                match self.stale(key) {
                    Some(mut sample) => {
                        sample.reliability = WeatherReliability::Low;
                        Ok(sample)
                    }
                    None => Err(PipelineError::ExternalUnavailable(format!(
                        "weather provider failed for ({:.3}, {:.3}): {err}",
                        location.lat, location.lon
                    ))),
                }
            }
        }
    }
}
