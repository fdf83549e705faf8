/// Deterministic fakes for tests and downstream crates. Everything here is
/// seeded or scripted; no fake ever consults a wall clock for its payloads.
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::domain::{
    cosine_similarity, BurnHistory, GeoPoint, VectorKind, WeatherReliability, WeatherSample,
};
use crate::ports::{
    AlertTransport, DeliveryResult, Relational, ScheduleRecord, VectorMatch, VectorStore,
    WeatherProvider,
};

/// Scripted weather provider: one template sample served everywhere, with
/// per-key failure injection and lightly jittered (but seeded) forecasts.
pub struct ScriptedWeatherProvider {
    template: WeatherSample,
    fail_for: Mutex<HashSet<(i64, i64)>>,
    forecast_jitter_seed: u64,
}

impl ScriptedWeatherProvider {
    pub fn new(template: WeatherSample) -> Self {
        Self {
            template,
            fail_for: Mutex::new(HashSet::new()),
            forecast_jitter_seed: 0,
        }
    }

    /// Make every call for this location fail, like a provider outage
    /// scoped to one grid cell.
    pub fn fail_at(&self, location: GeoPoint) {
        self.fail_for
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(location.rounded_key());
    }

    fn is_failing(&self, location: GeoPoint) -> bool {
        self.fail_for
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&location.rounded_key())
    }

    pub fn good_sample(location: GeoPoint) -> WeatherSample {
        WeatherSample {
            location,
            observation_time: Utc.with_ymd_and_hms(2025, 9, 15, 6, 0, 0).unwrap(),
            temperature_f: 72.0,
            humidity_pct: 45.0,
            wind_speed_mph: 7.0,
            wind_direction_deg: 270.0,
            pressure_in_hg: 29.92,
            cloud_cover_pct: 10.0,
            precipitation_prob_pct: 0.0,
            visibility_mi: 10.0,
            reliability: WeatherReliability::Normal,
        }
    }
}

#[async_trait]
impl WeatherProvider for ScriptedWeatherProvider {
    async fn current(&self, location: GeoPoint) -> anyhow::Result<WeatherSample> {
        if self.is_failing(location) {
            anyhow::bail!("scripted outage at ({}, {})", location.lat, location.lon);
        }
        let mut sample = self.template.clone();
        sample.location = location;
        Ok(sample)
    }

    async fn forecast(
        &self,
        location: GeoPoint,
        horizon_hours: u32,
    ) -> anyhow::Result<Vec<WeatherSample>> {
        if self.is_failing(location) {
            anyhow::bail!("scripted outage at ({}, {})", location.lat, location.lon);
        }
        let mut rng = StdRng::seed_from_u64(self.forecast_jitter_seed);
        let jitter = Normal::new(0.0, 0.5).expect("valid normal");
        let slots = (horizon_hours / 3).max(1);
        let start = self.template.observation_time;
        Ok((0..slots)
            .map(|i| {
                let mut sample = self.template.clone();
                sample.location = location;
                sample.observation_time = start + Duration::hours(3 * i64::from(i));
                sample.wind_speed_mph =
                    (sample.wind_speed_mph + jitter.sample(&mut rng)).max(0.0);
                sample
            })
            .collect())
    }
}

/// In-memory vector store with brute-force cosine search.
#[derive(Default)]
pub struct InMemoryVectorStore {
    rows: Mutex<HashMap<(&'static str, u64), Vec<f64>>>,
}

impl InMemoryVectorStore {
    pub fn len(&self, kind: VectorKind) -> usize {
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .filter(|(k, _)| *k == kind.as_str())
            .count()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, kind: VectorKind, id: u64, vector: &[f64]) -> anyhow::Result<()> {
        anyhow::ensure!(
            vector.len() == kind.dims(),
            "expected {} dims, got {}",
            kind.dims(),
            vector.len()
        );
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((kind.as_str(), id), vector.to_vec());
        Ok(())
    }

    async fn search(
        &self,
        kind: VectorKind,
        vector: &[f64],
        k: usize,
        min_sim: f64,
    ) -> anyhow::Result<Vec<VectorMatch>> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let mut matches: Vec<VectorMatch> = rows
            .iter()
            .filter(|((row_kind, _), _)| *row_kind == kind.as_str())
            .map(|((_, id), row)| VectorMatch {
                id: *id,
                similarity: cosine_similarity(vector, row),
            })
            .filter(|m| m.similarity >= min_sim)
            .collect();
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        matches.truncate(k);
        Ok(matches)
    }
}

/// In-memory relational adapter: schedules by id, burn history by farm.
#[derive(Default)]
pub struct InMemoryRelational {
    schedules: Mutex<HashMap<String, ScheduleRecord>>,
    history: Mutex<HashMap<u64, BurnHistory>>,
}

impl InMemoryRelational {
    pub fn set_history(&self, farm_id: u64, history: BurnHistory) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(farm_id, history);
    }

    pub fn schedule_count(&self) -> usize {
        self.schedules.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Relational for InMemoryRelational {
    async fn insert_schedule(&self, record: &ScheduleRecord) -> anyhow::Result<()> {
        self.schedules
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.schedule_id.clone(), record.clone());
        Ok(())
    }

    async fn get_schedule(&self, schedule_id: &str) -> anyhow::Result<Option<ScheduleRecord>> {
        Ok(self
            .schedules
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(schedule_id)
            .cloned())
    }

    async fn burn_history(&self, farm_id: u64) -> anyhow::Result<Option<BurnHistory>> {
        Ok(self
            .history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&farm_id)
            .copied())
    }
}

/// Transport that accepts everything and remembers what it sent.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(crate::domain::AlertChannel, u64, String)>>,
}

impl RecordingTransport {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl AlertTransport for RecordingTransport {
    async fn send(
        &self,
        channel: crate::domain::AlertChannel,
        recipient_id: u64,
        payload: &str,
    ) -> anyhow::Result<DeliveryResult> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((channel, recipient_id, payload.to_string()));
        Ok(DeliveryResult {
            accepted: true,
            provider_message_id: None,
        })
    }
}

/// Deterministic token-hash embedder standing in for a remote model.
pub struct HashingEmbedder;

#[async_trait]
impl crate::ports::Embedder for HashingEmbedder {
    async fn embed(&self, text: &str, dims: usize) -> anyhow::Result<Vec<f64>> {
        anyhow::ensure!(dims == 64 || dims == 128, "unsupported dims {dims}");
        let mut v = vec![0.0; dims];
        for token in text.split_whitespace() {
            let mut hash: u64 = 1469598103934665603;
            for b in token.bytes() {
                hash ^= u64::from(b);
                hash = hash.wrapping_mul(1099511628211);
            }
            v[(hash % dims as u64) as usize] += 1.0;
        }
        crate::domain::l2_normalize(&mut v);
        Ok(v)
    }
}

/// A timestamp helper for tests that need a fixed "now".
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 14, 12, 0, 0).unwrap()
}
