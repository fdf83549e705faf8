/// Local weather providers and the console alert transport.
///
/// The real weather feed is an external collaborator; operators either point
/// the CLI at a JSON conditions file or fall back to a deterministic
/// climatology stand-in so runs are reproducible.
use async_trait::async_trait;
use burnflow_core::domain::{GeoPoint, WeatherReliability, WeatherSample};
use burnflow_core::ports::{AlertTransport, DeliveryResult, WeatherProvider};
use chrono::{Duration, Utc};
use colored::Colorize;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct ConditionsFile {
    pub temperature_f: f64,
    pub humidity_pct: f64,
    pub wind_speed_mph: f64,
    pub wind_direction_deg: f64,
    #[serde(default = "default_pressure")]
    pub pressure_in_hg: f64,
    pub cloud_cover_pct: f64,
    pub precipitation_prob_pct: f64,
    #[serde(default = "default_visibility")]
    pub visibility_mi: f64,
}

fn default_pressure() -> f64 {
    29.92
}

fn default_visibility() -> f64 {
    10.0
}

/// Serves one conditions record (read from a file) for every location.
pub struct FileWeatherProvider {
    conditions: ConditionsFile,
}

impl FileWeatherProvider {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let conditions: ConditionsFile = serde_json::from_str(&raw)?;
        Ok(Self { conditions })
    }

    fn sample(&self, location: GeoPoint) -> WeatherSample {
        WeatherSample {
            location,
            observation_time: Utc::now(),
            temperature_f: self.conditions.temperature_f,
            humidity_pct: self.conditions.humidity_pct,
            wind_speed_mph: self.conditions.wind_speed_mph,
            wind_direction_deg: self.conditions.wind_direction_deg,
            pressure_in_hg: self.conditions.pressure_in_hg,
            cloud_cover_pct: self.conditions.cloud_cover_pct,
            precipitation_prob_pct: self.conditions.precipitation_prob_pct,
            visibility_mi: self.conditions.visibility_mi,
            reliability: WeatherReliability::Normal,
        }
    }
}

#[async_trait]
impl WeatherProvider for FileWeatherProvider {
    async fn current(&self, location: GeoPoint) -> anyhow::Result<WeatherSample> {
        Ok(self.sample(location))
    }

    async fn forecast(
        &self,
        location: GeoPoint,
        horizon_hours: u32,
    ) -> anyhow::Result<Vec<WeatherSample>> {
        let base = self.sample(location);
        Ok((0..(horizon_hours / 3).max(1))
            .map(|i| {
                let mut s = base.clone();
                s.observation_time = base.observation_time + Duration::hours(3 * i64::from(i));
                s
            })
            .collect())
    }
}

/// Deterministic climatology: conditions derived from the location grid
/// cell, so repeated runs agree without any network access.
pub struct ClimatologyProvider;

impl ClimatologyProvider {
    fn sample(location: GeoPoint) -> WeatherSample {
        let (lat_key, lon_key) = location.rounded_key();
        let mut hash = (lat_key as u64).wrapping_mul(0x9E3779B97F4A7C15);
        hash ^= (lon_key as u64).wrapping_mul(0xC2B2AE3D27D4EB4F);
        hash ^= hash >> 29;

        let unit = |h: u64| (h % 1000) as f64 / 1000.0;
        WeatherSample {
            location,
            observation_time: Utc::now(),
            temperature_f: 55.0 + unit(hash) * 35.0,
            humidity_pct: 30.0 + unit(hash >> 10) * 40.0,
            wind_speed_mph: 3.0 + unit(hash >> 20) * 9.0,
            wind_direction_deg: unit(hash >> 30) * 360.0,
            pressure_in_hg: 29.6 + unit(hash >> 40) * 0.7,
            cloud_cover_pct: unit(hash >> 50) * 60.0,
            precipitation_prob_pct: unit(hash >> 54) * 15.0,
            visibility_mi: 10.0,
            reliability: WeatherReliability::Normal,
        }
    }
}

#[async_trait]
impl WeatherProvider for ClimatologyProvider {
    async fn current(&self, location: GeoPoint) -> anyhow::Result<WeatherSample> {
        Ok(Self::sample(location))
    }

    async fn forecast(
        &self,
        location: GeoPoint,
        horizon_hours: u32,
    ) -> anyhow::Result<Vec<WeatherSample>> {
        let base = Self::sample(location);
        Ok((0..(horizon_hours / 3).max(1))
            .map(|i| {
                let mut s = base.clone();
                s.observation_time = base.observation_time + Duration::hours(3 * i64::from(i));
                s
            })
            .collect())
    }
}

/// Prints alerts to the console instead of paging anyone.
pub struct ConsoleTransport;

#[async_trait]
impl AlertTransport for ConsoleTransport {
    async fn send(
        &self,
        channel: burnflow_core::domain::AlertChannel,
        recipient_id: u64,
        payload: &str,
    ) -> anyhow::Result<DeliveryResult> {
        println!(
            "  {} [{}] recipient {}: {}",
            "alert".yellow().bold(),
            channel.as_str(),
            recipient_id,
            payload
        );
        Ok(DeliveryResult {
            accepted: true,
            provider_message_id: None,
        })
    }
}
