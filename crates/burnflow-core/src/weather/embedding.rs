/// Deterministic 128-dim weather feature map.
///
/// Stands in for a remote embedding model: each meteorological field is
/// smeared over a bank of 16 radial-basis centers, so nearby conditions land
/// on nearby vectors and cosine similarity orders like-for-like weather above
/// dissimilar weather.
use crate::domain::vectors::{l2_normalize, WEATHER_VECTOR_DIMS};
use crate::domain::WeatherSample;

const CENTERS_PER_FIELD: usize = 16;

/// (value, low, high) normalized field ranges, in slot order.
fn field_ranges(sample: &WeatherSample) -> [(f64, f64, f64); 8] {
    [
        (sample.temperature_f, -20.0, 120.0),
        (sample.humidity_pct, 0.0, 100.0),
        (sample.wind_speed_mph, 0.0, 40.0),
        (sample.wind_direction_deg.to_radians().sin(), -1.0, 1.0),
        (sample.wind_direction_deg.to_radians().cos(), -1.0, 1.0),
        (sample.pressure_in_hg, 28.0, 31.5),
        (sample.cloud_cover_pct, 0.0, 100.0),
        (sample.precipitation_prob_pct, 0.0, 100.0),
    ]
}

pub fn weather_embedding(sample: &WeatherSample) -> Vec<f64> {
    let mut v = vec![0.0; WEATHER_VECTOR_DIMS];
    // One RBF bank per field; bandwidth of one center spacing.
    let bandwidth = 1.0 / CENTERS_PER_FIELD as f64;

    for (field_idx, (value, low, high)) in field_ranges(sample).into_iter().enumerate() {
        let t = ((value - low) / (high - low)).clamp(0.0, 1.0);
        for c in 0..CENTERS_PER_FIELD {
            let center = (c as f64 + 0.5) / CENTERS_PER_FIELD as f64;
            let d = (t - center) / bandwidth;
            v[field_idx * CENTERS_PER_FIELD + c] = (-0.5 * d * d).exp();
        }
    }

    l2_normalize(&mut v);
    v
}
