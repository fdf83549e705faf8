/// Burn suitability scoring.
///
/// The score starts at 0.5 and moves additively on wind, humidity, and
/// precipitation probability, clamped to [0, 1]:
///
/// ```text
/// wind 2-15 mph      +0.2    wind < 1 or > 20    -0.3
/// humidity 30-70 %   +0.2    humidity < 20 / > 80 -0.2
/// precip < 20 %      +0.1    precip > 50 %        -0.3
/// ```
use crate::domain::{SuitabilityScore, WeatherSample};

pub fn suitability_score(sample: &WeatherSample) -> SuitabilityScore {
    let mut score: f64 = 0.5;

    let wind = sample.wind_speed_mph;
    if (2.0..=15.0).contains(&wind) {
        score += 0.2;
    } else if wind < 1.0 || wind > 20.0 {
        score -= 0.3;
    }

    let humidity = sample.humidity_pct;
    if (30.0..=70.0).contains(&humidity) {
        score += 0.2;
    } else if humidity > 80.0 || humidity < 20.0 {
        score -= 0.2;
    }

    let precip = sample.precipitation_prob_pct;
    if precip < 20.0 {
        score += 0.1;
    } else if precip > 50.0 {
        score -= 0.3;
    }

    score.clamp(0.0, 1.0)
}

/// Whether a single forecast slot meets all three burn-window thresholds.
pub fn slot_is_suitable(sample: &WeatherSample) -> bool {
    (2.0..=15.0).contains(&sample.wind_speed_mph)
        && (30.0..=70.0).contains(&sample.humidity_pct)
        && sample.precipitation_prob_pct < 20.0
}
