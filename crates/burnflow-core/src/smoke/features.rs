/// Plume feature vector construction.
///
/// 64 dims in fixed slots:
///
/// ```text
///  0     emission-rate magnitude (log-compressed)
///  1     total-emissions magnitude (log-compressed)
///  2-9   PM2.5 at the 8 grid distances, saturating at the daily threshold
///  10    max radius / 50 km
///  11    affected-area magnitude
///  12-17 stability-class one-hot
///  18    plume rise / cap
///  19    wind speed (m/s) / 20
///  20-27 temporal decay signature over hours 1-8
///  28-35 wind-direction harmonics sin/cos (k = 1..4)
///  36-43 sigma_y at the grid distances
///  44-51 sigma_z at the grid distances
///  52    burn duration / 8 h
///  53-55 fraction of grid samples over daily / unhealthy / hazardous
///  56-63 reserved (zero)
/// ```
///
/// The map is a pure function of its inputs: equal emissions and identical
/// wind produce identical vectors.
use crate::domain::vectors::{l2_normalize, PLUME_VECTOR_DIMS};
use crate::domain::{ConcentrationSample, StabilityClass};

pub struct PlumeFeatureInput<'a> {
    pub emission_rate_g_s: f64,
    pub total_emissions_kg: f64,
    pub duration_hours: f64,
    pub stability_class: StabilityClass,
    pub plume_rise_m: f64,
    pub wind_mps: f64,
    pub wind_direction_deg: f64,
    pub max_radius_m: f64,
    pub affected_area_km2: f64,
    pub field: &'a [ConcentrationSample],
}

pub fn plume_feature_vector(input: &PlumeFeatureInput<'_>) -> Vec<f64> {
    let mut v = vec![0.0; PLUME_VECTOR_DIMS];

    v[0] = (1.0 + input.emission_rate_g_s).ln() / (1.0_f64 + 10_000.0).ln();
    v[1] = (1.0 + input.total_emissions_kg).ln() / (1.0_f64 + 100_000.0).ln();

    for (i, sample) in input.field.iter().take(8).enumerate() {
        let c = sample.centerline_pm25_ug_m3;
        v[2 + i] = c / (c + 35.0);
        v[36 + i] = (sample.sigma_y / 2000.0).clamp(0.0, 1.0);
        v[44 + i] = (sample.sigma_z / 5000.0).clamp(0.0, 1.0);
    }

    v[10] = (input.max_radius_m / 50_000.0).clamp(0.0, 1.0);
    v[11] = input.affected_area_km2 / (input.affected_area_km2 + 100.0);

    v[12 + input.stability_class.index()] = 1.0;

    v[18] = (input.plume_rise_m / 300.0).clamp(0.0, 1.0);
    v[19] = (input.wind_mps / 20.0).clamp(0.0, 1.0);

    // Temporal decay: how much of the burn remains active t hours in.
    for t in 1..=8usize {
        v[19 + t] = (-(t as f64) / input.duration_hours.max(1.0)).exp();
    }

    let theta = input.wind_direction_deg.to_radians();
    for k in 1..=4usize {
        v[28 + (k - 1) * 2] = (k as f64 * theta).sin();
        v[29 + (k - 1) * 2] = (k as f64 * theta).cos();
    }

    v[52] = (input.duration_hours / 8.0).clamp(0.0, 1.0);

    let n = input.field.len().max(1) as f64;
    v[53] = input.field.iter().filter(|s| s.exceeds_daily).count() as f64 / n;
    v[54] = input.field.iter().filter(|s| s.exceeds_unhealthy).count() as f64 / n;
    v[55] = input.field.iter().filter(|s| s.exceeds_hazardous).count() as f64 / n;

    l2_normalize(&mut v);
    v
}
