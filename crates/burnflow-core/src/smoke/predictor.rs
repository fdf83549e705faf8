use crate::domain::{
    ConcentrationSample, PipelineError, Prediction, StabilityClass, ValidatedRequest,
    WeatherReliability, WeatherSample,
};

use super::dispersion::{
    centerline_concentration, plume_rise, sigma_y, sigma_z, MPH_TO_MPS,
};
use super::emissions::emission_profile;
use super::features::{plume_feature_vector, PlumeFeatureInput};
use super::stability::classify_stability;

/// EPA PM2.5 thresholds, ug/m3.
pub const EPA_ANNUAL: f64 = 12.0;
pub const EPA_DAILY: f64 = 35.0;
pub const EPA_UNHEALTHY: f64 = 55.0;
pub const EPA_HAZARDOUS: f64 = 250.0;

/// Downwind centerline sampling grid, meters.
pub const SAMPLE_GRID_M: [f64; 8] = [50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0, 10_000.0];

/// Outer bound for the max-radius search.
const MAX_RADIUS_SEARCH_M: f64 = 50_000.0;

/// Produce a Prediction for one validated request under one weather sample.
///
/// Failure semantics: invalid acreage is fatal for the request
/// (`InvalidInput`); a non-finite value anywhere in the physics is an
/// `InternalInvariant` and the prediction is dropped.
pub fn predict(
    validated: &ValidatedRequest,
    weather: &WeatherSample,
) -> Result<Prediction, PipelineError> {
    let request = &validated.request;
    let profile = emission_profile(request.acres, request.crop_type).map_err(|reason| {
        PipelineError::InvalidInput {
            request_id: request.id,
            reason,
        }
    })?;

    // Insolation is judged at the midpoint of the requested window.
    let midpoint_min = (request.time_window.start_min + request.time_window.end_min) / 2;
    let hour_of_day = midpoint_min / 60;

    let class = classify_stability(
        weather.wind_speed_mph,
        weather.cloud_cover_pct,
        hour_of_day,
    );

    let wind_mps = weather.wind_speed_mph.max(0.0) * MPH_TO_MPS;
    let fuel_burn_rate_kg_s = profile.total_fuel_kg / (profile.duration_hours * 3600.0);
    let rise_m = plume_rise(fuel_burn_rate_kg_s, wind_mps);

    let field = sample_field(profile.emission_rate_g_s, wind_mps, rise_m, class)?;

    let max_radius_m = max_radius(profile.emission_rate_g_s, wind_mps, rise_m, class);
    let affected_area_km2 = affected_area(max_radius_m, class);

    let plume_vector = plume_feature_vector(&PlumeFeatureInput {
        emission_rate_g_s: profile.emission_rate_g_s,
        total_emissions_kg: profile.total_emissions_kg,
        duration_hours: profile.duration_hours,
        stability_class: class,
        plume_rise_m: rise_m,
        wind_mps,
        wind_direction_deg: weather.wind_direction_deg,
        max_radius_m,
        affected_area_km2,
        field: &field,
    });
    if plume_vector.iter().any(|x| !x.is_finite()) {
        return Err(PipelineError::InternalInvariant(format!(
            "plume vector for request {} contains non-finite values",
            request.id
        )));
    }

    let confidence = confidence(weather.reliability, field.len(), &field);

    Ok(Prediction {
        burn_request_id: request.id,
        emission_rate: profile.emission_rate_g_s,
        total_emissions: profile.total_emissions_kg,
        burn_duration_hours: profile.duration_hours,
        stability_class: class,
        concentration_field: field,
        max_radius_m,
        affected_area_km2,
        plume_vector,
        conflicts: Vec::new(),
        confidence,
        low_confidence: validated.low_confidence,
    })
}

fn sample_field(
    q_g_s: f64,
    wind_mps: f64,
    rise_m: f64,
    class: StabilityClass,
) -> Result<Vec<ConcentrationSample>, PipelineError> {
    let mut field = Vec::with_capacity(SAMPLE_GRID_M.len());
    for distance_m in SAMPLE_GRID_M {
        let sy = sigma_y(class, distance_m);
        let sz = sigma_z(class, distance_m);
        let c = centerline_concentration(q_g_s, wind_mps, rise_m, sy, sz);
        if !c.is_finite() || !sy.is_finite() || !sz.is_finite() {
            return Err(PipelineError::InternalInvariant(format!(
                "non-finite concentration at {distance_m} m"
            )));
        }
        field.push(ConcentrationSample {
            distance_m,
            centerline_pm25_ug_m3: c,
            sigma_y: sy,
            sigma_z: sz,
            exceeds_daily: c > EPA_DAILY,
            exceeds_unhealthy: c > EPA_UNHEALTHY,
            exceeds_hazardous: c > EPA_HAZARDOUS,
        });
    }
    Ok(field)
}

/// Centerline concentration at an arbitrary distance, for conflict checks.
pub fn concentration_at(prediction_rate_g_s: f64, wind_mps: f64, rise_m: f64, class: StabilityClass, distance_m: f64) -> f64 {
    let sy = sigma_y(class, distance_m);
    let sz = sigma_z(class, distance_m);
    centerline_concentration(prediction_rate_g_s, wind_mps, rise_m, sy, sz)
}

/// Largest downwind distance where the centerline exceeds the EPA annual
/// threshold. Scans a log grid then bisects the crossing.
fn max_radius(q_g_s: f64, wind_mps: f64, rise_m: f64, class: StabilityClass) -> f64 {
    let c_at = |x: f64| concentration_at(q_g_s, wind_mps, rise_m, class, x);

    const POINTS: usize = 64;
    let log_min = 50.0_f64.ln();
    let log_max = MAX_RADIUS_SEARCH_M.ln();
    let mut last_above: Option<f64> = None;
    let mut next_below: Option<f64> = None;

    for i in 0..POINTS {
        let x = (log_min + (log_max - log_min) * i as f64 / (POINTS - 1) as f64).exp();
        if c_at(x) > EPA_ANNUAL {
            last_above = Some(x);
            next_below = None;
        } else if last_above.is_some() && next_below.is_none() {
            next_below = Some(x);
        }
    }

    let Some(mut lo) = last_above else {
        return 0.0;
    };
    let Some(mut hi) = next_below else {
        // Still above threshold at the search bound.
        return MAX_RADIUS_SEARCH_M;
    };
    for _ in 0..48 {
        let mid = 0.5 * (lo + hi);
        if c_at(mid) > EPA_ANNUAL {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Plume footprint approximated as an ellipse with semi-axes
/// (r, r * sigma_y(r) / sigma_z(r)), oriented to the wind. Orientation does
/// not change the area, so only the magnitude is reported.
fn affected_area(max_radius_m: f64, class: StabilityClass) -> f64 {
    if max_radius_m <= 0.0 {
        return 0.0;
    }
    let ratio = sigma_y(class, max_radius_m) / sigma_z(class, max_radius_m);
    let a_km = max_radius_m / 1000.0;
    let b_km = a_km * ratio;
    std::f64::consts::PI * a_km * b_km
}

/// Confidence from weather reliability, grid coverage, and the dynamic
/// range of vertical dispersion across the grid.
fn confidence(
    reliability: WeatherReliability,
    sample_count: usize,
    field: &[ConcentrationSample],
) -> f64 {
    let base = match reliability {
        WeatherReliability::Normal => 0.9,
        WeatherReliability::Low => 0.6,
    };
    let coverage = (sample_count as f64 / SAMPLE_GRID_M.len() as f64).min(1.0);

    let (sz_min, sz_max) = field.iter().fold((f64::MAX, 0.0_f64), |(lo, hi), s| {
        (lo.min(s.sigma_z), hi.max(s.sigma_z))
    });
    let range = if sz_min > 0.0 && sz_min.is_finite() {
        ((sz_max / sz_min).log10() / 2.0).clamp(0.0, 1.0)
    } else {
        0.0
    };

    (base * (0.5 + 0.5 * coverage) * (0.7 + 0.3 * range)).clamp(0.0, 1.0)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BurnRequest, CropType, FieldBoundary, GeoPoint, TimeWindow,
    };
    use chrono::{NaiveDate, Utc};

    fn validated(acres: f64, crop: CropType) -> ValidatedRequest {
        let request = BurnRequest {
            id: 1,
            farm_id: 1,
            field_boundary: FieldBoundary {
                points: vec![
                    GeoPoint::new(38.50, -121.50),
                    GeoPoint::new(38.51, -121.50),
                    GeoPoint::new(38.51, -121.49),
                    GeoPoint::new(38.50, -121.50),
                ],
            },
            acres,
            crop_type: crop,
            burn_date: NaiveDate::from_ymd_opt(2025, 9, 15).unwrap(),
            time_window: TimeWindow::new(9 * 60, 13 * 60),
            priority_hint: None,
        };
        ValidatedRequest {
            centroid: request.field_boundary.centroid().unwrap(),
            request,
            priority: 50,
            feature_vector: vec![0.0; 32],
            low_confidence: false,
        }
    }

    fn weather(wind_mph: f64) -> WeatherSample {
        WeatherSample {
            location: GeoPoint::new(38.5, -121.5),
            observation_time: Utc::now(),
            temperature_f: 72.0,
            humidity_pct: 45.0,
            wind_speed_mph: wind_mph,
            wind_direction_deg: 270.0,
            pressure_in_hg: 29.92,
            cloud_cover_pct: 10.0,
            precipitation_prob_pct: 0.0,
            visibility_mi: 10.0,
            reliability: WeatherReliability::Normal,
        }
    }

    #[test]
    fn test_predict_produces_finite_monotone_tail() {
        let prediction = predict(&validated(100.0, CropType::Wheat), &weather(7.0)).unwrap();
        assert_eq!(prediction.concentration_field.len(), 8);
        assert!(prediction
            .concentration_field
            .iter()
            .all(|s| s.centerline_pm25_ug_m3.is_finite()));

        // Non-increasing beyond the peak.
        let values: Vec<f64> = prediction
            .concentration_field
            .iter()
            .map(|s| s.centerline_pm25_ug_m3)
            .collect();
        let peak = values
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        for pair in values[peak..].windows(2) {
            assert!(pair[0] >= pair[1] - 1e-9);
        }
    }

    #[test]
    fn test_predict_zero_acres_is_invalid_input() {
        let err = predict(&validated(0.0, CropType::Wheat), &weather(7.0)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput { .. }));
    }

    #[test]
    fn test_zero_wind_yields_no_nan() {
        let prediction = predict(&validated(100.0, CropType::Rice), &weather(0.0)).unwrap();
        assert_eq!(prediction.stability_class, StabilityClass::D);
        assert!(prediction
            .concentration_field
            .iter()
            .all(|s| s.centerline_pm25_ug_m3.is_finite()));
        assert!(prediction.plume_vector.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_determinism() {
        let v = validated(250.0, CropType::Rice);
        let w = weather(3.0);
        let a = predict(&v, &w).unwrap();
        let b = predict(&v, &w).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_poor_dispersion_reaches_farther() {
        // Light wind, large rice burn: higher concentrations, larger radius
        // than a brisk-wind burn of the same field.
        let calm = predict(&validated(300.0, CropType::Rice), &weather(3.0)).unwrap();
        let breezy = predict(&validated(300.0, CropType::Rice), &weather(14.0)).unwrap();
        assert!(calm.max_radius_m > breezy.max_radius_m);
        assert!(calm.max_radius_m > 1000.0, "got {}", calm.max_radius_m);
    }

    #[test]
    fn test_affected_area_positive_when_radius_positive() {
        let prediction = predict(&validated(300.0, CropType::Rice), &weather(3.0)).unwrap();
        assert!(prediction.max_radius_m > 0.0);
        assert!(prediction.affected_area_km2 > 0.0);
    }

    #[test]
    fn test_plume_vector_unit_norm() {
        let prediction = predict(&validated(100.0, CropType::Wheat), &weather(7.0)).unwrap();
        let norm: f64 = prediction.plume_vector.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_degrades_with_low_reliability_weather() {
        let v = validated(100.0, CropType::Wheat);
        let normal = predict(&v, &weather(7.0)).unwrap();
        let mut stale = weather(7.0);
        stale.reliability = WeatherReliability::Low;
        let degraded = predict(&v, &stale).unwrap();
        assert!(degraded.confidence < normal.confidence);
    }
}
