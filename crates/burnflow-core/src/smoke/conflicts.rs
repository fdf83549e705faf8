/// Pairwise conflict detection between same-day burns.
///
/// Spatial: the two plumes' max-radius circles (centered on field centroids)
/// overlap. Severity grows with overlap depth and jumps to high when either
/// centerline puts more than the EPA daily threshold on the other centroid.
/// Temporal: the requested time windows intersect. Conflicts are symmetric;
/// both predictions receive the edge.
use std::collections::BTreeMap;

use crate::domain::{
    Conflict, ConflictKind, ConflictSeverity, Prediction, ValidatedRequest,
};

use super::predictor::EPA_DAILY;

/// Overlap depth thresholds, meters.
const LOW_OVERLAP_M: f64 = 1000.0;
const HIGH_OVERLAP_M: f64 = 3000.0;

/// Temporal severity thresholds on window overlap, minutes.
const TEMPORAL_MEDIUM_MIN: u32 = 120;
const TEMPORAL_HIGH_MIN: u32 = 240;

/// Annotate `predictions` with the symmetric pairwise conflict set.
pub fn annotate_conflicts(
    requests: &[ValidatedRequest],
    predictions: &mut BTreeMap<u64, Prediction>,
) {
    let by_id: BTreeMap<u64, &ValidatedRequest> =
        requests.iter().map(|r| (r.request.id, r)).collect();

    let ids: Vec<u64> = predictions.keys().copied().collect();
    let mut edges: Vec<(u64, u64, Conflict, Conflict)> = Vec::new();

    for (i, &id_a) in ids.iter().enumerate() {
        for &id_b in &ids[i + 1..] {
            let (Some(req_a), Some(req_b)) = (by_id.get(&id_a), by_id.get(&id_b)) else {
                continue;
            };
            let pred_a = &predictions[&id_a];
            let pred_b = &predictions[&id_b];

            if let Some(severity) = spatial_severity(req_a, pred_a, req_b, pred_b) {
                edges.push((
                    id_a,
                    id_b,
                    Conflict {
                        other_burn_request_id: id_b,
                        kind: ConflictKind::Spatial,
                        severity,
                    },
                    Conflict {
                        other_burn_request_id: id_a,
                        kind: ConflictKind::Spatial,
                        severity,
                    },
                ));
            }

            if let Some(severity) = temporal_severity(req_a, req_b) {
                edges.push((
                    id_a,
                    id_b,
                    Conflict {
                        other_burn_request_id: id_b,
                        kind: ConflictKind::Temporal,
                        severity,
                    },
                    Conflict {
                        other_burn_request_id: id_a,
                        kind: ConflictKind::Temporal,
                        severity,
                    },
                ));
            }
        }
    }

    for (id_a, id_b, conflict_for_a, conflict_for_b) in edges {
        if let Some(p) = predictions.get_mut(&id_a) {
            p.conflicts.push(conflict_for_a);
        }
        if let Some(p) = predictions.get_mut(&id_b) {
            p.conflicts.push(conflict_for_b);
        }
    }
}

fn spatial_severity(
    req_a: &ValidatedRequest,
    pred_a: &Prediction,
    req_b: &ValidatedRequest,
    pred_b: &Prediction,
) -> Option<ConflictSeverity> {
    let distance = req_a.centroid.distance_m(&req_b.centroid);
    let overlap = pred_a.max_radius_m + pred_b.max_radius_m - distance;
    if overlap <= 0.0 {
        return None;
    }

    let cross_centerline = centerline_at(pred_a, distance) > EPA_DAILY
        || centerline_at(pred_b, distance) > EPA_DAILY;

    let severity = if overlap > HIGH_OVERLAP_M || cross_centerline {
        ConflictSeverity::High
    } else if overlap >= LOW_OVERLAP_M {
        ConflictSeverity::Medium
    } else {
        ConflictSeverity::Low
    };
    Some(severity)
}

fn temporal_severity(req_a: &ValidatedRequest, req_b: &ValidatedRequest) -> Option<ConflictSeverity> {
    let a = &req_a.request.time_window;
    let b = &req_b.request.time_window;
    if !a.intersects(b) {
        return None;
    }
    let overlap_min = a.end_min.min(b.end_min).saturating_sub(a.start_min.max(b.start_min));
    let severity = if overlap_min > TEMPORAL_HIGH_MIN {
        ConflictSeverity::High
    } else if overlap_min >= TEMPORAL_MEDIUM_MIN {
        ConflictSeverity::Medium
    } else {
        ConflictSeverity::Low
    };
    Some(severity)
}

/// Centerline concentration at an arbitrary distance, interpolated log-log
/// from the prediction's sampled field.
pub fn centerline_at(prediction: &Prediction, distance_m: f64) -> f64 {
    let field = &prediction.concentration_field;
    if field.is_empty() || distance_m <= 0.0 {
        return 0.0;
    }
    if distance_m <= field[0].distance_m {
        return field[0].centerline_pm25_ug_m3;
    }
    if let Some(last) = field.last() {
        if distance_m >= last.distance_m {
            // Beyond the grid the tail decays; reuse the last two samples.
            if field.len() >= 2 {
                let a = &field[field.len() - 2];
                let b = last;
                return log_log_interp(
                    a.distance_m,
                    a.centerline_pm25_ug_m3,
                    b.distance_m,
                    b.centerline_pm25_ug_m3,
                    distance_m,
                );
            }
            return last.centerline_pm25_ug_m3;
        }
    }
    for pair in field.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if distance_m >= a.distance_m && distance_m <= b.distance_m {
            return log_log_interp(
                a.distance_m,
                a.centerline_pm25_ug_m3,
                b.distance_m,
                b.centerline_pm25_ug_m3,
                distance_m,
            );
        }
    }
    0.0
}

fn log_log_interp(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    // Concentrations can be zero near an elevated source; fall back to
    // linear interpolation there.
    if y0 <= 0.0 || y1 <= 0.0 {
        let t = (x - x0) / (x1 - x0);
        return (y0 + t * (y1 - y0)).max(0.0);
    }
    let t = (x.ln() - x0.ln()) / (x1.ln() - x0.ln());
    (y0.ln() + t * (y1.ln() - y0.ln())).exp()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BurnRequest, CropType, FieldBoundary, GeoPoint, TimeWindow, WeatherReliability,
        WeatherSample,
    };
    use crate::smoke::predict;
    use chrono::{NaiveDate, Utc};

    fn validated(id: u64, lat: f64, window: TimeWindow) -> ValidatedRequest {
        let request = BurnRequest {
            id,
            farm_id: id,
            field_boundary: FieldBoundary {
                points: vec![
                    GeoPoint::new(lat, -121.50),
                    GeoPoint::new(lat + 0.01, -121.50),
                    GeoPoint::new(lat + 0.01, -121.49),
                    GeoPoint::new(lat, -121.50),
                ],
            },
            acres: 300.0,
            crop_type: CropType::Rice,
            burn_date: NaiveDate::from_ymd_opt(2025, 9, 15).unwrap(),
            time_window: window,
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
    fn test_close_burns_light_wind_conflict_high_and_symmetric() {
        // Centroids ~500 m apart, identical windows, 3 mph.
        let window = TimeWindow::new(9 * 60, 13 * 60);
        let a = validated(1, 38.500, window);
        let b = validated(2, 38.5045, window);
        let w = weather(3.0);

        let mut predictions = BTreeMap::new();
        predictions.insert(1, predict(&a, &w).unwrap());
        predictions.insert(2, predict(&b, &w).unwrap());

        let requests = vec![a, b];
        annotate_conflicts(&requests, &mut predictions);

        let conflicts_a = &predictions[&1].conflicts;
        let conflicts_b = &predictions[&2].conflicts;

        let spatial_a = conflicts_a
            .iter()
            .find(|c| c.kind == ConflictKind::Spatial)
            .expect("spatial conflict expected");
        let spatial_b = conflicts_b
            .iter()
            .find(|c| c.kind == ConflictKind::Spatial)
            .expect("spatial conflict expected");

        assert_eq!(spatial_a.severity, ConflictSeverity::High);
        assert_eq!(spatial_a.severity, spatial_b.severity);
        assert_eq!(spatial_a.other_burn_request_id, 2);
        assert_eq!(spatial_b.other_burn_request_id, 1);

        // Identical 4-hour windows also produce a temporal conflict.
        assert!(conflicts_a.iter().any(|c| c.kind == ConflictKind::Temporal));
    }

    #[test]
    fn test_distant_burns_no_spatial_conflict() {
        let window_a = TimeWindow::new(9 * 60, 13 * 60);
        let window_b = TimeWindow::new(14 * 60, 18 * 60);
        let a = validated(1, 38.0, window_a);
        let b = validated(2, 40.0, window_b); // ~220 km away
        let w = weather(7.0);

        let mut predictions = BTreeMap::new();
        predictions.insert(1, predict(&a, &w).unwrap());
        predictions.insert(2, predict(&b, &w).unwrap());

        annotate_conflicts(&[a, b], &mut predictions);
        assert!(predictions[&1].conflicts.is_empty());
        assert!(predictions[&2].conflicts.is_empty());
    }

    #[test]
    fn test_temporal_only_when_windows_touch() {
        // Back-to-back windows do not intersect ([9,13) vs [13,17)).
        let a = validated(1, 38.0, TimeWindow::new(9 * 60, 13 * 60));
        let b = validated(2, 40.0, TimeWindow::new(13 * 60, 17 * 60));
        let w = weather(7.0);

        let mut predictions = BTreeMap::new();
        predictions.insert(1, predict(&a, &w).unwrap());
        predictions.insert(2, predict(&b, &w).unwrap());

        annotate_conflicts(&[a, b], &mut predictions);
        assert!(predictions[&1]
            .conflicts
            .iter()
            .all(|c| c.kind != ConflictKind::Temporal));
    }

    #[test]
    fn test_centerline_interpolation_brackets_samples() {
        let a = validated(1, 38.5, TimeWindow::new(9 * 60, 13 * 60));
        let prediction = predict(&a, &weather(3.0)).unwrap();

        let c_500 = centerline_at(&prediction, 500.0);
        let c_700 = centerline_at(&prediction, 700.0);
        let c_1000 = centerline_at(&prediction, 1000.0);
        let lo = c_500.min(c_1000);
        let hi = c_500.max(c_1000);
        assert!(c_700 >= lo - 1e-9 && c_700 <= hi + 1e-9);
    }
}
