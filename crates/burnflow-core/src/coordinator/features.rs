/// Burn feature vector construction.
///
/// The vector is 32-dim with fixed slot positions so that retrieval stays
/// stable across releases:
///
/// ```text
///  0-7   season one-hot (month % 8)
///  8-14  day-of-week one-hot
///  15    acres / 500, clamped
///  16    priority / 100
///  17    requested duration / 24h
///  18-22 crop one-hot {wheat, corn, soybeans, rice, grass}
///  23-31 historical success features (zeros when no history)
/// ```
///
/// The result is L2-normalized; an all-zero vector is returned as-is.
use chrono::Datelike;

use crate::domain::vectors::{l2_normalize, BURN_VECTOR_DIMS};
use crate::domain::{BurnHistory, BurnRequest, CropType};

pub fn burn_feature_vector(
    request: &BurnRequest,
    priority: u8,
    history: Option<&BurnHistory>,
) -> Vec<f64> {
    let mut v = vec![0.0; BURN_VECTOR_DIMS];

    // 0-7: season bucket. month % 8 keeps adjacent months adjacent while
    // staying inside 8 slots.
    let month = request.burn_date.month() as usize;
    v[month % 8] = 1.0;

    // 8-14: day of week, Monday = 0.
    let weekday = request.burn_date.weekday().num_days_from_monday() as usize;
    v[8 + weekday] = 1.0;

    v[15] = (request.acres / 500.0).clamp(0.0, 1.0);
    v[16] = f64::from(priority) / 100.0;
    v[17] = f64::from(request.time_window.duration_min()) / 60.0 / 24.0;

    // 18-22: crop one-hot over exactly five buckets; other crops leave zeros.
    if let Some(slot) = crop_slot(request.crop_type) {
        v[slot] = 1.0;
    }

    // 23-31: historical success features.
    if let Some(h) = history {
        v[23] = h.success_rate.clamp(0.0, 1.0);
        v[24] = (h.avg_duration_hours / 8.0).clamp(0.0, 1.0);
        v[25] = (1.0 - h.conflict_rate).clamp(0.0, 1.0);
        v[26] = h.good_weather_rate.clamp(0.0, 1.0);
        v[27] = h.on_time_rate.clamp(0.0, 1.0);
        v[28] = h.experience.clamp(0.0, 1.0);
        v[29] = h.no_violation_rate.clamp(0.0, 1.0);
        v[30] = h.recent_success.clamp(0.0, 1.0);
        v[31] = h.seasonal_success.clamp(0.0, 1.0);
    }

    l2_normalize(&mut v);
    v
}

/// Crop one-hot slots are pinned to five buckets (18-22) so the historical
/// feature block at 23-31 can never collide with a grown crop list.
fn crop_slot(crop: CropType) -> Option<usize> {
    match crop {
        CropType::Wheat => Some(18),
        CropType::Corn => Some(19),
        CropType::Soybeans => Some(20),
        CropType::Rice => Some(21),
        // Slot 22 is reserved for grass-family fuels; none of the current
        // crop enum maps there.
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldBoundary, GeoPoint, TimeWindow};
    use chrono::NaiveDate;

    fn request(crop: CropType) -> BurnRequest {
        BurnRequest {
            id: 7,
            farm_id: 3,
            field_boundary: FieldBoundary {
                points: vec![
                    GeoPoint::new(38.50, -121.50),
                    GeoPoint::new(38.51, -121.50),
                    GeoPoint::new(38.51, -121.49),
                    GeoPoint::new(38.50, -121.50),
                ],
            },
            acres: 250.0,
            crop_type: crop,
            burn_date: NaiveDate::from_ymd_opt(2025, 9, 15).unwrap(), // a Monday
            time_window: TimeWindow::new(9 * 60, 13 * 60),
            priority_hint: None,
        }
    }

    #[test]
    fn test_vector_has_declared_dims_and_unit_norm() {
        let v = burn_feature_vector(&request(CropType::Rice), 80, None);
        assert_eq!(v.len(), BURN_VECTOR_DIMS);
        let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
        assert!(v.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_season_and_weekday_slots() {
        let v = burn_feature_vector(&request(CropType::Rice), 80, None);
        // September = month 9, 9 % 8 = 1; 2025-09-15 is a Monday.
        assert!(v[1] > 0.0);
        assert!(v[8] > 0.0);
        assert_eq!(v[2], 0.0);
        assert_eq!(v[9], 0.0);
    }

    #[test]
    fn test_crop_one_hot_slots() {
        let rice = burn_feature_vector(&request(CropType::Rice), 50, None);
        assert!(rice[21] > 0.0);
        assert_eq!(rice[18], 0.0);

        // Crops outside the five buckets leave all of 18-22 zero.
        let cotton = burn_feature_vector(&request(CropType::Cotton), 50, None);
        assert!(cotton[18..=22].iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_history_fills_trailing_block() {
        let history = BurnHistory {
            success_rate: 0.9,
            avg_duration_hours: 4.0,
            conflict_rate: 0.1,
            good_weather_rate: 0.8,
            on_time_rate: 0.7,
            experience: 0.6,
            no_violation_rate: 0.95,
            recent_success: 1.0,
            seasonal_success: 0.85,
        };
        let with = burn_feature_vector(&request(CropType::Wheat), 50, Some(&history));
        let without = burn_feature_vector(&request(CropType::Wheat), 50, None);
        assert!(with[23] > 0.0);
        assert!(without[23..].iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_identical_inputs_identical_vectors() {
        let a = burn_feature_vector(&request(CropType::Corn), 64, None);
        let b = burn_feature_vector(&request(CropType::Corn), 64, None);
        assert_eq!(a, b);
    }
}
