/// Priority scoring for validated burn requests.
///
/// The score is an integer 0-100 built from four weighted components:
/// acreage band, crop emissivity rank, proximity of the requested window to
/// now, and an optional external hint. Ties between equal scores are broken
/// by ascending request id wherever ordering matters.
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::domain::{BurnRequest, CropType};

/// Component weights; they sum to 100.
const ACREAGE_WEIGHT: f64 = 30.0;
const CROP_WEIGHT: f64 = 25.0;
const PROXIMITY_WEIGHT: f64 = 25.0;
const HINT_WEIGHT: f64 = 20.0;

/// Acreage at or above this caps the acreage component.
const ACREAGE_CAP: f64 = 500.0;

/// Proximity decays to zero over this many days.
const PROXIMITY_HORIZON_DAYS: f64 = 14.0;

/// Emissivity rank, 9 (highest) down to 0:
/// rice > cotton > sorghum > corn > wheat > barley > oats > sunflower >
/// soybeans > other.
pub fn crop_emissivity_rank(crop: CropType) -> u8 {
    match crop {
        CropType::Rice => 9,
        CropType::Cotton => 8,
        CropType::Sorghum => 7,
        CropType::Corn => 6,
        CropType::Wheat => 5,
        CropType::Barley => 4,
        CropType::Oats => 3,
        CropType::Sunflower => 2,
        CropType::Soybeans => 1,
        CropType::Other => 0,
    }
}

/// Compute the 0-100 priority score for a request at time `now`.
pub fn priority_score(request: &BurnRequest, now: DateTime<Utc>) -> u8 {
    let acreage_term = (request.acres.min(ACREAGE_CAP) / ACREAGE_CAP).max(0.0) * ACREAGE_WEIGHT;

    let crop_term = f64::from(crop_emissivity_rank(request.crop_type)) / 9.0 * CROP_WEIGHT;

    let proximity_term = proximity_factor(request, now) * PROXIMITY_WEIGHT;

    let hint_term = request
        .priority_hint
        .map(|h| f64::from(h.min(100)) / 100.0 * HINT_WEIGHT)
        .unwrap_or(0.0);

    let score = acreage_term + crop_term + proximity_term + hint_term;
    score.round().clamp(0.0, 100.0) as u8
}

/// 1.0 when the requested window starts within a day of now, decaying
/// linearly to 0.0 at the proximity horizon. Windows already in the past
/// score full urgency.
fn proximity_factor(request: &BurnRequest, now: DateTime<Utc>) -> f64 {
    let start_naive = NaiveDateTime::new(
        request.burn_date,
        chrono::NaiveTime::from_num_seconds_from_midnight_opt(
            request.time_window.start_min * 60,
            0,
        )
        .unwrap_or_default(),
    );
    let start = Utc.from_utc_datetime(&start_naive);
    let days_until = (start - now).num_minutes() as f64 / (60.0 * 24.0);
    if days_until <= 1.0 {
        1.0
    } else {
        (1.0 - (days_until - 1.0) / PROXIMITY_HORIZON_DAYS).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldBoundary, GeoPoint, TimeWindow};
    use chrono::NaiveDate;

    fn request(acres: f64, crop: CropType, hint: Option<u8>) -> BurnRequest {
        BurnRequest {
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
            priority_hint: hint,
        }
    }

    fn day_of(request: &BurnRequest) -> DateTime<Utc> {
        Utc.from_utc_datetime(&request.burn_date.and_hms_opt(6, 0, 0).unwrap())
    }

    #[test]
    fn test_emissivity_order() {
        let order = [
            CropType::Rice,
            CropType::Cotton,
            CropType::Sorghum,
            CropType::Corn,
            CropType::Wheat,
            CropType::Barley,
            CropType::Oats,
            CropType::Sunflower,
            CropType::Soybeans,
            CropType::Other,
        ];
        for pair in order.windows(2) {
            assert!(crop_emissivity_rank(pair[0]) > crop_emissivity_rank(pair[1]));
        }
    }

    #[test]
    fn test_acreage_caps_at_500() {
        let small = request(500.0, CropType::Wheat, None);
        let large = request(5000.0, CropType::Wheat, None);
        let now = day_of(&small);
        assert_eq!(priority_score(&small, now), priority_score(&large, now));
    }

    #[test]
    fn test_rice_outranks_soybeans() {
        let rice = request(100.0, CropType::Rice, None);
        let soy = request(100.0, CropType::Soybeans, None);
        let now = day_of(&rice);
        assert!(priority_score(&rice, now) > priority_score(&soy, now));
    }

    #[test]
    fn test_hint_raises_score() {
        let plain = request(100.0, CropType::Wheat, None);
        let hinted = request(100.0, CropType::Wheat, Some(100));
        let now = day_of(&plain);
        assert!(priority_score(&hinted, now) > priority_score(&plain, now));
    }

    #[test]
    fn test_imminent_burn_outranks_distant() {
        let r = request(100.0, CropType::Wheat, None);
        let near = day_of(&r);
        let far = near - chrono::Duration::days(30);
        assert!(priority_score(&r, near) > priority_score(&r, far));
    }

    #[test]
    fn test_score_bounded() {
        let maxed = request(1000.0, CropType::Rice, Some(100));
        let now = day_of(&maxed);
        assert!(priority_score(&maxed, now) <= 100);
    }
}
