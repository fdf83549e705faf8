use chrono::{DateTime, Utc};

use crate::domain::models::{MIN_BURN_DURATION_MIN, SLOT_MINUTES};
use crate::domain::{BurnHistory, BurnRequest, GeoPoint, ValidatedRequest, ValidationError};

use super::features::burn_feature_vector;
use super::priority::priority_score;

/// Validate a burn request against the structural invariants. Validation is
/// idempotent: a request that passed once passes again unchanged.
pub fn validate(request: &BurnRequest) -> Result<(), ValidationError> {
    if request.field_boundary.points.is_empty() {
        return Err(ValidationError::MissingField("field_boundary"));
    }
    if !request.acres.is_finite() || request.acres <= 0.0 {
        return Err(ValidationError::InvalidAcreage(request.acres));
    }

    let boundary = &request.field_boundary;
    if boundary.points.len() < 4 {
        return Err(ValidationError::BadPolygon(format!(
            "polygon has {} points, need at least 4",
            boundary.points.len()
        )));
    }
    if !boundary.is_closed() {
        return Err(ValidationError::BadPolygon(
            "polygon is not closed".to_string(),
        ));
    }

    let window = &request.time_window;
    if window.start_min >= window.end_min {
        return Err(ValidationError::BadTimeWindow(format!(
            "window {window} is empty or reversed"
        )));
    }
    if window.start_min % SLOT_MINUTES != 0 || window.end_min % SLOT_MINUTES != 0 {
        return Err(ValidationError::BadTimeWindow(format!(
            "window {window} is not on the 30-minute grid"
        )));
    }
    if window.end_min > 24 * 60 {
        return Err(ValidationError::BadTimeWindow(format!(
            "window {window} extends past midnight"
        )));
    }
    if window.duration_min() < MIN_BURN_DURATION_MIN {
        return Err(ValidationError::BadTimeWindow(format!(
            "window {window} is shorter than the 2-hour minimum burn duration"
        )));
    }

    Ok(())
}

/// Validate and enrich a request: priority score, feature vector, centroid.
///
/// A degenerate polygon (closed ring with no area) does not reject the
/// request; its centroid falls back to the configured regional point and the
/// request is flagged low-confidence.
pub fn validate_request(
    request: BurnRequest,
    now: DateTime<Utc>,
    history: Option<&BurnHistory>,
    fallback_centroid: GeoPoint,
) -> Result<ValidatedRequest, ValidationError> {
    validate(&request)?;

    let (centroid, low_confidence) = match request.field_boundary.centroid() {
        Some(c) if request.field_boundary.planar_area() > 0.0 => (c, false),
        _ => (fallback_centroid, true),
    };

    let priority = priority_score(&request, now);
    let feature_vector = burn_feature_vector(&request, priority, history);

    Ok(ValidatedRequest {
        request,
        priority,
        feature_vector,
        centroid,
        low_confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CropType, FieldBoundary, TimeWindow};
    use chrono::NaiveDate;

    fn base_request() -> BurnRequest {
        BurnRequest {
            id: 1,
            farm_id: 10,
            field_boundary: FieldBoundary {
                points: vec![
                    GeoPoint::new(38.50, -121.50),
                    GeoPoint::new(38.51, -121.50),
                    GeoPoint::new(38.51, -121.49),
                    GeoPoint::new(38.50, -121.49),
                    GeoPoint::new(38.50, -121.50),
                ],
            },
            acres: 100.0,
            crop_type: CropType::Wheat,
            burn_date: NaiveDate::from_ymd_opt(2025, 9, 15).unwrap(),
            time_window: TimeWindow::new(9 * 60, 13 * 60),
            priority_hint: None,
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(validate(&base_request()).is_ok());
    }

    #[test]
    fn test_validation_is_idempotent() {
        let request = base_request();
        let validated = validate_request(
            request,
            Utc::now(),
            None,
            GeoPoint::new(38.5, -121.5),
        )
        .unwrap();
        // Re-validating the inner request succeeds again.
        assert!(validate(&validated.request).is_ok());
    }

    #[test]
    fn test_zero_acres_rejected() {
        let mut request = base_request();
        request.acres = 0.0;
        assert!(matches!(
            validate(&request),
            Err(ValidationError::InvalidAcreage(_))
        ));
    }

    #[test]
    fn test_three_point_polygon_rejected() {
        let mut request = base_request();
        request.field_boundary.points.truncate(3);
        assert!(matches!(
            validate(&request),
            Err(ValidationError::BadPolygon(_))
        ));
    }

    #[test]
    fn test_open_polygon_rejected() {
        let mut request = base_request();
        request.field_boundary.points.pop();
        request
            .field_boundary
            .points
            .push(GeoPoint::new(38.52, -121.52));
        assert!(matches!(
            validate(&request),
            Err(ValidationError::BadPolygon(_))
        ));
    }

    #[test]
    fn test_two_hour_window_accepted_shorter_rejected() {
        let mut request = base_request();
        request.time_window = TimeWindow::new(8 * 60, 10 * 60); // exactly 2h
        assert!(validate(&request).is_ok());

        // 08:00-09:30 is under the 2-hour minimum
        request.time_window = TimeWindow::new(8 * 60, 9 * 60 + 30);
        assert!(matches!(
            validate(&request),
            Err(ValidationError::BadTimeWindow(_))
        ));
    }

    #[test]
    fn test_off_grid_window_rejected() {
        let mut request = base_request();
        request.time_window = TimeWindow::new(9 * 60 + 15, 13 * 60);
        assert!(matches!(
            validate(&request),
            Err(ValidationError::BadTimeWindow(_))
        ));
    }

    #[test]
    fn test_degenerate_polygon_falls_back_to_regional_centroid() {
        let mut request = base_request();
        // Closed but zero-area: all points on one meridian.
        request.field_boundary.points = vec![
            GeoPoint::new(38.50, -121.50),
            GeoPoint::new(38.51, -121.50),
            GeoPoint::new(38.52, -121.50),
            GeoPoint::new(38.50, -121.50),
        ];
        let fallback = GeoPoint::new(39.0, -122.0);
        let validated = validate_request(request, Utc::now(), None, fallback).unwrap();
        assert!(validated.low_confidence);
        assert_eq!(validated.centroid, fallback);
    }
}
