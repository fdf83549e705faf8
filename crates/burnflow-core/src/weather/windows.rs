/// Burn window extraction over a 3-hourly forecast.
///
/// A window is a maximal run of suitable slots of length >= 2, i.e. at least
/// six hours of continuously acceptable conditions.
use chrono::Duration;

use crate::domain::{BurnWindow, WeatherSample};

use super::suitability::slot_is_suitable;

/// Hours covered by one forecast slot.
const SLOT_HOURS: i64 = 3;

/// Minimum run length for an acceptable window.
const MIN_RUN: usize = 2;

pub fn extract_burn_windows(forecast: &[WeatherSample]) -> Vec<BurnWindow> {
    let mut windows = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, slot) in forecast.iter().enumerate() {
        if slot_is_suitable(slot) {
            run_start.get_or_insert(i);
        } else if let Some(start) = run_start.take() {
            push_if_long_enough(&mut windows, forecast, start, i);
        }
    }
    if let Some(start) = run_start {
        push_if_long_enough(&mut windows, forecast, start, forecast.len());
    }

    windows
}

fn push_if_long_enough(
    windows: &mut Vec<BurnWindow>,
    forecast: &[WeatherSample],
    start: usize,
    end: usize,
) {
    if end - start >= MIN_RUN {
        windows.push(BurnWindow {
            start: forecast[start].observation_time,
            end: forecast[end - 1].observation_time + Duration::hours(SLOT_HOURS),
        });
    }
}
