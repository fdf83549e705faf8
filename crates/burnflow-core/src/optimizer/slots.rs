/// The operating-day slot grid.
///
/// Slots are 30 minutes wide with start times from 06:00 to 20:00 inclusive,
/// giving 29 slots; slot s covers [06:00 + 30s, 06:00 + 30(s+1)).
use crate::domain::models::SLOT_MINUTES;
use crate::domain::TimeWindow;

pub const OPERATING_START_MIN: u32 = 6 * 60;
pub const OPERATING_END_MIN: u32 = 20 * 60;

pub fn slot_count() -> usize {
    ((OPERATING_END_MIN - OPERATING_START_MIN) / SLOT_MINUTES) as usize + 1
}

/// Start of a slot in minutes since midnight.
pub fn slot_start_min(slot: usize) -> u32 {
    OPERATING_START_MIN + slot as u32 * SLOT_MINUTES
}

/// The wall-clock window covered by `[start_slot, end_slot)`.
pub fn slot_window(start_slot: usize, end_slot: usize) -> TimeWindow {
    TimeWindow::new(slot_start_min(start_slot), slot_start_min(end_slot))
}

/// Whether a request window misses the operating day entirely.
pub fn outside_operating_day(window: &TimeWindow) -> bool {
    window.end_min <= OPERATING_START_MIN
        || window.start_min >= slot_start_min(slot_count())
}

/// First slot whose start is >= `minute`, if any.
pub fn slot_at_or_after(minute: u32) -> Option<usize> {
    if minute <= OPERATING_START_MIN {
        return Some(0);
    }
    let offset = minute - OPERATING_START_MIN;
    let slot = offset.div_ceil(SLOT_MINUTES) as usize;
    (slot < slot_count()).then_some(slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_has_29_slots() {
        assert_eq!(slot_count(), 29);
        assert_eq!(slot_start_min(0), 6 * 60);
        assert_eq!(slot_start_min(28), 20 * 60);
    }

    #[test]
    fn test_slot_window_formats() {
        let window = slot_window(6, 14); // 09:00-13:00
        assert_eq!(window.start_min, 9 * 60);
        assert_eq!(window.end_min, 13 * 60);
    }

    #[test]
    fn test_outside_operating_day() {
        assert!(outside_operating_day(&TimeWindow::new(2 * 60, 5 * 60)));
        assert!(outside_operating_day(&TimeWindow::new(21 * 60, 23 * 60 + 30)));
        assert!(!outside_operating_day(&TimeWindow::new(9 * 60, 13 * 60)));
        // Crosses the evening boundary: still partially schedulable.
        assert!(!outside_operating_day(&TimeWindow::new(19 * 60, 22 * 60)));
    }

    #[test]
    fn test_slot_at_or_after() {
        assert_eq!(slot_at_or_after(0), Some(0));
        assert_eq!(slot_at_or_after(9 * 60), Some(6));
        assert_eq!(slot_at_or_after(9 * 60 + 10), Some(7));
        assert_eq!(slot_at_or_after(23 * 60), None);
    }
}
