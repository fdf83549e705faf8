/// Solution scoring.
///
/// `score(solution)` is a weighted sum in [0, 1], higher is better. The
/// weights are pinned; alternate weightings are deliberately not supported.
use crate::domain::ScoreBreakdown;

use super::solution::{OptimizerContext, Solution};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub smoke_conflicts: f64,
    pub time_window: f64,
    pub weather: f64,
    pub priority: f64,
    pub utilization: f64,
}

pub const WEIGHTS: ScoreWeights = ScoreWeights {
    smoke_conflicts: 0.35,
    time_window: 0.25,
    weather: 0.20,
    priority: 0.15,
    utilization: 0.05,
};

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.smoke_conflicts + self.time_window + self.weather + self.priority + self.utilization
    }
}

/// Score a solution and return (overall, per-term breakdown). Every term is
/// in [0, 1]; an empty schedule scores 0.
pub fn score_solution(solution: &Solution, ctx: &OptimizerContext) -> (f64, ScoreBreakdown) {
    let scheduled: Vec<u64> = solution.assignments().keys().copied().collect();
    let total = ctx.metas.len();

    let breakdown = ScoreBreakdown {
        smoke_conflicts: smoke_term(solution, ctx, &scheduled),
        time_window: window_term(solution, ctx, &scheduled),
        weather: weather_term(ctx, &scheduled),
        priority: priority_term(ctx, &scheduled),
        utilization: if total == 0 {
            0.0
        } else {
            scheduled.len() as f64 / total as f64
        },
    };

    let overall = WEIGHTS.smoke_conflicts * breakdown.smoke_conflicts
        + WEIGHTS.time_window * breakdown.time_window
        + WEIGHTS.weather * breakdown.weather
        + WEIGHTS.priority * breakdown.priority
        + WEIGHTS.utilization * breakdown.utilization;

    (overall.clamp(0.0, 1.0), breakdown)
}

/// 1 minus the normalized severity of temporally-overlapping scheduled
/// pairs. Severity comes from the predictor's spatial conflict matrix and
/// only counts while both burns are actually on the grid at the same time.
fn smoke_term(solution: &Solution, ctx: &OptimizerContext, scheduled: &[u64]) -> f64 {
    if scheduled.len() < 2 {
        return if scheduled.is_empty() { 0.0 } else { 1.0 };
    }
    let max_pairs = (scheduled.len() * (scheduled.len() - 1) / 2) as f64;
    let mut total = 0.0;
    for (i, &a) in scheduled.iter().enumerate() {
        let assign_a = solution.assignment_of(a).expect("scheduled id");
        for &b in &scheduled[i + 1..] {
            let assign_b = solution.assignment_of(b).expect("scheduled id");
            if assign_a.overlaps(&assign_b) {
                total += ctx.severity_between(a, b);
            }
        }
    }
    (1.0 - total / max_pairs).clamp(0.0, 1.0)
}

/// Fraction of assignments lying inside their request's window.
fn window_term(solution: &Solution, ctx: &OptimizerContext, scheduled: &[u64]) -> f64 {
    if scheduled.is_empty() {
        return 0.0;
    }
    let compliant = scheduled
        .iter()
        .filter(|id| {
            let meta = &ctx.metas[*id];
            let assignment = solution.assignment_of(**id).expect("scheduled id");
            let assigned = super::slots::slot_window(assignment.start_slot, assignment.end_slot);
            meta.window.contains(&assigned)
        })
        .count();
    compliant as f64 / scheduled.len() as f64
}

/// Mean suitability over scheduled burns.
fn weather_term(ctx: &OptimizerContext, scheduled: &[u64]) -> f64 {
    if scheduled.is_empty() {
        return 0.0;
    }
    let sum: f64 = scheduled.iter().map(|id| ctx.metas[id].suitability).sum();
    sum / scheduled.len() as f64
}

/// Scheduled priority mass over total priority mass.
fn priority_term(ctx: &OptimizerContext, scheduled: &[u64]) -> f64 {
    let total: f64 = ctx.metas.values().map(|m| f64::from(m.priority)).sum();
    if total == 0.0 {
        return 0.0;
    }
    let sum: f64 = scheduled.iter().map(|id| f64::from(ctx.metas[id].priority)).sum();
    sum / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Assignment, TimeWindow};
    use crate::optimizer::solution::{AssignmentChange, RequestMeta};
    use std::collections::BTreeMap;

    fn meta(id: u64, priority: u8, suitability: f64) -> RequestMeta {
        RequestMeta {
            id,
            window: TimeWindow::new(9 * 60, 13 * 60),
            len_slots: 8,
            priority,
            suitability,
        }
    }

    fn context(metas: Vec<RequestMeta>, severity: Vec<((u64, u64), f64)>) -> OptimizerContext {
        OptimizerContext {
            metas: metas.into_iter().map(|m| (m.id, m)).collect(),
            severity: severity.into_iter().collect(),
            slot_count: 29,
        }
    }

    fn schedule(solution: &mut Solution, id: u64, start: usize, len: usize) {
        assert!(solution.apply(&[AssignmentChange {
            id,
            before: None,
            after: Some(Assignment {
                start_slot: start,
                end_slot: start + len,
            }),
        }]));
    }

    #[test]
    fn test_weights_sum_to_one() {
        assert!((WEIGHTS.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_schedule_scores_zero() {
        let ctx = context(vec![meta(1, 50, 0.9)], vec![]);
        let solution = Solution::new([1], 29);
        let (overall, _) = score_solution(&solution, &ctx);
        assert_eq!(overall, 0.0);
    }

    #[test]
    fn test_clean_full_schedule_scores_high() {
        let ctx = context(vec![meta(1, 50, 1.0), meta(2, 60, 1.0)], vec![]);
        let mut solution = Solution::new([1, 2], 29);
        // Both inside their 09:00-13:00 windows (slot 6 = 09:00).
        schedule(&mut solution, 1, 6, 8);
        schedule(&mut solution, 2, 6, 8);

        let (overall, breakdown) = score_solution(&solution, &ctx);
        assert!(overall > 0.95, "got {overall}");
        assert_eq!(breakdown.smoke_conflicts, 1.0);
        assert_eq!(breakdown.time_window, 1.0);
        assert_eq!(breakdown.utilization, 1.0);
    }

    #[test]
    fn test_overlapping_conflicted_pair_lowers_smoke_term() {
        let ctx = context(
            vec![meta(1, 50, 1.0), meta(2, 60, 1.0)],
            vec![((1, 2), 1.0)],
        );
        let mut overlapping = Solution::new([1, 2], 29);
        schedule(&mut overlapping, 1, 6, 8);
        schedule(&mut overlapping, 2, 6, 8);

        let mut separated = Solution::new([1, 2], 29);
        schedule(&mut separated, 1, 6, 8);
        schedule(&mut separated, 2, 14, 8);

        let (score_overlap, b_overlap) = score_solution(&overlapping, &ctx);
        let (score_separated, b_separated) = score_solution(&separated, &ctx);
        assert_eq!(b_overlap.smoke_conflicts, 0.0);
        assert_eq!(b_separated.smoke_conflicts, 1.0);
        assert!(score_separated > score_overlap);
    }

    #[test]
    fn test_window_term_counts_out_of_window_assignment() {
        let ctx = context(vec![meta(1, 50, 1.0), meta(2, 60, 1.0)], vec![]);
        let mut solution = Solution::new([1, 2], 29);
        schedule(&mut solution, 1, 6, 8); // inside
        schedule(&mut solution, 2, 14, 8); // 13:00-17:00, outside

        let (_, breakdown) = score_solution(&solution, &ctx);
        assert!((breakdown.time_window - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_priority_term_rewards_high_priority_selection() {
        let ctx = context(vec![meta(1, 90, 1.0), meta(2, 10, 1.0)], vec![]);
        let mut solution = Solution::new([1, 2], 29);
        schedule(&mut solution, 1, 6, 8);

        let (_, breakdown) = score_solution(&solution, &ctx);
        assert!((breakdown.priority - 0.9).abs() < 1e-12);
        assert!((breakdown.utilization - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_score_bounded() {
        let ctx = context(
            vec![meta(1, 0, 0.0), meta(2, 0, 0.0)],
            vec![((1, 2), 1.0)],
        );
        let mut solution = Solution::new([1, 2], 29);
        schedule(&mut solution, 1, 6, 8);
        schedule(&mut solution, 2, 6, 8);
        let (overall, _) = score_solution(&solution, &ctx);
        assert!((0.0..=1.0).contains(&overall));
    }
}
