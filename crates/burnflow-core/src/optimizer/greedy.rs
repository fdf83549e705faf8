/// Greedy initial solution.
///
/// Requests are placed in descending priority order (ties by ascending id),
/// each into the best start slot of its time window by a local score:
/// weather suitability, priority influence, a morning-preference bump, minus
/// the conflict pressure of already-placed overlapping burns.
use crate::domain::Assignment;

use super::slots::{slot_start_min, slot_window};
use super::solution::{AssignmentChange, OptimizerContext, RequestMeta, Solution};

/// Slots starting in [07:00, 11:00) get a preference bump.
const MORNING_BUMP_START_MIN: u32 = 7 * 60;
const MORNING_BUMP_END_MIN: u32 = 11 * 60;
const MORNING_BUMP: f64 = 0.1;

pub fn greedy_initial(ctx: &OptimizerContext) -> Solution {
    let mut solution = Solution::new(ctx.metas.keys().copied(), ctx.slot_count);

    let mut order: Vec<&RequestMeta> = ctx.metas.values().collect();
    order.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

    for meta in order {
        if let Some(start) = best_start_slot(&solution, ctx, meta, true) {
            let assignment = Assignment {
                start_slot: start,
                end_slot: start + meta.len_slots,
            };
            solution.apply(&[AssignmentChange {
                id: meta.id,
                before: None,
                after: Some(assignment),
            }]);
        }
    }

    solution
}

/// Best start slot for `meta` by local score, or None when the per-slot cap
/// blocks every candidate. With `prefer_window`, candidates inside the
/// request window are used when any exist; otherwise the whole grid is
/// considered (the window miss is priced by the global score).
pub fn best_start_slot(
    solution: &Solution,
    ctx: &OptimizerContext,
    meta: &RequestMeta,
    prefer_window: bool,
) -> Option<usize> {
    let all: Vec<usize> = (0..=ctx.slot_count.saturating_sub(meta.len_slots)).collect();
    if all.is_empty() {
        return None;
    }

    let in_window: Vec<usize> = all
        .iter()
        .copied()
        .filter(|&s| {
            let w = slot_window(s, s + meta.len_slots);
            meta.window.contains(&w)
        })
        .collect();

    let candidates = if prefer_window && !in_window.is_empty() {
        in_window
    } else {
        all
    };

    let mut best: Option<(usize, f64)> = None;
    for start in candidates {
        let assignment = Assignment {
            start_slot: start,
            end_slot: start + meta.len_slots,
        };
        if !solution.fits(&assignment) {
            continue;
        }
        let score = local_score(solution, ctx, meta, &assignment);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((start, score)),
        }
    }
    best.map(|(start, _)| start)
}

fn local_score(
    solution: &Solution,
    ctx: &OptimizerContext,
    meta: &RequestMeta,
    candidate: &Assignment,
) -> f64 {
    let mut score = meta.suitability + f64::from(meta.priority) / 100.0 * 0.5;

    let start_min = slot_start_min(candidate.start_slot);
    if (MORNING_BUMP_START_MIN..MORNING_BUMP_END_MIN).contains(&start_min) {
        score += MORNING_BUMP;
    }

    for (&other_id, other) in solution.assignments() {
        if other_id != meta.id && candidate.overlaps(other) {
            score -= ctx.severity_between(meta.id, other_id);
        }
    }

    score
}
