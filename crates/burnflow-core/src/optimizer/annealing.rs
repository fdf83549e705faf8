/// Simulated-annealing schedule optimizer.
///
/// Neighbor moves are chosen uniformly among reschedule / swap / promote,
/// applied as diffs, and committed or rolled back on the Metropolis
/// acceptance test. Runs are fully deterministic for a given seed: the RNG
/// is only drawn for move selection, random picks, and acceptance.
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use crate::domain::{
    Assignment, ConflictKind, ImprovementPoint, OptimizationMetrics, Prediction, Schedule,
    ValidatedRequest,
};

use super::greedy::{best_start_slot, greedy_initial};
use super::scoring::score_solution;
use super::slots::{outside_operating_day, slot_count};
use super::solution::{AssignmentChange, OptimizerContext, RequestMeta, Solution};

/// Unscheduled-reason literals.
pub const REASON_OUTSIDE_OPERATING_WINDOW: &str = "outside operating window";
pub const REASON_NO_FEASIBLE_SLOT: &str = "no feasible slot";

/// Cancellation and wall-clock checks happen every this many iterations.
const CHECK_INTERVAL: u64 = 256;

#[derive(Debug, Clone)]
pub struct AnnealingConfig {
    pub initial_temperature: f64,
    pub cooling_rate: f64,
    pub min_temperature: f64,
    pub max_iterations: u64,
    pub max_iterations_no_improve: u64,
    /// Stagnation length that triggers a reheat; defaults to
    /// `max_iterations_no_improve` when unset.
    pub reheat_threshold: Option<u64>,
    pub max_reheats: u32,
    pub wall_clock_limit: Duration,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 1000.0,
            cooling_rate: 0.95,
            min_temperature: 0.01,
            max_iterations: 10_000,
            max_iterations_no_improve: 1000,
            reheat_threshold: None,
            max_reheats: 3,
            wall_clock_limit: Duration::from_secs(30),
        }
    }
}

pub struct OptimizeInput<'a> {
    pub date: NaiveDate,
    pub requests: &'a [ValidatedRequest],
    /// Per-request weather suitability.
    pub suitability: &'a BTreeMap<u64, f64>,
    pub predictions: &'a BTreeMap<u64, Prediction>,
    pub seed: u64,
}

/// Optimize one day's schedule. Invalid or empty input produces an empty
/// schedule with `overall_score = 0`, never an error. Cancellation is
/// cooperative and returns the best solution found so far.
pub fn optimize(
    input: &OptimizeInput<'_>,
    config: &AnnealingConfig,
    cancel: &CancellationToken,
) -> (Schedule, OptimizationMetrics) {
    let mut schedule = Schedule::empty(input.date);

    let ctx = build_context(input, &mut schedule);
    if ctx.metas.is_empty() {
        return (schedule, empty_metrics(config));
    }

    let mut rng = StdRng::seed_from_u64(input.seed);

    let mut solution = greedy_initial(&ctx);
    let (mut current_score, _) = score_solution(&solution, &ctx);

    let mut best = solution.clone();
    let mut best_score = current_score;

    let t0 = config.initial_temperature;
    let reheat_at = config.reheat_threshold.unwrap_or(config.max_iterations_no_improve);
    let mut temperature = t0;
    let mut iterations: u64 = 0;
    let mut no_improve: u64 = 0;
    let mut reheats: u32 = 0;
    let mut history = vec![ImprovementPoint {
        iteration: 0,
        score: best_score,
        temperature,
    }];

    let started = Instant::now();

    while iterations < config.max_iterations {
        if no_improve >= config.max_iterations_no_improve && reheats >= config.max_reheats {
            break;
        }
        if no_improve >= reheat_at && reheats < config.max_reheats {
            temperature = 0.5 * t0;
            no_improve = 0;
            reheats += 1;
        }
        if temperature < config.min_temperature {
            // A frozen walk with reheats in hand gets one more chance to
            // escape; only a frozen walk with no reheats left terminates.
            if reheats < config.max_reheats {
                temperature = 0.5 * t0;
                reheats += 1;
            } else {
                break;
            }
        }
        if iterations % CHECK_INTERVAL == 0
            && (cancel.is_cancelled() || started.elapsed() > config.wall_clock_limit)
        {
            break;
        }
        iterations += 1;

        let diff = match propose_move(&solution, &ctx, &mut rng) {
            Some(diff) => diff,
            None => {
                temperature *= config.cooling_rate;
                no_improve += 1;
                continue;
            }
        };

        if !solution.apply(&diff) {
            // Occupancy cap would be violated; the move never happened.
            temperature *= config.cooling_rate;
            no_improve += 1;
            continue;
        }

        let (candidate_score, _) = score_solution(&solution, &ctx);
        let delta = candidate_score - current_score;
        let accept = delta > 0.0 || rng.gen::<f64>() < (delta / temperature).exp();

        if accept {
            current_score = candidate_score;
            if candidate_score > best_score {
                best_score = candidate_score;
                best = solution.clone();
                history.push(ImprovementPoint {
                    iteration: iterations,
                    score: best_score,
                    temperature,
                });
                no_improve = 0;
            } else {
                no_improve += 1;
            }
        } else {
            solution.rollback(&diff);
            no_improve += 1;
        }

        temperature *= config.cooling_rate;
    }

    let (overall, breakdown) = score_solution(&best, &ctx);
    for (&id, &assignment) in best.assignments() {
        schedule.assignments.insert(id, assignment);
    }
    for &id in best.unscheduled() {
        schedule
            .unscheduled
            .insert(id, REASON_NO_FEASIBLE_SLOT.to_string());
    }

    let metrics = OptimizationMetrics {
        overall_score: overall,
        scheduled_count: schedule.assignments.len(),
        unscheduled_count: schedule.unscheduled.len(),
        avg_conflict_score: avg_conflict_score(&best, &ctx),
        time_window_compliance: breakdown.time_window,
        iterations,
        reheats,
        final_temperature: temperature,
        improvement_history: history,
        breakdown,
    };

    (schedule, metrics)
}

fn empty_metrics(config: &AnnealingConfig) -> OptimizationMetrics {
    OptimizationMetrics {
        overall_score: 0.0,
        scheduled_count: 0,
        unscheduled_count: 0,
        avg_conflict_score: 0.0,
        time_window_compliance: 0.0,
        iterations: 0,
        reheats: 0,
        final_temperature: config.initial_temperature,
        improvement_history: Vec::new(),
        breakdown: Default::default(),
    }
}

/// Requests whose windows miss the operating day go straight to the
/// unscheduled set; everything else becomes optimizer metadata.
fn build_context(input: &OptimizeInput<'_>, schedule: &mut Schedule) -> OptimizerContext {
    let slots = slot_count();
    let mut metas = BTreeMap::new();

    for validated in input.requests {
        let id = validated.request.id;
        let window = validated.request.time_window;
        if outside_operating_day(&window) {
            schedule
                .unscheduled
                .insert(id, REASON_OUTSIDE_OPERATING_WINDOW.to_string());
            continue;
        }
        let len_slots = ((window.duration_min() / 30) as usize).min(slots);
        metas.insert(
            id,
            RequestMeta {
                id,
                window,
                len_slots,
                priority: validated.priority,
                suitability: input.suitability.get(&id).copied().unwrap_or(0.5),
            },
        );
    }

    let mut severity = BTreeMap::new();
    for (&id, prediction) in input.predictions {
        for conflict in &prediction.conflicts {
            if conflict.kind != ConflictKind::Spatial {
                continue;
            }
            let other = conflict.other_burn_request_id;
            if metas.contains_key(&id) && metas.contains_key(&other) {
                let key = (id.min(other), id.max(other));
                let weight = conflict.severity.weight();
                severity
                    .entry(key)
                    .and_modify(|w: &mut f64| *w = w.max(weight))
                    .or_insert(weight);
            }
        }
    }

    OptimizerContext {
        metas,
        severity,
        slot_count: slots,
    }
}

/// Mean spatial severity across scheduled pairs that overlap in time.
fn avg_conflict_score(solution: &Solution, ctx: &OptimizerContext) -> f64 {
    let scheduled: Vec<u64> = solution.assignments().keys().copied().collect();
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, &a) in scheduled.iter().enumerate() {
        let assign_a = solution.assignment_of(a).expect("scheduled id");
        for &b in &scheduled[i + 1..] {
            let assign_b = solution.assignment_of(b).expect("scheduled id");
            if assign_a.overlaps(&assign_b) {
                let w = ctx.severity_between(a, b);
                if w > 0.0 {
                    total += w;
                    pairs += 1;
                }
            }
        }
    }
    if pairs == 0 {
        0.0
    } else {
        total / pairs as f64
    }
}

// ============================================================================
// NEIGHBOR MOVES
// ============================================================================

fn propose_move(
    solution: &Solution,
    ctx: &OptimizerContext,
    rng: &mut StdRng,
) -> Option<Vec<AssignmentChange>> {
    match rng.gen_range(0..3u8) {
        0 => reschedule_move(solution, ctx, rng),
        1 => swap_move(solution, ctx, rng),
        _ => promote_move(solution, ctx, rng),
    }
}

/// (a) Reschedule a random scheduled request to its currently best slot;
/// may leave it unscheduled when nothing fits.
fn reschedule_move(
    solution: &Solution,
    ctx: &OptimizerContext,
    rng: &mut StdRng,
) -> Option<Vec<AssignmentChange>> {
    let scheduled: Vec<u64> = solution.assignments().keys().copied().collect();
    if scheduled.is_empty() {
        return None;
    }
    let id = scheduled[rng.gen_range(0..scheduled.len())];
    let meta = &ctx.metas[&id];
    let before = solution.assignment_of(id);

    let after = best_start_slot(solution, ctx, meta, false).map(|start| Assignment {
        start_slot: start,
        end_slot: start + meta.len_slots,
    });
    if after == before {
        return None;
    }
    Some(vec![AssignmentChange { id, before, after }])
}

/// (b) Swap two scheduled requests' start slots, re-snapping each to the
/// grid for its own length.
fn swap_move(
    solution: &Solution,
    ctx: &OptimizerContext,
    rng: &mut StdRng,
) -> Option<Vec<AssignmentChange>> {
    let scheduled: Vec<u64> = solution.assignments().keys().copied().collect();
    if scheduled.len() < 2 {
        return None;
    }
    let i = rng.gen_range(0..scheduled.len());
    let mut j = rng.gen_range(0..scheduled.len() - 1);
    if j >= i {
        j += 1;
    }
    let (id_a, id_b) = (scheduled[i], scheduled[j]);
    let a = solution.assignment_of(id_a).expect("scheduled id");
    let b = solution.assignment_of(id_b).expect("scheduled id");

    let len_a = ctx.metas[&id_a].len_slots;
    let len_b = ctx.metas[&id_b].len_slots;
    let snap = |start: usize, len: usize| {
        let max_start = ctx.slot_count.saturating_sub(len);
        start.min(max_start)
    };

    let new_a = Assignment {
        start_slot: snap(b.start_slot, len_a),
        end_slot: snap(b.start_slot, len_a) + len_a,
    };
    let new_b = Assignment {
        start_slot: snap(a.start_slot, len_b),
        end_slot: snap(a.start_slot, len_b) + len_b,
    };
    if new_a == a && new_b == b {
        return None;
    }
    Some(vec![
        AssignmentChange {
            id: id_a,
            before: Some(a),
            after: Some(new_a),
        },
        AssignmentChange {
            id: id_b,
            before: Some(b),
            after: Some(new_b),
        },
    ])
}

/// (c) Promote an unscheduled request into its best feasible slot.
fn promote_move(
    solution: &Solution,
    ctx: &OptimizerContext,
    rng: &mut StdRng,
) -> Option<Vec<AssignmentChange>> {
    let unscheduled: Vec<u64> = solution.unscheduled().iter().copied().collect();
    if unscheduled.is_empty() {
        return None;
    }
    let id = unscheduled[rng.gen_range(0..unscheduled.len())];
    let meta = &ctx.metas[&id];
    let start = best_start_slot(solution, ctx, meta, true)?;
    Some(vec![AssignmentChange {
        id,
        before: None,
        after: Some(Assignment {
            start_slot: start,
            end_slot: start + meta.len_slots,
        }),
    }])
}

// ============================================================================
// TESTS
// ============================================================================
