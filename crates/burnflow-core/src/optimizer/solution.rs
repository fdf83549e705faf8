/// Solution state for the annealer.
///
/// A solution is the assignment map plus derived slot occupancy counts.
/// Neighbor moves are expressed as small diffs that are applied up front and
/// rolled back on rejection; the solution is never deep-cloned inside the
/// annealing loop.
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::models::MAX_DAILY_BURNS_PER_SLOT;
use crate::domain::{Assignment, TimeWindow};

#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub id: u64,
    pub window: TimeWindow,
    /// Assignment length in slots (the requested window length, capped to
    /// the grid).
    pub len_slots: usize,
    pub priority: u8,
    pub suitability: f64,
}

/// Read-only inputs shared by scoring and move generation.
#[derive(Debug, Clone)]
pub struct OptimizerContext {
    pub metas: BTreeMap<u64, RequestMeta>,
    /// Spatial conflict severity weight per unordered request pair, keyed
    /// (low id, high id).
    pub severity: BTreeMap<(u64, u64), f64>,
    pub slot_count: usize,
}

impl OptimizerContext {
    pub fn severity_between(&self, a: u64, b: u64) -> f64 {
        let key = (a.min(b), a.max(b));
        self.severity.get(&key).copied().unwrap_or(0.0)
    }
}

/// One entry of a move diff: `before` -> `after` for a single request.
#[derive(Debug, Clone, Copy)]
pub struct AssignmentChange {
    pub id: u64,
    pub before: Option<Assignment>,
    pub after: Option<Assignment>,
}

#[derive(Debug, Clone)]
pub struct Solution {
    assignments: BTreeMap<u64, Assignment>,
    unscheduled: BTreeSet<u64>,
    occupancy: Vec<u32>,
}

impl Solution {
    /// All requests start unscheduled.
    pub fn new(ids: impl IntoIterator<Item = u64>, slot_count: usize) -> Self {
        Self {
            assignments: BTreeMap::new(),
            unscheduled: ids.into_iter().collect(),
            occupancy: vec![0; slot_count],
        }
    }

    pub fn assignments(&self) -> &BTreeMap<u64, Assignment> {
        &self.assignments
    }

    pub fn unscheduled(&self) -> &BTreeSet<u64> {
        &self.unscheduled
    }

    pub fn assignment_of(&self, id: u64) -> Option<Assignment> {
        self.assignments.get(&id).copied()
    }

    pub fn occupancy(&self, slot: usize) -> u32 {
        self.occupancy[slot]
    }

    /// Whether placing one more burn on every slot of `a` stays under the
    /// per-slot cap.
    pub fn fits(&self, a: &Assignment) -> bool {
        a.slots()
            .all(|slot| (self.occupancy[slot] as usize) < MAX_DAILY_BURNS_PER_SLOT)
    }

    /// Apply a diff. Returns false (after restoring the prior state) if the
    /// result would violate the per-slot occupancy cap.
    pub fn apply(&mut self, diff: &[AssignmentChange]) -> bool {
        for change in diff {
            self.set(change.id, change.after);
        }
        if self.occupancy
            .iter()
            .all(|&c| (c as usize) <= MAX_DAILY_BURNS_PER_SLOT)
        {
            true
        } else {
            self.rollback(diff);
            false
        }
    }

    pub fn rollback(&mut self, diff: &[AssignmentChange]) {
        for change in diff.iter().rev() {
            self.set(change.id, change.before);
        }
    }

    fn set(&mut self, id: u64, assignment: Option<Assignment>) {
        if let Some(prev) = self.assignments.remove(&id) {
            for slot in prev.slots() {
                self.occupancy[slot] -= 1;
            }
        }
        match assignment {
            Some(a) => {
                for slot in a.slots() {
                    self.occupancy[slot] += 1;
                }
                self.assignments.insert(id, a);
                self.unscheduled.remove(&id);
            }
            None => {
                self.unscheduled.insert(id);
            }
        }
    }
}
