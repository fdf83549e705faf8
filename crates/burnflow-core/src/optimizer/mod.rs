/// Schedule Optimizer: seeded simulated annealing over the operating day's
/// 30-minute slot grid, minimizing a weighted cost over smoke conflicts,
/// window violations, weather, priority satisfaction, and utilization.
pub mod annealing;
pub mod greedy;
pub mod scoring;
pub mod slots;
pub mod solution;

pub use annealing::{optimize, AnnealingConfig, OptimizeInput};
pub use scoring::{score_solution, ScoreWeights};
pub use slots::{slot_count, slot_start_min, slot_window, OPERATING_END_MIN, OPERATING_START_MIN};
pub use solution::{OptimizerContext, RequestMeta, Solution};
