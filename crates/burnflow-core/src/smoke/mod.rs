/// Smoke Predictor: deterministic Gaussian plume model. From a burn's
/// geometry/fuel and meteorology it computes the downwind PM2.5 field, the
/// affected-area footprint, the plume feature vector, and pairwise conflicts.
pub mod conflicts;
pub mod dispersion;
pub mod emissions;
pub mod features;
pub mod predictor;
pub mod stability;

pub use conflicts::annotate_conflicts;
pub use emissions::{emission_profile, EmissionProfile};
pub use predictor::predict;
pub use stability::classify_stability;
