/// Request Coordinator: validates burn requests, scores their priority, and
/// emits the fixed-dimension burn feature vector used for retrieval.
pub mod features;
pub mod priority;
pub mod validate;

pub use features::burn_feature_vector;
pub use priority::priority_score;
pub use validate::{validate, validate_request};
