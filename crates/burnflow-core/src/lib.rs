pub mod alerts;
pub mod coordinator;
pub mod domain;
pub mod optimizer;
pub mod pipeline;
pub mod ports;
pub mod resilience;
pub mod smoke;
pub mod weather;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use domain::{
    Alert, AlertChannel, AlertPriority, Assignment, BurnRequest, Conflict, ConflictKind,
    ConflictSeverity, CropType, DeliveryStatus, OptimizationMetrics, PipelineError, Prediction,
    Schedule, SuitabilityScore, TimeWindow, ValidatedRequest, ValidationError, WeatherSample,
};
pub use pipeline::{BatchOptions, BatchResult, Pipeline};
pub use ports::{AlertTransport, Embedder, Relational, VectorStore, WeatherProvider};
