pub mod errors;
pub mod models;
pub mod vectors;

pub use errors::{PipelineError, ValidationError};
pub use models::{
    Alert, AlertChannel, AlertPriority, Assignment, BurnHistory, BurnRequest, BurnWindow,
    ChannelStates,
    ConcentrationSample, Conflict, ConflictKind, ConflictSeverity, CropType, DeliveryStatus,
    DispatchReport, DispatchedAlert, FieldBoundary, GeoPoint, ImprovementPoint,
    OptimizationMetrics, Prediction, Recipient, Schedule, ScoreBreakdown, StabilityClass,
    SuitabilityScore, TimeWindow, ValidatedRequest, WeatherAnalysis, WeatherReliability,
    WeatherSample,
};
pub use vectors::{
    cosine_similarity, decode_vector, encode_vector, l2_normalize, VectorKind, BURN_VECTOR_DIMS,
    PLUME_VECTOR_DIMS, WEATHER_VECTOR_DIMS,
};
