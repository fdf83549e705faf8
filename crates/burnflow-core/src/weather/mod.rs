/// Weather Analyzer: per-location meteorology with burn suitability scoring,
/// acceptable-window extraction, and a TTL cache with single-flight fetches.
pub mod cache;
pub mod embedding;
pub mod service;
pub mod suitability;
pub mod windows;

pub use cache::WeatherCache;
pub use embedding::weather_embedding;
pub use service::WeatherAnalyzer;
pub use suitability::{slot_is_suitable, suitability_score};
pub use windows::extract_burn_windows;
