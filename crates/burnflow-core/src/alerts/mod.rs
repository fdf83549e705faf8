/// Alert Dispatcher: converts schedule outcomes into per-recipient alerts
/// with priority-aware rate limiting, fallback channels, and idempotent
/// delivery.
pub mod dispatcher;
pub mod rate_limit;

pub use dispatcher::{AlertDispatcher, DispatchConfig};
pub use rate_limit::RollingRateLimiter;
