/// Database row types for the schedule tables.
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ScheduleRow {
    pub schedule_id: String,
    pub date: String,
    pub overall_score: f64,
    #[allow(dead_code)]
    pub created_at: i64, // milliseconds since epoch
}

#[derive(Debug, Clone, FromRow)]
pub struct ScheduleItemRow {
    pub burn_request_id: i64,
    pub farm_id: i64,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct ScheduleExclusionRow {
    pub burn_request_id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct BurnHistoryRow {
    #[allow(dead_code)]
    pub farm_id: i64,
    pub success_rate: f64,
    pub avg_duration_hours: f64,
    pub conflict_rate: f64,
    pub good_weather_rate: f64,
    pub on_time_rate: f64,
    pub experience: f64,
    pub no_violation_rate: f64,
    pub recent_success: f64,
    pub seasonal_success: f64,
}
