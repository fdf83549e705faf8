use crate::domain::BurnHistory;
use async_trait::async_trait;
use chrono::NaiveDate;

/// One scheduled burn inside a persisted schedule. Times are stored as
/// "HH:MM" in the local time of the scheduling date.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledBurnRow {
    pub burn_request_id: u64,
    pub farm_id: u64,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRecord {
    pub schedule_id: String,
    pub date: NaiveDate,
    pub overall_score: f64,
    pub scheduled: Vec<ScheduledBurnRow>,
    pub unscheduled: Vec<(u64, String)>,
}

/// Narrow relational interface: persist schedules, read historical per-farm
/// features for the coordinator's burn vector.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Relational: Send + Sync {
    async fn insert_schedule(&self, record: &ScheduleRecord) -> anyhow::Result<()>;

    async fn get_schedule(&self, schedule_id: &str) -> anyhow::Result<Option<ScheduleRecord>>;

    /// Historical success features for a farm, if any burns are on record.
    async fn burn_history(&self, farm_id: u64) -> anyhow::Result<Option<BurnHistory>>;
}
