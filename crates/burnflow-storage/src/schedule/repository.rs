use async_trait::async_trait;
use burnflow_core::domain::BurnHistory;
use burnflow_core::ports::{Relational, ScheduleRecord, ScheduledBurnRow};
use chrono::{NaiveDate, Utc};
use sqlx::{query, query_as, SqlitePool};

use super::models::{BurnHistoryRow, ScheduleExclusionRow, ScheduleItemRow, ScheduleRow};

pub struct SqliteRelational {
    pool: SqlitePool,
}

impl SqliteRelational {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Upsert a farm's historical success features (fed into burn vectors).
    pub async fn upsert_history(&self, farm_id: u64, history: &BurnHistory) -> anyhow::Result<()> {
        query(
            "INSERT INTO burn_history
             (farm_id, success_rate, avg_duration_hours, conflict_rate, good_weather_rate,
              on_time_rate, experience, no_violation_rate, recent_success, seasonal_success)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(farm_id) DO UPDATE SET
                success_rate = excluded.success_rate,
                avg_duration_hours = excluded.avg_duration_hours,
                conflict_rate = excluded.conflict_rate,
                good_weather_rate = excluded.good_weather_rate,
                on_time_rate = excluded.on_time_rate,
                experience = excluded.experience,
                no_violation_rate = excluded.no_violation_rate,
                recent_success = excluded.recent_success,
                seasonal_success = excluded.seasonal_success",
        )
        .bind(farm_id as i64)
        .bind(history.success_rate)
        .bind(history.avg_duration_hours)
        .bind(history.conflict_rate)
        .bind(history.good_weather_rate)
        .bind(history.on_time_rate)
        .bind(history.experience)
        .bind(history.no_violation_rate)
        .bind(history.recent_success)
        .bind(history.seasonal_success)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Relational for SqliteRelational {
    async fn insert_schedule(&self, record: &ScheduleRecord) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        query(
            "INSERT INTO schedules (schedule_id, date, overall_score, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(schedule_id) DO UPDATE SET
                date = excluded.date,
                overall_score = excluded.overall_score,
                created_at = excluded.created_at",
        )
        .bind(&record.schedule_id)
        .bind(record.date.to_string())
        .bind(record.overall_score)
        .bind(Utc::now().timestamp_millis())
        .execute(&mut *tx)
        .await?;

        // Re-inserting a schedule replaces its items wholesale.
        query("DELETE FROM schedule_items WHERE schedule_id = ?")
            .bind(&record.schedule_id)
            .execute(&mut *tx)
            .await?;
        query("DELETE FROM schedule_exclusions WHERE schedule_id = ?")
            .bind(&record.schedule_id)
            .execute(&mut *tx)
            .await?;

        for item in &record.scheduled {
            query(
                "INSERT INTO schedule_items
                 (schedule_id, burn_request_id, farm_id, start_time, end_time)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&record.schedule_id)
            .bind(item.burn_request_id as i64)
            .bind(item.farm_id as i64)
            .bind(&item.start_time)
            .bind(&item.end_time)
            .execute(&mut *tx)
            .await?;
        }

        for (burn_request_id, reason) in &record.unscheduled {
            query(
                "INSERT INTO schedule_exclusions (schedule_id, burn_request_id, reason)
                 VALUES (?, ?, ?)",
            )
            .bind(&record.schedule_id)
            .bind(*burn_request_id as i64)
            .bind(reason)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_schedule(&self, schedule_id: &str) -> anyhow::Result<Option<ScheduleRecord>> {
        let Some(row) = query_as::<_, ScheduleRow>(
            "SELECT schedule_id, date, overall_score, created_at
             FROM schedules WHERE schedule_id = ?",
        )
        .bind(schedule_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let items = query_as::<_, ScheduleItemRow>(
            "SELECT burn_request_id, farm_id, start_time, end_time
             FROM schedule_items WHERE schedule_id = ?
             ORDER BY burn_request_id",
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;

        let exclusions = query_as::<_, ScheduleExclusionRow>(
            "SELECT burn_request_id, reason
             FROM schedule_exclusions WHERE schedule_id = ?
             ORDER BY burn_request_id",
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;

        let date: NaiveDate = row
            .date
            .parse()
            .map_err(|e| anyhow::anyhow!("bad date in schedule {schedule_id}: {e}"))?;

        Ok(Some(ScheduleRecord {
            schedule_id: row.schedule_id,
            date,
            overall_score: row.overall_score,
            scheduled: items
                .into_iter()
                .map(|i| ScheduledBurnRow {
                    burn_request_id: i.burn_request_id as u64,
                    farm_id: i.farm_id as u64,
                    start_time: i.start_time,
                    end_time: i.end_time,
                })
                .collect(),
            unscheduled: exclusions
                .into_iter()
                .map(|e| (e.burn_request_id as u64, e.reason))
                .collect(),
        }))
    }

    async fn burn_history(&self, farm_id: u64) -> anyhow::Result<Option<BurnHistory>> {
        let row = query_as::<_, BurnHistoryRow>(
            "SELECT farm_id, success_rate, avg_duration_hours, conflict_rate,
                    good_weather_rate, on_time_rate, experience, no_violation_rate,
                    recent_success, seasonal_success
             FROM burn_history WHERE farm_id = ?",
        )
        .bind(farm_id as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| BurnHistory {
            success_rate: r.success_rate,
            avg_duration_hours: r.avg_duration_hours,
            conflict_rate: r.conflict_rate,
            good_weather_rate: r.good_weather_rate,
            on_time_rate: r.on_time_rate,
            experience: r.experience,
            no_violation_rate: r.no_violation_rate,
            recent_success: r.recent_success,
            seasonal_success: r.seasonal_success,
        }))
    }
}
