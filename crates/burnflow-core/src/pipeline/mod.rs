/// Batch orchestration: the five-stage pipeline behind `coordinate_batch`.
///
/// Stages run sequentially; per-request work inside a stage fans out on a
/// bounded worker pool. Each stage consumes the previous stage's snapshot
/// and publishes its own; failures later in the pipeline never invalidate
/// earlier outputs. Only a `Conflict` (hard data invariant) aborts a batch.
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::alerts::AlertDispatcher;
use crate::coordinator::validate_request;
use crate::domain::{
    Alert, AlertChannel, AlertPriority, BurnRequest, ChannelStates, DispatchReport, GeoPoint,
    OptimizationMetrics, PipelineError, Prediction, Recipient, Schedule, TimeWindow,
    ValidatedRequest, VectorKind, WeatherAnalysis,
};
use crate::optimizer::{optimize, AnnealingConfig, OptimizeInput};
use crate::ports::{Relational, ScheduleRecord, ScheduledBurnRow, VectorStore};
use crate::smoke::{annotate_conflicts, predict};
use crate::weather::WeatherAnalyzer;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub seed: u64,
    pub annealing: AnnealingConfig,
    /// Centroid fallback for degenerate field polygons.
    pub fallback_centroid: GeoPoint,
    /// Bounded fan-out inside each stage.
    pub worker_concurrency: usize,
    pub channel_states: ChannelStates,
    /// Caller-stated alert overload.
    pub overload: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            annealing: AnnealingConfig::default(),
            fallback_centroid: GeoPoint::new(38.5, -121.5),
            worker_concurrency: default_concurrency(),
            channel_states: ChannelStates::new(),
            overload: false,
        }
    }
}

pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .min(16)
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub schedule_id: String,
    pub schedule: Schedule,
    pub metrics: OptimizationMetrics,
    /// Every excluded or unplaced request with its reason, across all
    /// stages.
    pub unscheduled: Vec<(u64, String)>,
    /// Busiest slot's burn count with the one-hour accounting buffer
    /// applied around each assignment. Reporting only, never a constraint.
    pub peak_buffered_occupancy: usize,
    pub alerts_queued: usize,
    pub dispatch: DispatchReport,
    pub warnings: Vec<String>,
}

fn peak_buffered_occupancy(schedule: &Schedule) -> usize {
    schedule
        .buffered_occupancy(crate::optimizer::slot_count())
        .iter()
        .map(|ids| ids.len())
        .max()
        .unwrap_or(0)
}

pub struct Pipeline {
    weather: Arc<WeatherAnalyzer>,
    relational: Arc<dyn Relational>,
    vectors: Arc<dyn VectorStore>,
    dispatcher: Arc<AlertDispatcher>,
}

impl Pipeline {
    pub fn new(
        weather: Arc<WeatherAnalyzer>,
        relational: Arc<dyn Relational>,
        vectors: Arc<dyn VectorStore>,
        dispatcher: Arc<AlertDispatcher>,
    ) -> Self {
        Self {
            weather,
            relational,
            vectors,
            dispatcher,
        }
    }

    /// Run the full pipeline for one scheduling day.
    pub async fn coordinate_batch(
        &self,
        date: NaiveDate,
        requests: Vec<BurnRequest>,
        recipients: &[Recipient],
        options: &BatchOptions,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, PipelineError> {
        let schedule_id = format!("sched-{date}-{:08x}", options.seed);
        let mut warnings = Vec::new();
        let mut unscheduled: Vec<(u64, String)> = Vec::new();

        check_unique_ids(&requests)?;

        // Stage 1: validation + priority + burn vectors.
        let validated = self
            .validate_stage(requests, options, &mut warnings, &mut unscheduled)
            .await;
        tracing::info!(count = validated.len(), "requests validated");

        if cancel.is_cancelled() {
            warnings.push("batch cancelled during validation".to_string());
            return Ok(self.empty_result(date, schedule_id, unscheduled, warnings, options));
        }

        // Stage 2: weather per request centroid.
        let weather = self
            .weather_stage(&validated, options, cancel, &mut warnings)
            .await;
        let (validated, dropped): (Vec<_>, Vec<_>) = validated
            .into_iter()
            .partition(|v| weather.contains_key(&v.request.id));
        for v in dropped {
            unscheduled.push((v.request.id, "weather unavailable".to_string()));
        }
        for (id, analysis) in &weather {
            if let Err(err) = self
                .vectors
                .upsert(VectorKind::Weather, *id, &analysis.embedding)
                .await
            {
                warnings.push(format!("weather vector upsert failed for {id}: {err}"));
            }
        }
        tracing::info!(count = validated.len(), "weather analyzed");

        if cancel.is_cancelled() {
            warnings.push("batch cancelled during weather analysis".to_string());
            return Ok(self.empty_result(date, schedule_id, unscheduled, warnings, options));
        }

        // Stage 3: smoke predictions + pairwise conflicts.
        let (predictions, prediction_failures) = self
            .prediction_stage(&validated, &weather, options)
            .await;
        for (id, reason) in prediction_failures {
            warnings.push(format!("request {id}: {reason}"));
            unscheduled.push((id, reason));
        }
        let validated: Vec<ValidatedRequest> = validated
            .into_iter()
            .filter(|v| predictions.contains_key(&v.request.id))
            .collect();
        tracing::info!(count = predictions.len(), "predictions computed");

        // Stage 4: simulated-annealing optimization.
        let suitability: BTreeMap<u64, f64> = weather
            .iter()
            .map(|(id, analysis)| (*id, analysis.suitability))
            .collect();
        let (schedule, metrics) = {
            let input = OptimizeInput {
                date,
                requests: &validated,
                suitability: &suitability,
                predictions: &predictions,
                seed: options.seed,
            };
            optimize(&input, &options.annealing, cancel)
        };
        for (&id, reason) in &schedule.unscheduled {
            unscheduled.push((id, reason.clone()));
        }

        if let Err(err) = self
            .relational
            .insert_schedule(&to_schedule_record(&schedule_id, &schedule, &validated, &metrics))
            .await
        {
            warnings.push(format!("schedule not persisted: {err}"));
        }

        // Stage 5: alerts.
        let alerts = build_alerts(&schedule_id, &schedule, &validated, recipients);
        let alerts_queued = alerts.len();
        let dispatch = self
            .dispatcher
            .dispatch(
                alerts,
                recipients,
                &options.channel_states,
                options.overload,
                Utc::now(),
            )
            .await;

        Ok(BatchResult {
            peak_buffered_occupancy: peak_buffered_occupancy(&schedule),
            schedule_id,
            schedule,
            metrics,
            unscheduled,
            alerts_queued,
            dispatch,
            warnings,
        })
    }

    fn empty_result(
        &self,
        date: NaiveDate,
        schedule_id: String,
        unscheduled: Vec<(u64, String)>,
        warnings: Vec<String>,
        options: &BatchOptions,
    ) -> BatchResult {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let suitability = BTreeMap::new();
        let predictions = BTreeMap::new();
        let input = OptimizeInput {
            date,
            requests: &[],
            suitability: &suitability,
            predictions: &predictions,
            seed: options.seed,
        };
        let (schedule, metrics) = optimize(&input, &options.annealing, &cancel);
        BatchResult {
            peak_buffered_occupancy: peak_buffered_occupancy(&schedule),
            schedule_id,
            schedule,
            metrics,
            unscheduled,
            alerts_queued: 0,
            dispatch: DispatchReport::default(),
            warnings,
        }
    }

    async fn validate_stage(
        &self,
        requests: Vec<BurnRequest>,
        options: &BatchOptions,
        warnings: &mut Vec<String>,
        unscheduled: &mut Vec<(u64, String)>,
    ) -> Vec<ValidatedRequest> {
        let now = Utc::now();
        let mut validated = Vec::with_capacity(requests.len());

        for request in requests {
            let id = request.id;
            let history = match self.relational.burn_history(request.farm_id).await {
                Ok(history) => history,
                Err(err) => {
                    warnings.push(format!("history lookup failed for farm {}: {err}", request.farm_id));
                    None
                }
            };
            match validate_request(request, now, history.as_ref(), options.fallback_centroid) {
                Ok(v) => {
                    if let Err(err) = self
                        .vectors
                        .upsert(VectorKind::Burn, id, &v.feature_vector)
                        .await
                    {
                        warnings.push(format!("burn vector upsert failed for {id}: {err}"));
                    }
                    validated.push(v);
                }
                Err(reason) => {
                    warnings.push(format!("request {id} rejected: {reason}"));
                    unscheduled.push((id, reason.to_string()));
                }
            }
        }

        validated
    }

    /// Fetch weather for every request centroid on the bounded pool. The
    /// cache collapses nearby centroids to one upstream call.
    async fn weather_stage(
        &self,
        validated: &[ValidatedRequest],
        options: &BatchOptions,
        cancel: &CancellationToken,
        warnings: &mut Vec<String>,
    ) -> BTreeMap<u64, WeatherAnalysis> {
        let results: Vec<(u64, Result<WeatherAnalysis, PipelineError>)> =
            stream::iter(validated.iter().map(|v| {
                let analyzer = Arc::clone(&self.weather);
                let id = v.request.id;
                let centroid = v.centroid;
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (id, Err(PipelineError::Cancelled));
                    }
                    (id, analyzer.analyze(centroid).await)
                }
            }))
            .buffer_unordered(options.worker_concurrency.max(1))
            .collect()
            .await;

        let mut weather = BTreeMap::new();
        for (id, result) in results {
            match result {
                Ok(analysis) => {
                    weather.insert(id, analysis);
                }
                Err(PipelineError::Cancelled) => {}
                Err(err) => {
                    warnings.push(format!("request {id}: {err}"));
                }
            }
        }
        weather
    }

    /// Pure-CPU prediction fan-out; each job runs on the blocking pool.
    async fn prediction_stage(
        &self,
        validated: &[ValidatedRequest],
        weather: &BTreeMap<u64, WeatherAnalysis>,
        options: &BatchOptions,
    ) -> (BTreeMap<u64, Prediction>, Vec<(u64, String)>) {
        let jobs: Vec<(ValidatedRequest, crate::domain::WeatherSample)> = validated
            .iter()
            .filter_map(|v| {
                weather
                    .get(&v.request.id)
                    .map(|analysis| (v.clone(), analysis.current.clone()))
            })
            .collect();

        let results: Vec<(u64, Result<Prediction, PipelineError>)> =
            stream::iter(jobs.into_iter().map(|(v, sample)| async move {
                let id = v.request.id;
                let joined = tokio::task::spawn_blocking(move || predict(&v, &sample)).await;
                match joined {
                    Ok(result) => (id, result),
                    Err(err) => (
                        id,
                        Err(PipelineError::InternalInvariant(format!(
                            "prediction task panicked: {err}"
                        ))),
                    ),
                }
            }))
            .buffer_unordered(options.worker_concurrency.max(1))
            .collect()
            .await;

        let mut predictions = BTreeMap::new();
        let mut failures = Vec::new();
        for (id, result) in results {
            match result {
                Ok(prediction) => {
                    predictions.insert(id, prediction);
                }
                Err(err) => failures.push((id, err.to_string())),
            }
        }

        annotate_conflicts(validated, &mut predictions);

        for (id, prediction) in &predictions {
            if let Err(err) = self
                .vectors
                .upsert(VectorKind::Plume, *id, &prediction.plume_vector)
                .await
            {
                tracing::warn!(request = *id, error = %err, "plume vector upsert failed");
            }
        }

        (predictions, failures)
    }
}

/// Duplicate request ids are a hard data invariant violation.
fn check_unique_ids(requests: &[BurnRequest]) -> Result<(), PipelineError> {
    let mut seen = std::collections::BTreeSet::new();
    for request in requests {
        if !seen.insert(request.id) {
            return Err(PipelineError::Conflict(format!(
                "duplicate burn request id {}",
                request.id
            )));
        }
    }
    Ok(())
}

fn to_schedule_record(
    schedule_id: &str,
    schedule: &Schedule,
    validated: &[ValidatedRequest],
    metrics: &OptimizationMetrics,
) -> ScheduleRecord {
    let farm_of: BTreeMap<u64, u64> = validated
        .iter()
        .map(|v| (v.request.id, v.request.farm_id))
        .collect();
    ScheduleRecord {
        schedule_id: schedule_id.to_string(),
        date: schedule.date,
        overall_score: metrics.overall_score,
        scheduled: schedule
            .assignments
            .iter()
            .map(|(id, a)| {
                let window = crate::optimizer::slot_window(a.start_slot, a.end_slot);
                ScheduledBurnRow {
                    burn_request_id: *id,
                    farm_id: farm_of.get(id).copied().unwrap_or_default(),
                    start_time: TimeWindow::format_hhmm(window.start_min),
                    end_time: TimeWindow::format_hhmm(window.end_min),
                }
            })
            .collect(),
        unscheduled: schedule
            .unscheduled
            .iter()
            .map(|(id, reason)| (*id, reason.clone()))
            .collect(),
    }
}

fn build_alerts(
    schedule_id: &str,
    schedule: &Schedule,
    validated: &[ValidatedRequest],
    recipients: &[Recipient],
) -> Vec<Alert> {
    let preferred: BTreeMap<u64, AlertChannel> = recipients
        .iter()
        .map(|r| (r.id, r.preferred_channel))
        .collect();
    let farm_of: BTreeMap<u64, u64> = validated
        .iter()
        .map(|v| (v.request.id, v.request.farm_id))
        .collect();
    let now = Utc::now();
    let mut alerts = Vec::new();

    for (id, assignment) in &schedule.assignments {
        let Some(&farm_id) = farm_of.get(id) else {
            continue;
        };
        let window = crate::optimizer::slot_window(assignment.start_slot, assignment.end_slot);
        alerts.push(Alert {
            recipient_id: farm_id,
            channel: preferred.get(&farm_id).copied().unwrap_or(AlertChannel::Sms),
            priority: AlertPriority::Medium,
            payload: format!(
                "burn {id} scheduled {} to {}",
                TimeWindow::format_hhmm(window.start_min),
                TimeWindow::format_hhmm(window.end_min)
            ),
            created_at: now,
            dedup_key: format!("{schedule_id}:scheduled:{id}"),
        });
    }

    for (id, reason) in &schedule.unscheduled {
        let Some(&farm_id) = farm_of.get(id) else {
            continue;
        };
        alerts.push(Alert {
            recipient_id: farm_id,
            channel: preferred.get(&farm_id).copied().unwrap_or(AlertChannel::Sms),
            priority: AlertPriority::Low,
            payload: format!("burn {id} not scheduled: {reason}"),
            created_at: now,
            dedup_key: format!("{schedule_id}:unscheduled:{id}"),
        });
    }

    alerts
}
