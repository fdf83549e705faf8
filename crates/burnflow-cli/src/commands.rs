use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use burnflow_core::alerts::{AlertDispatcher, DispatchConfig};
use burnflow_core::coordinator::validate_request;
use burnflow_core::domain::{
    AlertChannel, BurnRequest, GeoPoint, PipelineError, Recipient, TimeWindow,
};
use burnflow_core::optimizer::{
    optimize as run_optimizer, slot_window, AnnealingConfig, OptimizeInput,
};
use burnflow_core::pipeline::{BatchOptions, Pipeline};
use burnflow_core::ports::WeatherProvider;
use burnflow_core::smoke::predict as run_predictor;
use burnflow_core::weather::WeatherAnalyzer;
use burnflow_storage::{init_db, SqliteRelational, SqliteVectorStore};
use chrono::{NaiveDate, Utc};
use colored::Colorize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::providers::{ClimatologyProvider, ConsoleTransport, FileWeatherProvider};

/// CLI failure with its process exit code: 2 invalid input, 3 external
/// unavailable, 4 cancelled, 1 anything else.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    ExternalUnavailable(String),
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn code(&self) -> u8 {
        match self {
            CliError::InvalidInput(_) => 2,
            CliError::ExternalUnavailable(_) => 3,
            CliError::Cancelled => 4,
            CliError::Other(_) => 1,
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidInput { .. } | PipelineError::Conflict(_) => {
                CliError::InvalidInput(err.to_string())
            }
            PipelineError::ExternalUnavailable(_) => CliError::ExternalUnavailable(err.to_string()),
            PipelineError::Cancelled => CliError::Cancelled,
            PipelineError::InternalInvariant(_) => CliError::Other(anyhow::anyhow!(err)),
        }
    }
}

fn parse_date(date: &str) -> Result<NaiveDate, CliError> {
    date.parse()
        .map_err(|_| CliError::InvalidInput(format!("bad date '{date}', expected YYYY-MM-DD")))
}

fn load_requests(path: &Path) -> Result<Vec<BurnRequest>, CliError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CliError::InvalidInput(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| CliError::InvalidInput(format!("bad request file {}: {e}", path.display())))
}

fn build_provider(weather_file: Option<&Path>) -> Result<Arc<dyn WeatherProvider>, CliError> {
    match weather_file {
        Some(path) => {
            let provider = FileWeatherProvider::load(path).map_err(|e| {
                CliError::InvalidInput(format!("bad weather file {}: {e}", path.display()))
            })?;
            Ok(Arc::new(provider))
        }
        None => Ok(Arc::new(ClimatologyProvider)),
    }
}

/// Cancellation on Ctrl-C, checked cooperatively by every stage.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing with best-so-far");
            handle.cancel();
        }
    });
    cancel
}

fn annealing_config(max_iter: Option<u64>) -> AnnealingConfig {
    AnnealingConfig {
        max_iterations: max_iter.unwrap_or_else(|| AnnealingConfig::default().max_iterations),
        ..AnnealingConfig::default()
    }
}

// ============================================================================
// RUN
// ============================================================================

pub async fn run(
    db: &Path,
    weather_file: Option<&Path>,
    date: &str,
    requests_path: &Path,
    seed: u64,
    max_iter: Option<u64>,
) -> Result<(), CliError> {
    let date = parse_date(date)?;
    let requests = load_requests(requests_path)?;
    if requests.is_empty() {
        return Err(CliError::InvalidInput("request file is empty".to_string()));
    }

    let pool = init_db(db.to_str().unwrap_or("burnflow.db"))
        .await
        .map_err(|e| CliError::ExternalUnavailable(format!("database unavailable: {e}")))?;

    let provider = build_provider(weather_file)?;
    let relational = Arc::new(SqliteRelational::new(pool.clone()));
    let vectors = Arc::new(SqliteVectorStore::new(pool));
    let dispatcher = Arc::new(AlertDispatcher::new(
        Arc::new(ConsoleTransport),
        DispatchConfig::default(),
    ));
    let pipeline = Pipeline::new(
        Arc::new(WeatherAnalyzer::new(provider)),
        relational,
        vectors,
        dispatcher,
    );

    // Farm owners receive alerts on SMS by default.
    let recipients: Vec<Recipient> = requests
        .iter()
        .map(|r| Recipient {
            id: r.farm_id,
            preferred_channel: AlertChannel::Sms,
        })
        .collect();

    let options = BatchOptions {
        seed,
        annealing: annealing_config(max_iter),
        ..BatchOptions::default()
    };
    let cancel = cancel_on_ctrl_c();

    let result = pipeline
        .coordinate_batch(date, requests, &recipients, &options, &cancel)
        .await
        .map_err(CliError::from)?;

    println!("\n{} {}", "schedule".green().bold(), result.schedule_id);
    println!(
        "  score {:.3} | scheduled {} | unscheduled {} | iterations {} | reheats {}",
        result.metrics.overall_score,
        result.metrics.scheduled_count,
        result.metrics.unscheduled_count,
        result.metrics.iterations,
        result.metrics.reheats,
    );
    println!(
        "  peak slot load {} burns (incl. 1h buffer)",
        result.peak_buffered_occupancy
    );
    for (id, assignment) in &result.schedule.assignments {
        let window = slot_window(assignment.start_slot, assignment.end_slot);
        println!(
            "  {} burn {:>4}  {} - {}",
            "ok".green(),
            id,
            TimeWindow::format_hhmm(window.start_min),
            TimeWindow::format_hhmm(window.end_min)
        );
    }
    for (id, reason) in &result.unscheduled {
        println!("  {} burn {:>4}  {}", "--".yellow(), id, reason);
    }
    for warning in &result.warnings {
        println!("  {} {}", "warn".yellow().bold(), warning);
    }
    println!(
        "  alerts: {} queued, {} delivered, {} dropped",
        result.alerts_queued,
        result.dispatch.delivered.len(),
        result.dispatch.dropped.len()
    );

    if cancel.is_cancelled() {
        return Err(CliError::Cancelled);
    }
    Ok(())
}

// ============================================================================
// WEATHER
// ============================================================================

pub async fn weather(
    weather_file: Option<&Path>,
    lat: f64,
    lon: f64,
) -> Result<(), CliError> {
    let provider = build_provider(weather_file)?;
    let analyzer = WeatherAnalyzer::new(provider);
    let analysis = analyzer
        .analyze(GeoPoint::new(lat, lon))
        .await
        .map_err(CliError::from)?;

    let current = &analysis.current;
    println!("{} ({lat:.3}, {lon:.3})", "weather".green().bold());
    println!(
        "  {:.0}F, humidity {:.0}%, wind {:.1} mph @ {:.0} deg, cloud {:.0}%, precip {:.0}%",
        current.temperature_f,
        current.humidity_pct,
        current.wind_speed_mph,
        current.wind_direction_deg,
        current.cloud_cover_pct,
        current.precipitation_prob_pct,
    );
    println!("  suitability: {:.2}", analysis.suitability);
    if analysis.burn_windows.is_empty() {
        println!("  no acceptable burn windows in the next 24h");
    }
    for window in &analysis.burn_windows {
        println!(
            "  window {} to {}",
            window.start.format("%H:%M"),
            window.end.format("%H:%M")
        );
    }
    Ok(())
}

// ============================================================================
// PREDICT
// ============================================================================

pub async fn predict(
    weather_file: Option<&Path>,
    request_id: u64,
    requests_path: &Path,
) -> Result<(), CliError> {
    let requests = load_requests(requests_path)?;
    let request = requests
        .into_iter()
        .find(|r| r.id == request_id)
        .ok_or_else(|| {
            CliError::InvalidInput(format!("request {request_id} not found in file"))
        })?;

    let fallback = BatchOptions::default().fallback_centroid;
    let validated = validate_request(request, Utc::now(), None, fallback)
        .map_err(|e| CliError::InvalidInput(e.to_string()))?;

    let provider = build_provider(weather_file)?;
    let analyzer = WeatherAnalyzer::new(provider);
    let analysis = analyzer
        .analyze(validated.centroid)
        .await
        .map_err(CliError::from)?;

    let prediction =
        run_predictor(&validated, &analysis.current).map_err(CliError::from)?;

    println!("{} burn {}", "prediction".green().bold(), request_id);
    println!(
        "  emissions {:.1} kg PM2.5 over {:.1} h ({:.1} g/s), stability {}",
        prediction.total_emissions,
        prediction.burn_duration_hours,
        prediction.emission_rate,
        prediction.stability_class.as_char(),
    );
    println!(
        "  max radius {:.0} m, affected area {:.1} km2, confidence {:.2}",
        prediction.max_radius_m, prediction.affected_area_km2, prediction.confidence
    );
    println!("  centerline PM2.5 (ug/m3):");
    for sample in &prediction.concentration_field {
        let mut flags = String::new();
        if sample.exceeds_hazardous {
            flags = " HAZARDOUS".red().bold().to_string();
        } else if sample.exceeds_unhealthy {
            flags = " unhealthy".red().to_string();
        } else if sample.exceeds_daily {
            flags = " >daily".yellow().to_string();
        }
        println!(
            "    {:>6.0} m  {:>10.2}{flags}",
            sample.distance_m, sample.centerline_pm25_ug_m3
        );
    }
    Ok(())
}

// ============================================================================
// OPTIMIZE
// ============================================================================

pub async fn optimize(
    weather_file: Option<&Path>,
    date: &str,
    requests_path: &Path,
    seed: u64,
    max_iter: Option<u64>,
) -> Result<(), CliError> {
    let date = parse_date(date)?;
    let requests = load_requests(requests_path)?;

    let now = Utc::now();
    let fallback = BatchOptions::default().fallback_centroid;
    let provider = build_provider(weather_file)?;
    let analyzer = WeatherAnalyzer::new(provider);

    let mut validated = Vec::new();
    for request in requests {
        let id = request.id;
        match validate_request(request, now, None, fallback) {
            Ok(v) => validated.push(v),
            Err(e) => println!("  {} burn {:>4}  {}", "--".yellow(), id, e),
        }
    }

    let mut suitability = BTreeMap::new();
    let mut predictions = BTreeMap::new();
    let mut analyzed = Vec::new();
    for v in validated {
        let id = v.request.id;
        match analyzer.analyze(v.centroid).await {
            Ok(analysis) => match run_predictor(&v, &analysis.current) {
                Ok(prediction) => {
                    suitability.insert(id, analysis.suitability);
                    predictions.insert(id, prediction);
                    analyzed.push(v);
                }
                Err(e) => println!("  {} burn {:>4}  {}", "--".yellow(), id, e),
            },
            Err(e) => println!("  {} burn {:>4}  {}", "--".yellow(), id, e),
        }
    }
    burnflow_core::smoke::annotate_conflicts(&analyzed, &mut predictions);

    let cancel = cancel_on_ctrl_c();
    let input = OptimizeInput {
        date,
        requests: &analyzed,
        suitability: &suitability,
        predictions: &predictions,
        seed,
    };
    let (schedule, metrics) = run_optimizer(&input, &annealing_config(max_iter), &cancel);

    println!("\n{} {}", "optimized".green().bold(), date);
    println!(
        "  score {:.3} | scheduled {} | compliance {:.2} | iterations {} | reheats {}",
        metrics.overall_score,
        metrics.scheduled_count,
        metrics.time_window_compliance,
        metrics.iterations,
        metrics.reheats,
    );
    for (id, assignment) in &schedule.assignments {
        let window = slot_window(assignment.start_slot, assignment.end_slot);
        println!(
            "  {} burn {:>4}  {} - {}",
            "ok".green(),
            id,
            TimeWindow::format_hhmm(window.start_min),
            TimeWindow::format_hhmm(window.end_min)
        );
    }
    for (id, reason) in &schedule.unscheduled {
        println!("  {} burn {:>4}  {}", "--".yellow(), id, reason);
    }

    if cancel.is_cancelled() {
        return Err(CliError::Cancelled);
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
