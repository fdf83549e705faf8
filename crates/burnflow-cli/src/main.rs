use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;
mod providers;

use commands::CliError;

/// burnflow - agricultural burn coordination pipeline
#[derive(Parser)]
#[command(name = "burnflow")]
#[command(about = "Coordinate, predict, and schedule agricultural burns", long_about = None)]
struct Cli {
    /// SQLite database path
    #[arg(long, default_value = "burnflow.db")]
    db: PathBuf,

    /// Weather conditions file (JSON); deterministic climatology when absent
    #[arg(long)]
    weather: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for one day
    Run {
        /// Scheduling date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Burn request file (JSON array)
        #[arg(long)]
        requests: PathBuf,
        /// Optimizer seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Annealing iteration cap
        #[arg(long)]
        max_iter: Option<u64>,
    },
    /// Analyze weather for a location
    Weather {
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lon: f64,
    },
    /// Predict smoke dispersion for a single request
    Predict {
        /// Request id to predict
        #[arg(long)]
        request_id: u64,
        /// Burn request file (JSON array)
        #[arg(long)]
        requests: PathBuf,
    },
    /// Optimize a day's schedule without persisting or alerting
    Optimize {
        /// Scheduling date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Burn request file (JSON array)
        #[arg(long)]
        requests: PathBuf,
        /// Optimizer seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Annealing iteration cap
        #[arg(long)]
        max_iter: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result: Result<(), CliError> = match cli.command {
        Commands::Run {
            date,
            requests,
            seed,
            max_iter,
        } => commands::run(&cli.db, cli.weather.as_deref(), &date, &requests, seed, max_iter).await,
        Commands::Weather { lat, lon } => {
            commands::weather(cli.weather.as_deref(), lat, lon).await
        }
        Commands::Predict {
            request_id,
            requests,
        } => commands::predict(cli.weather.as_deref(), request_id, &requests).await,
        Commands::Optimize {
            date,
            requests,
            seed,
            max_iter,
        } => commands::optimize(cli.weather.as_deref(), &date, &requests, seed, max_iter).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::from(err.code())
        }
    }
}
