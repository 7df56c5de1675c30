//! narrative-runner: daily, monthly and backfill passes over the entity store.
//!
//! Usage:
//!   narrative-runner daily --date 2025-03-05 --input batches/2025-03-05.json
//!   narrative-runner monthly --date 2025-03-31
//!   narrative-runner backfill --target 252
//!   narrative-runner daily --input batch.json --dry-run   # compute, write nothing

use anyhow::{Context, Result};
use chrono::NaiveDate;
use daily_recorder::{decode_batch, DailyRecorder, EngineConfig, RunReport, RunStatus, Universe};
use forecast_client::{ForecastProvider, ForecastService, HttpForecastProvider};
use narrative_core::RecordStore;
use narrative_store::{JsonFileStore, MemoryStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use weight_calibrator::CalibrationHistoryStore;

const DEFAULT_BACKFILL_TARGET: usize = 252;

fn init_tracing() {
    let json_logs = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn parse_date(args: &[String]) -> Result<Option<NaiveDate>> {
    flag_value(args, "--date")
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("--date must be YYYY-MM-DD, got {s}"))
        })
        .transpose()
}

fn finish(report: &RunReport) -> Result<()> {
    if report.status() == RunStatus::Failed {
        anyhow::bail!("{:?} pass for {} failed for every entity", report.pass, report.date);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("");
    let dry_run = args.iter().any(|a| a == "--dry-run");

    let config = EngineConfig::from_env().context("Invalid engine configuration")?;
    let universe = Universe::load(&config.universe_path)?;

    let file_store = JsonFileStore::new(&config.data_dir);
    let store: Arc<dyn RecordStore> = if dry_run {
        tracing::info!("Dry run: working on an in-memory copy of {}", config.data_dir.display());
        Arc::new(MemoryStore::snapshot_of(&file_store).await?)
    } else {
        Arc::new(file_store)
    };

    let provider: Option<Arc<dyn ForecastProvider>> = match &config.forecast_service_url {
        Some(url) => Some(Arc::new(
            HttpForecastProvider::new(url.clone(), config.forecast_timeout())
                .context("Failed to build forecast client")?,
        )),
        None => {
            tracing::info!("FORECAST_SERVICE_URL not set, historical forecasts only");
            None
        }
    };
    let forecasts = ForecastService::new(provider, config.forecast_timeout());

    let recorder = DailyRecorder::new(store, universe, config.policy())
        .context("Universe failed validation")?
        .with_forecasts(forecasts, config.forecast_horizon_days)
        .with_propagation_window(config.propagation_window_days);

    let today = chrono::Local::now().date_naive();

    match command {
        "daily" => {
            let input = flag_value(&args, "--input").context("daily requires --input <batch.json>")?;
            let text = tokio::fs::read_to_string(input)
                .await
                .with_context(|| format!("Failed to read batch {input}"))?;
            let batch = decode_batch(&text).with_context(|| format!("Failed to decode batch {input}"))?;
            if let Some(date) = parse_date(&args)? {
                if date != batch.date {
                    anyhow::bail!("--date {date} does not match batch date {}", batch.date);
                }
            }

            let summary = recorder.run_daily(&batch).await?;
            tracing::info!(
                copied = summary.propagation.copied,
                targets = summary.propagation.updated_targets.len(),
                "Daily run complete"
            );
            finish(&summary.recording)?;
        }
        "monthly" => {
            let date = parse_date(&args)?.unwrap_or(today);
            let recorder = if dry_run {
                recorder
            } else {
                let history = CalibrationHistoryStore::connect(&config.database_url)
                    .await
                    .with_context(|| format!("Failed to open calibration history {}", config.database_url))?;
                recorder.with_calibration_history(history)
            };
            let report = recorder.run_monthly(date).await?;
            finish(&report)?;
        }
        "backfill" => {
            let target = flag_value(&args, "--target")
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("--target must be a positive integer")?
                .unwrap_or(DEFAULT_BACKFILL_TARGET);
            let report = recorder.run_backfill(today, target).await?;
            finish(&report)?;
        }
        other => {
            anyhow::bail!(
                "unknown command {other:?}; expected one of: daily, monthly, backfill"
            );
        }
    }

    Ok(())
}
