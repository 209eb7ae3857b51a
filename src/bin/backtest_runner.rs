use dotenvy::dotenv;
use eyre::{Result, eyre};
use std::env;
use std::path::PathBuf;
use tracing::info;

use marketing_budget_bot::backtest;
use marketing_budget_bot::config::BacktestConfig;
use marketing_budget_bot::data_ingestion::{daily, validate};
use marketing_budget_bot::logging;
use marketing_budget_bot::model::regression::OlsBackend;
use marketing_budget_bot::pipeline::aggregate;

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logging
    logging::init_logging();

    // Load configuration
    let cfg = BacktestConfig::from_env();
    info!(?cfg, "Configuration loaded and logging initialized");

    let path: PathBuf = env::args()
        .nth(1)
        .ok_or_else(|| eyre!("Usage: backtest_runner <daily_records.json>"))?
        .into();

    let raw = daily::load_raw_records(&path)?;
    let records = validate::validate_raw_data(&raw)?;
    info!(rows = records.len(), "Validated daily records");

    let weekly = aggregate::aggregate_weekly(&records);
    info!(rows = weekly.len(), "Aggregated weekly metrics");

    let results = backtest::run_backtest(&weekly, &cfg, &OlsBackend)?;

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
