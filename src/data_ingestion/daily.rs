use chrono::NaiveDate;
use eyre::{Result, WrapErr};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// One day of marketing activity for a single channel, after validation
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub channel: String,
    pub spend: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub conversions: f64,
    pub revenue: f64,
}

/// Read raw daily records from a JSON file (an array of objects).
///
/// Rows come back untyped so the validator can report schema problems
/// precisely instead of failing on deserialization.
pub fn load_raw_records(path: &Path) -> Result<Vec<serde_json::Value>> {
    let contents = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read daily data file {}", path.display()))?;
    let rows: Vec<serde_json::Value> = serde_json::from_str(&contents)
        .wrap_err_with(|| format!("{} is not a JSON array of records", path.display()))?;
    Ok(rows)
}
