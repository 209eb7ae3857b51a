use chrono::{Local, NaiveDate};
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

use super::daily::DailyRecord;

/// Channels the upstream marketing platforms are known to report
pub const ALLOWED_CHANNELS: [&str; 4] = ["Google Ads", "Meta Ads", "Email", "Affiliate"];

/// Exact column set every raw daily record must carry
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "date",
    "channel",
    "spend",
    "impressions",
    "clicks",
    "conversions",
    "revenue",
];

const NUMERIC_COLUMNS: [&str; 5] = ["spend", "impressions", "clicks", "conversions", "revenue"];

/// Raw-data violations. Each variant names the rule that failed so the
/// caller can surface a descriptive message instead of a coerced dataset.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Row {0} is not a JSON object")]
    NotAnObject(usize),
    #[error("Missing required columns: {0:?}")]
    MissingColumns(Vec<String>),
    #[error("Unexpected extra columns: {0:?}")]
    ExtraColumns(Vec<String>),
    #[error("Null values detected in required columns (row {0})")]
    NullValues(usize),
    #[error("Invalid date format. Expected YYYY-MM-DD, got '{0}'")]
    InvalidDate(String),
    #[error("Future dates detected: {0}")]
    FutureDate(NaiveDate),
    #[error("Invalid channel values detected: {0:?}")]
    InvalidChannels(Vec<String>),
    #[error("Non-numeric value in column '{column}' (row {row})")]
    NonNumeric { column: &'static str, row: usize },
    #[error("Negative values detected in column: {0}")]
    NegativeValues(&'static str),
    #[error("Impressions must be >= clicks")]
    ImpressionsBelowClicks,
    #[error("Clicks must be >= conversions")]
    ClicksBelowConversions,
    #[error("Duplicate (date, channel) rows detected")]
    DuplicateRows,
}

/// Validate raw daily records and convert them into typed rows.
///
/// Fails fast on the first violated rule; the core pipeline downstream
/// assumes this contract holds and does not re-validate.
pub fn validate_raw_data(rows: &[Value]) -> Result<Vec<DailyRecord>, ValidationError> {
    let required: BTreeSet<&str> = REQUIRED_COLUMNS.iter().copied().collect();

    // Schema validation: exact column set on every row
    for (i, row) in rows.iter().enumerate() {
        let obj = row.as_object().ok_or(ValidationError::NotAnObject(i))?;
        let present: BTreeSet<&str> = obj.keys().map(String::as_str).collect();

        let missing: Vec<String> = required.difference(&present).map(|c| c.to_string()).collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingColumns(missing));
        }
        let extra: Vec<String> = present.difference(&required).map(|c| c.to_string()).collect();
        if !extra.is_empty() {
            return Err(ValidationError::ExtraColumns(extra));
        }
    }

    // Null checks
    for (i, row) in rows.iter().enumerate() {
        let obj = row.as_object().ok_or(ValidationError::NotAnObject(i))?;
        if REQUIRED_COLUMNS.iter().any(|c| obj[*c].is_null()) {
            return Err(ValidationError::NullValues(i));
        }
    }

    // Date validation: parseable and not in the future
    let today = Local::now().date_naive();
    let mut dates = Vec::with_capacity(rows.len());
    for row in rows {
        let value = &row["date"];
        // Non-string values are rendered as raw JSON so the error names
        // what was actually seen
        let raw = value
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string());
        let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|_| ValidationError::InvalidDate(raw.clone()))?;
        if date > today {
            return Err(ValidationError::FutureDate(date));
        }
        dates.push(date);
    }

    // Channel validation against the fixed allowed set
    let invalid_channels: BTreeSet<String> = rows
        .iter()
        .filter_map(|row| row["channel"].as_str())
        .filter(|c| !ALLOWED_CHANNELS.contains(c))
        .map(str::to_string)
        .collect();
    if !invalid_channels.is_empty() {
        return Err(ValidationError::InvalidChannels(
            invalid_channels.into_iter().collect(),
        ));
    }

    // Numeric domain rules: parseable and non-negative
    for column in NUMERIC_COLUMNS {
        for (i, row) in rows.iter().enumerate() {
            let value = row[column]
                .as_f64()
                .ok_or(ValidationError::NonNumeric { column, row: i })?;
            if value < 0.0 {
                return Err(ValidationError::NegativeValues(column));
            }
        }
    }

    // Hierarchy rules
    for row in rows {
        let impressions = row["impressions"].as_f64().unwrap_or_default();
        let clicks = row["clicks"].as_f64().unwrap_or_default();
        let conversions = row["conversions"].as_f64().unwrap_or_default();
        if impressions < clicks {
            return Err(ValidationError::ImpressionsBelowClicks);
        }
        if clicks < conversions {
            return Err(ValidationError::ClicksBelowConversions);
        }
    }

    // Duplicate check on (date, channel)
    let mut seen: BTreeSet<(NaiveDate, &str)> = BTreeSet::new();
    for (row, date) in rows.iter().zip(&dates) {
        let channel = row["channel"].as_str().unwrap_or_default();
        if !seen.insert((*date, channel)) {
            return Err(ValidationError::DuplicateRows);
        }
    }

    let records = rows
        .iter()
        .zip(dates)
        .map(|(row, date)| DailyRecord {
            date,
            channel: row["channel"].as_str().unwrap_or_default().to_string(),
            spend: row["spend"].as_f64().unwrap_or_default(),
            impressions: row["impressions"].as_f64().unwrap_or_default(),
            clicks: row["clicks"].as_f64().unwrap_or_default(),
            conversions: row["conversions"].as_f64().unwrap_or_default(),
            revenue: row["revenue"].as_f64().unwrap_or_default(),
        })
        .collect();

    Ok(records)
}
