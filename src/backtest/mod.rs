use chrono::NaiveDate;
use eyre::Result;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::BacktestConfig;
use crate::model::dataset::{DelayedRevenueSample, build_delayed_revenue_dataset};
use crate::model::regression::{DelayedRevenueModel, ModelBackend};
use crate::pipeline::aggregate::WeeklyMetric;
use crate::strategy::budget_rules::apply_budget_rules;
use crate::strategy::ml_blocker::apply_ml_blocker;
use crate::strategy::types::Prediction;

/// Outcome of one simulated decision for one channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestRecord {
    /// Decision week the allocation was computed for
    pub week_start: NaiveDate,
    pub channel: String,
    /// ML-blocked allocation
    pub final_budget: f64,
    /// Rule-only allocation
    pub rule_budget: f64,
    /// Actual revenue over the following weeks, summing at most
    /// `forward_window_weeks` of them (0 when none exist)
    pub realized_delayed_revenue: f64,
}

/// Walk-forward backtest comparing rule-only against rule+ML allocations.
///
/// Iterates over the distinct week starts in ascending order, skipping the
/// trailing `forward_window_weeks` whose realized outcomes would be
/// truncated. Each decision week sees only metrics at or before itself for
/// feature building and training, and only weeks after itself for realized
/// outcomes. Iterations are pure functions of the shared read-only weekly
/// table, so they fan out across a rayon pool and join back in week order.
pub fn run_backtest<B: ModelBackend>(
    weekly: &[WeeklyMetric],
    cfg: &BacktestConfig,
    backend: &B,
) -> Result<Vec<BacktestRecord>> {
    let mut weekly: Vec<WeeklyMetric> = weekly.to_vec();
    weekly.sort_by(|a, b| {
        (a.channel.as_str(), a.week_start).cmp(&(b.channel.as_str(), b.week_start))
    });

    let mut weeks: Vec<NaiveDate> = weekly.iter().map(|m| m.week_start).collect();
    weeks.sort();
    weeks.dedup();

    if weeks.len() <= cfg.forward_window_weeks {
        info!(
            weeks = weeks.len(),
            "Not enough weeks of history to backtest"
        );
        return Ok(Vec::new());
    }

    let decision_count = weeks.len() - cfg.forward_window_weeks;
    let per_week: Vec<Option<Vec<BacktestRecord>>> = (0..decision_count)
        .into_par_iter()
        .map(|i| simulate_decision_week(&weekly, weeks[i], cfg, backend))
        .collect::<Result<Vec<_>>>()?;

    let records: Vec<BacktestRecord> = per_week.into_iter().flatten().flatten().collect();
    info!(
        decision_weeks = decision_count,
        records = records.len(),
        "Backtest complete"
    );
    Ok(records)
}

/// Simulate one decision week. Returns `None` when the historical window is
/// too short to build any training row, which is a normal skip during the
/// earliest weeks rather than an error.
fn simulate_decision_week<B: ModelBackend>(
    weekly: &[WeeklyMetric],
    current_week: NaiveDate,
    cfg: &BacktestConfig,
    backend: &B,
) -> Result<Option<Vec<BacktestRecord>>> {
    let history: Vec<WeeklyMetric> = weekly
        .iter()
        .filter(|m| m.week_start <= current_week)
        .cloned()
        .collect();

    let dataset = build_delayed_revenue_dataset(&history, cfg.forward_window_weeks);
    if dataset.is_empty() {
        debug!(week = %current_week, "Skipping week: insufficient history for features");
        return Ok(None);
    }

    let model = backend.train(&dataset)?;

    let latest_rows = latest_sample_per_channel(&dataset);
    let predictions: Vec<Prediction> = latest_rows
        .iter()
        .zip(model.predict(&latest_rows))
        .map(|(row, predicted_delayed_revenue)| Prediction {
            channel: row.channel.clone(),
            predicted_delayed_revenue,
        })
        .collect();

    let current_metrics: Vec<WeeklyMetric> = weekly
        .iter()
        .filter(|m| m.week_start == current_week)
        .cloned()
        .collect();

    let rules_out = apply_budget_rules(&current_metrics, cfg);
    let final_out = apply_ml_blocker(&rules_out, &current_metrics, &predictions, cfg);

    let records = rules_out
        .iter()
        .zip(&final_out)
        .map(|(rule, fin)| BacktestRecord {
            week_start: current_week,
            channel: rule.channel.clone(),
            final_budget: fin.final_budget,
            rule_budget: rule.recommended_budget,
            realized_delayed_revenue: realized_delayed_revenue(
                weekly,
                &rule.channel,
                current_week,
                cfg.forward_window_weeks,
            ),
        })
        .collect();

    Ok(Some(records))
}

/// Most recent training row per channel. The dataset is sorted by
/// (channel, week), so the last row of each channel run is the freshest.
fn latest_sample_per_channel(dataset: &[DelayedRevenueSample]) -> Vec<DelayedRevenueSample> {
    let mut latest = Vec::new();
    for (i, sample) in dataset.iter().enumerate() {
        let last_of_channel = dataset
            .get(i + 1)
            .is_none_or(|next| next.channel != sample.channel);
        if last_of_channel {
            latest.push(sample.clone());
        }
    }
    latest
}

/// Actual revenue a channel earned in the weeks after `current_week`,
/// summing at most the first `window` of them. Relies on `weekly` being
/// sorted by (channel, week).
fn realized_delayed_revenue(
    weekly: &[WeeklyMetric],
    channel: &str,
    current_week: NaiveDate,
    window: usize,
) -> f64 {
    weekly
        .iter()
        .filter(|m| m.channel == channel && m.week_start > current_week)
        .take(window)
        .map(|m| m.revenue)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::regression::OlsBackend;

    fn metric(channel: &str, week: NaiveDate, spend: f64, revenue: f64) -> WeeklyMetric {
        WeeklyMetric {
            week_start: week,
            channel: channel.to_string(),
            spend,
            impressions: 0.0,
            clicks: 0.0,
            conversions: 0.0,
            revenue,
            roi: if spend > 0.0 { revenue / spend } else { 0.0 },
            cpc: 0.0,
            conversion_rate: 0.0,
        }
    }

    fn week(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::weeks(i as i64)
    }

    /// Two channels with `n` consecutive weeks each
    fn two_channel_history(n: usize) -> Vec<WeeklyMetric> {
        (0..n)
            .flat_map(|i| {
                vec![
                    metric("Google Ads", week(i), 1000.0, 1500.0 + 10.0 * i as f64),
                    metric("Email", week(i), 500.0, 400.0 + 5.0 * i as f64),
                ]
            })
            .collect()
    }

    #[test]
    fn two_weeks_of_data_produce_no_records() {
        let cfg = BacktestConfig::default();
        let records = run_backtest(&two_channel_history(2), &cfg, &OlsBackend).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn early_weeks_without_features_are_skipped() {
        // Six weeks: decision weeks are w0..w3, but the feature table is
        // only non-empty from w3 (a channel needs four weeks of history)
        let cfg = BacktestConfig::default();
        let records = run_backtest(&two_channel_history(6), &cfg, &OlsBackend).unwrap();
        let weeks_seen: Vec<NaiveDate> = {
            let mut w: Vec<NaiveDate> = records.iter().map(|r| r.week_start).collect();
            w.dedup();
            w
        };
        assert_eq!(weeks_seen, vec![week(3)]);
        // One record per channel per surviving decision week
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn records_come_back_in_week_order() {
        let cfg = BacktestConfig::default();
        let records = run_backtest(&two_channel_history(9), &cfg, &OlsBackend).unwrap();
        let mut weeks_seen: Vec<NaiveDate> = records.iter().map(|r| r.week_start).collect();
        assert!(weeks_seen.windows(2).all(|w| w[0] <= w[1]));
        weeks_seen.dedup();
        assert_eq!(weeks_seen, vec![week(3), week(4), week(5), week(6)]);
    }

    #[test]
    fn realized_revenue_sums_the_next_two_weeks() {
        let cfg = BacktestConfig::default();
        let history = two_channel_history(7);
        let records = run_backtest(&history, &cfg, &OlsBackend).unwrap();
        let record = records
            .iter()
            .find(|r| r.week_start == week(3) && r.channel == "Email")
            .unwrap();
        // Email revenue at w4 and w5
        let expected = (400.0 + 5.0 * 4.0) + (400.0 + 5.0 * 5.0);
        assert!((record.realized_delayed_revenue - expected).abs() < 1e-9);
    }

    #[test]
    fn channel_with_no_future_weeks_realizes_zero() {
        let cfg = BacktestConfig::default();
        let mut history = two_channel_history(7);
        // Affiliate has history up to the decision week but nothing after
        for i in 0..4 {
            history.push(metric("Affiliate", week(i), 200.0, 100.0));
        }
        let records = run_backtest(&history, &cfg, &OlsBackend).unwrap();
        let record = records
            .iter()
            .find(|r| r.week_start == week(3) && r.channel == "Affiliate")
            .unwrap();
        assert_eq!(record.realized_delayed_revenue, 0.0);
    }

    #[test]
    fn rule_budgets_conserve_the_weekly_total() {
        let cfg = BacktestConfig::default();
        let records = run_backtest(&two_channel_history(8), &cfg, &OlsBackend).unwrap();
        let mut weeks_seen: Vec<NaiveDate> = records.iter().map(|r| r.week_start).collect();
        weeks_seen.dedup();
        for w in weeks_seen {
            let sum: f64 = records
                .iter()
                .filter(|r| r.week_start == w)
                .map(|r| r.rule_budget)
                .sum();
            assert!(
                (sum - cfg.total_weekly_budget).abs() / cfg.total_weekly_budget < 1e-6,
                "week {w}: rule budgets sum to {sum}"
            );
        }
    }

    #[test]
    fn decision_only_uses_history_up_to_the_decision_week() {
        // Changing data strictly after a decision week must not change that
        // week's budgets (realized outcomes may change, budgets may not)
        let cfg = BacktestConfig::default();
        let base = two_channel_history(8);
        let records_a = run_backtest(&base, &cfg, &OlsBackend).unwrap();

        let mut perturbed = base.clone();
        for m in &mut perturbed {
            if m.week_start > week(4) {
                m.revenue *= 7.0;
                m.roi = m.revenue / m.spend;
            }
        }
        let records_b = run_backtest(&perturbed, &cfg, &OlsBackend).unwrap();

        for (a, b) in records_a.iter().zip(&records_b) {
            if a.week_start <= week(4) {
                assert_eq!(a.channel, b.channel);
                assert_eq!(a.week_start, b.week_start);
                assert!(
                    (a.rule_budget - b.rule_budget).abs() < 1e-9,
                    "rule budget for {} at {} leaked future data",
                    a.channel,
                    a.week_start
                );
                assert!(
                    (a.final_budget - b.final_budget).abs() < 1e-9,
                    "final budget for {} at {} leaked future data",
                    a.channel,
                    a.week_start
                );
            }
        }
    }

    #[test]
    fn latest_sample_per_channel_takes_channel_run_tails() {
        let weekly = two_channel_history(6);
        let dataset = build_delayed_revenue_dataset(&weekly, 2);
        let latest = latest_sample_per_channel(&dataset);
        assert_eq!(latest.len(), 2);
        assert!(latest.iter().all(|s| s.week_start == week(3)));
        let channels: Vec<&str> = latest.iter().map(|s| s.channel.as_str()).collect();
        assert_eq!(channels, vec!["Email", "Google Ads"]);
    }
}
