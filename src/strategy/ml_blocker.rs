use std::collections::HashMap;

use crate::config::BacktestConfig;
use crate::pipeline::aggregate::WeeklyMetric;

use super::types::{BudgetAllocation, FinalAllocation, Prediction};

/// Override the rule allocation where predicted delayed revenue is material.
///
/// When a channel's predicted delayed revenue reaches the threshold fraction
/// of its current weekly revenue, the final budget is forced to equal that
/// revenue. The forced value can sit above or below the rule recommendation;
/// "blocker" is historical naming for what is really a floor-to-revenue
/// override. Channels without a prediction default to a prediction of zero.
pub fn apply_ml_blocker(
    rules: &[BudgetAllocation],
    week: &[WeeklyMetric],
    predictions: &[Prediction],
    cfg: &BacktestConfig,
) -> Vec<FinalAllocation> {
    let revenue_by_channel: HashMap<&str, f64> = week
        .iter()
        .map(|m| (m.channel.as_str(), m.revenue))
        .collect();
    let predicted_by_channel: HashMap<&str, f64> = predictions
        .iter()
        .map(|p| (p.channel.as_str(), p.predicted_delayed_revenue))
        .collect();

    rules
        .iter()
        .map(|allocation| {
            let channel = allocation.channel.as_str();
            let weekly_revenue = revenue_by_channel.get(channel).copied().unwrap_or(0.0);
            let predicted = predicted_by_channel.get(channel).copied().unwrap_or(0.0);

            let final_budget = if predicted >= cfg.delayed_revenue_threshold * weekly_revenue {
                weekly_revenue
            } else {
                allocation.recommended_budget
            };

            FinalAllocation {
                channel: allocation.channel.clone(),
                final_budget,
            }
        })
        .collect()
}
