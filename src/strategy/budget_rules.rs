use crate::config::BacktestConfig;
use crate::pipeline::aggregate::WeeklyMetric;

use super::types::BudgetAllocation;

/// Rule-based budget allocation for one decision week.
///
/// Channels receive budget proportional to their positive ROI, capped at
/// `channel_cap_ratio` of the weekly total, then renormalized so the total
/// is conserved. Renormalization is uniform multiplicative, so a capped
/// channel can end up back above the nominal cap when other channels hold
/// no budget; that tension is inherited allocator behavior and kept as-is
/// rather than silently corrected.
pub fn apply_budget_rules(week: &[WeeklyMetric], cfg: &BacktestConfig) -> Vec<BudgetAllocation> {
    if week.is_empty() {
        return Vec::new();
    }

    // Base allocation: proportional to ROI (only positive ROI contributes)
    let positive_roi: Vec<f64> = week.iter().map(|m| m.roi.max(0.0)).collect();
    let total_positive_roi: f64 = positive_roi.iter().sum();

    let mut budgets: Vec<f64> = if total_positive_roi == 0.0 {
        // Equal split if no channel is profitable
        vec![cfg.total_weekly_budget / week.len() as f64; week.len()]
    } else {
        positive_roi
            .iter()
            .map(|roi| roi / total_positive_roi * cfg.total_weekly_budget)
            .collect()
    };

    // Apply per-channel cap
    let cap_value = cfg.channel_cap_value();
    for budget in &mut budgets {
        *budget = budget.min(cap_value);
    }

    // Re-normalize so the total budget is conserved, skipped when the
    // post-cap sum is zero
    let budget_sum: f64 = budgets.iter().sum();
    if budget_sum > 0.0 && budget_sum != cfg.total_weekly_budget {
        let scale = cfg.total_weekly_budget / budget_sum;
        for budget in &mut budgets {
            *budget *= scale;
        }
    }

    week.iter()
        .zip(budgets)
        .map(|(metric, recommended_budget)| BudgetAllocation {
            channel: metric.channel.clone(),
            recommended_budget,
        })
        .collect()
}
