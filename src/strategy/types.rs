use serde::Serialize;

/// Rule-engine output: recommended spend for one channel in one decision week
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetAllocation {
    pub channel: String,
    pub recommended_budget: f64,
}

/// Allocation after the ML blocker has been applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalAllocation {
    pub channel: String,
    pub final_budget: f64,
}

/// Model output for one channel. Channels without a prediction are treated
/// as predicting zero delayed revenue.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub channel: String,
    pub predicted_delayed_revenue: f64,
}
