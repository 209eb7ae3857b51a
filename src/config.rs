use dotenvy::dotenv;
use std::env;
use tracing::warn;

/// Tunable parameters for one backtest run.
///
/// Passed explicitly through the engine so multiple configurations can run
/// in the same process without shared state.
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    /// Total marketing budget allocated each week across all channels (USD)
    pub total_weekly_budget: f64,
    /// Maximum share of the weekly budget any single channel may receive
    pub channel_cap_ratio: f64,
    /// Predicted delayed revenue at or above this fraction of current weekly
    /// revenue triggers the blocker floor
    pub delayed_revenue_threshold: f64,
    /// How many future weeks of revenue count as "delayed"
    pub forward_window_weeks: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            total_weekly_budget: 500_000.0,
            channel_cap_ratio: 0.40,
            delayed_revenue_threshold: 0.10,
            forward_window_weeks: 2,
        }
    }
}

impl BacktestConfig {
    /// Load configuration from the environment, falling back to defaults
    pub fn from_env() -> Self {
        dotenv().ok();

        let defaults = Self::default();
        Self {
            total_weekly_budget: env_f64("TOTAL_WEEKLY_BUDGET", defaults.total_weekly_budget),
            channel_cap_ratio: env_f64("CHANNEL_CAP_RATIO", defaults.channel_cap_ratio),
            delayed_revenue_threshold: env_f64(
                "DELAYED_REVENUE_THRESHOLD",
                defaults.delayed_revenue_threshold,
            ),
            forward_window_weeks: env_usize("FORWARD_WINDOW_WEEKS", defaults.forward_window_weeks),
        }
    }

    /// Absolute per-channel budget cap implied by the ratio
    pub fn channel_cap_value(&self) -> f64 {
        self.channel_cap_ratio * self.total_weekly_budget
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, raw = %raw, default, "Ignoring unparseable config value");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, raw = %raw, default, "Ignoring unparseable config value");
                default
            }
        },
        Err(_) => default,
    }
}
