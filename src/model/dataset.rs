use chrono::NaiveDate;

use crate::pipeline::aggregate::WeeklyMetric;

/// One supervised-learning row: current and lag-1 metrics for a channel at
/// week t, with the realized revenue of the following weeks as target.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayedRevenueSample {
    pub week_start: NaiveDate,
    pub channel: String,
    pub spend: f64,
    pub clicks: f64,
    pub conversions: f64,
    pub revenue: f64,
    pub roi: f64,
    pub spend_lag1: f64,
    pub revenue_lag1: f64,
    pub roi_lag1: f64,
    /// Sum of revenue over the forward window (t+1 .. t+W)
    pub delayed_revenue: f64,
}

impl DelayedRevenueSample {
    pub const NUM_FEATURES: usize = 8;

    /// Fixed feature vector the reference model is trained on
    pub fn features(&self) -> [f64; Self::NUM_FEATURES] {
        [
            self.spend,
            self.clicks,
            self.conversions,
            self.revenue,
            self.roi,
            self.spend_lag1,
            self.revenue_lag1,
            self.roi_lag1,
        ]
    }
}

/// Build the leakage-safe training table from weekly metrics.
///
/// Rows are shifted strictly within their own channel's time series: lag-1
/// features come from the prior row, the target sums the next
/// `forward_window` rows' revenue. Rows missing either side are dropped, so
/// a channel needs at least `forward_window + 2` weeks to contribute
/// anything. An empty result is a valid outcome, not an error. Output is
/// sorted by (channel, week).
pub fn build_delayed_revenue_dataset(
    weekly: &[WeeklyMetric],
    forward_window: usize,
) -> Vec<DelayedRevenueSample> {
    let mut rows: Vec<&WeeklyMetric> = weekly.iter().collect();
    rows.sort_by(|a, b| {
        (a.channel.as_str(), a.week_start).cmp(&(b.channel.as_str(), b.week_start))
    });

    let mut samples = Vec::new();
    let mut start = 0;
    while start < rows.len() {
        let mut end = start;
        while end < rows.len() && rows[end].channel == rows[start].channel {
            end += 1;
        }
        let series = &rows[start..end];

        // t needs one prior row for lags and forward_window following rows
        // for the target
        for t in 1..series.len().saturating_sub(forward_window) {
            let current = series[t];
            let previous = series[t - 1];
            let delayed_revenue: f64 = series[t + 1..=t + forward_window]
                .iter()
                .map(|m| m.revenue)
                .sum();

            samples.push(DelayedRevenueSample {
                week_start: current.week_start,
                channel: current.channel.clone(),
                spend: current.spend,
                clicks: current.clicks,
                conversions: current.conversions,
                revenue: current.revenue,
                roi: current.roi,
                spend_lag1: previous.spend,
                revenue_lag1: previous.revenue,
                roi_lag1: previous.roi,
                delayed_revenue,
            });
        }

        start = end;
    }

    samples
}
