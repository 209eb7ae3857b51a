use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

use crate::data_ingestion::daily::DailyRecord;

/// Weekly totals and derived ratios for one (channel, week) pair
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyMetric {
    /// Monday of the ISO week the source dates fall in
    pub week_start: NaiveDate,
    pub channel: String,
    pub spend: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub conversions: f64,
    pub revenue: f64,
    pub roi: f64,
    pub cpc: f64,
    pub conversion_rate: f64,
}

/// Monday of the ISO week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

#[derive(Default)]
struct WeeklySums {
    spend: f64,
    impressions: f64,
    clicks: f64,
    conversions: f64,
    revenue: f64,
}

/// Aggregate validated daily records into one row per (channel, week).
///
/// Volume fields are summed within each group; ratios use a zero-guard so a
/// zero denominator yields 0 rather than a division error. Output is sorted
/// by (week_start, channel).
pub fn aggregate_weekly(daily: &[DailyRecord]) -> Vec<WeeklyMetric> {
    let mut groups: BTreeMap<(NaiveDate, String), WeeklySums> = BTreeMap::new();

    for record in daily {
        let key = (week_start(record.date), record.channel.clone());
        let sums = groups.entry(key).or_default();
        sums.spend += record.spend;
        sums.impressions += record.impressions;
        sums.clicks += record.clicks;
        sums.conversions += record.conversions;
        sums.revenue += record.revenue;
    }

    groups
        .into_iter()
        .map(|((week_start, channel), sums)| {
            let roi = if sums.spend > 0.0 { sums.revenue / sums.spend } else { 0.0 };
            let cpc = if sums.clicks > 0.0 { sums.spend / sums.clicks } else { 0.0 };
            let conversion_rate = if sums.clicks > 0.0 {
                sums.conversions / sums.clicks
            } else {
                0.0
            };

            WeeklyMetric {
                week_start,
                channel,
                spend: sums.spend,
                impressions: sums.impressions,
                clicks: sums.clicks,
                conversions: sums.conversions,
                revenue: sums.revenue,
                roi,
                cpc,
                conversion_rate,
            }
        })
        .collect()
}
