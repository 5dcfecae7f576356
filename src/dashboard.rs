// src/dashboard.rs
//! View model for the presentation layer: latest price, chart points and the
//! trend narrative, with distinct states for "no data", "stale data" and
//! "trend not computable".

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{Commodity, Observation};
use crate::store::TimeSeriesStore;
use crate::trend::TrendPolicy;
use crate::trend::TrendReport;

/// Points shown on the history chart.
pub const CHART_POINTS: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Freshness {
    NoData,
    Stale { latest: NaiveDate, days_old: i64 },
    Fresh { latest: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceView {
    pub city: String,
    pub commodity: Commodity,
    pub freshness: Freshness,
    /// Human-readable status line for the current price panel.
    pub status: String,
    pub latest: Option<Observation>,
    pub chart: Vec<ChartPoint>,
    pub trend: TrendReport,
}

impl PriceView {
    pub fn from_series(
        city: &str,
        commodity: Commodity,
        series: &[Observation],
        policy: &TrendPolicy,
        stale_after_days: i64,
        today: NaiveDate,
    ) -> Self {
        let latest = series.last().cloned();
        let freshness = match &latest {
            None => Freshness::NoData,
            Some(o) => {
                let days_old = (today - o.date).num_days();
                if days_old > stale_after_days {
                    Freshness::Stale {
                        latest: o.date,
                        days_old,
                    }
                } else {
                    Freshness::Fresh { latest: o.date }
                }
            }
        };

        let status = match (&freshness, &latest) {
            (Freshness::NoData, _) | (_, None) => format!(
                "No {commodity} price data for {city} yet. The daily update has not stored any prices."
            ),
            (Freshness::Stale { days_old, .. }, Some(o)) => format!(
                "₹{:.2} as of {} (last update {days_old} days ago; the daily update may be failing).",
                o.price, o.date
            ),
            (Freshness::Fresh { .. }, Some(o)) => format!("₹{:.2} as of {}", o.price, o.date),
        };

        let start = series.len().saturating_sub(CHART_POINTS);
        let chart = series[start..]
            .iter()
            .map(|o| ChartPoint {
                date: o.date,
                price: o.price,
            })
            .collect();

        Self {
            city: city.to_string(),
            commodity,
            freshness,
            status,
            latest,
            chart,
            trend: policy.analyze(series, policy.window_days),
        }
    }

    /// Read the series from `store` and build the view.
    pub fn load(
        store: &TimeSeriesStore,
        city: &str,
        commodity: Commodity,
        policy: &TrendPolicy,
        stale_after_days: i64,
        today: NaiveDate,
    ) -> Self {
        let series = store.read(city, commodity);
        Self::from_series(city, commodity, &series, policy, stale_after_days, today)
    }
}
