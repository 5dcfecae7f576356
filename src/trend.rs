// src/trend.rs
//! Windowed price-delta classification with a refuelling suggestion.

use serde::{Deserialize, Serialize};

use crate::model::Observation;

pub const DEFAULT_WINDOW_DAYS: usize = 7;
pub const DEFAULT_CHANGE_THRESHOLD: f64 = 0.50;
pub const DEFAULT_DAILY_NOTE_THRESHOLD: f64 = 0.05;

pub const INSUFFICIENT_DATA_NARRATIVE: &str =
    "Not enough historical data for a meaningful trend analysis. Please check back later.";

/// Policy constants. Thresholds compare with strict `>`, so a change exactly
/// at the threshold classifies as stable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendPolicy {
    pub window_days: usize,
    pub change_threshold: f64,
    pub daily_note_threshold: f64,
}

impl Default for TrendPolicy {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            change_threshold: DEFAULT_CHANGE_THRESHOLD,
            daily_note_threshold: DEFAULT_DAILY_NOTE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increased,
    Decreased,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub direction: TrendDirection,
    pub delta: Option<f64>,
    pub avg_daily_delta: Option<f64>,
    /// Headline, with the daily note appended when there is one.
    pub narrative: String,
    pub suggestion: String,
    pub note: Option<String>,
    pub observations_used: usize,
}

impl TrendReport {
    fn insufficient(observations_used: usize) -> Self {
        Self {
            direction: TrendDirection::InsufficientData,
            delta: None,
            avg_daily_delta: None,
            narrative: INSUFFICIENT_DATA_NARRATIVE.to_string(),
            suggestion: "No suggestion until at least two daily prices are recorded.".to_string(),
            note: None,
            observations_used,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        self.direction == TrendDirection::InsufficientData
    }
}

/// Analyze with the default thresholds.
pub fn analyze(series: &[Observation], window_days: usize) -> TrendReport {
    TrendPolicy::default().analyze(series, window_days)
}

/// Float noise from decimal prices (95.10 - 94.50 = 0.5999999...) must not
/// flip a boundary comparison.
fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

impl TrendPolicy {
    /// `series` must be one (city, fuel) partition sorted ascending by date.
    /// Uses the last `window_days` observations.
    pub fn analyze(&self, series: &[Observation], window_days: usize) -> TrendReport {
        let start = series.len().saturating_sub(window_days);
        let window = &series[start..];
        let (first, last) = match window {
            [first, .., last] => (first, last),
            _ => return TrendReport::insufficient(window.len()),
        };

        let delta = round6(last.price - first.price);
        let avg_daily_delta = round6(delta / (window.len() - 1) as f64);
        let fuel = last.commodity;
        let city = &last.city;

        let (direction, mut narrative, suggestion) = if delta > self.change_threshold {
            (
                TrendDirection::Increased,
                format!("{fuel} prices in {city} increased by ₹{delta:.2} over the last {window_days} days."),
                "It's advisable to refuel soon as prices are likely to continue rising.",
            )
        } else if delta < -self.change_threshold {
            (
                TrendDirection::Decreased,
                format!(
                    "{fuel} prices in {city} decreased by ₹{:.2} over the last {window_days} days.",
                    -delta
                ),
                "Prices might drop further. Consider waiting a bit before refueling in bulk.",
            )
        } else {
            (
                TrendDirection::Stable,
                format!("{fuel} prices in {city} remained relatively stable over the last {window_days} days."),
                "Prices are stable. Refuel as needed without urgency.",
            )
        };

        let note = (avg_daily_delta.abs() > self.daily_note_threshold).then(|| {
            if avg_daily_delta > 0.0 {
                format!("(Average daily increase: ₹{avg_daily_delta:.2})")
            } else {
                format!("(Average daily decrease: ₹{:.2})", -avg_daily_delta)
            }
        });
        if let Some(n) = &note {
            narrative.push(' ');
            narrative.push_str(n);
        }

        tracing::debug!(target: "trend", %fuel, %city, delta, avg_daily_delta, ?direction, "trend computed");

        TrendReport {
            direction,
            delta: Some(delta),
            avg_daily_delta: Some(avg_daily_delta),
            narrative,
            suggestion: suggestion.to_string(),
            note,
            observations_used: window.len(),
        }
    }
}
