// src/pipeline.rs
//! One fetch cycle: resolve today's prices and persist whatever resolved.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use metrics::{counter, gauge};
use tracing::{info, warn};

use crate::coordinator::{CancelFlag, FallbackCoordinator};
use crate::metrics::ensure_metrics_described;
use crate::model::{Commodity, FetchOutcome, Observation};
use crate::store::{TimeSeriesStore, UpsertSummary};

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub date: NaiveDate,
    pub city: String,
    pub outcome: FetchOutcome,
    pub persisted: Vec<Observation>,
    pub summary: UpsertSummary,
}

impl CycleReport {
    pub fn unresolved(&self) -> Vec<Commodity> {
        self.outcome.missing()
    }

    /// 0 when at least one price was stored, 1 on total resolution failure
    /// or cancellation.
    pub fn exit_code(&self) -> i32 {
        if self.outcome.cancelled || self.persisted.is_empty() {
            1
        } else {
            0
        }
    }
}

/// Run the coordinator for `city` and upsert the resolved prices for `date`
/// in a single store write. A cancelled cycle persists nothing. Errors are
/// store write failures only; the previous file is left as it was.
pub async fn run_fetch_cycle(
    coordinator: &FallbackCoordinator,
    store: &TimeSeriesStore,
    city: &str,
    date: NaiveDate,
    cancel: &CancelFlag,
) -> Result<CycleReport> {
    ensure_metrics_described();
    counter!("fetch_cycles_total").increment(1);

    let mut outcome = coordinator.fetch(city, cancel).await;
    // A cancel that lands after the last source still aborts the write.
    outcome.cancelled |= cancel.is_cancelled();

    let persisted: Vec<Observation> = if outcome.cancelled {
        warn!(target: "fetch", %city, "cycle cancelled, nothing persisted");
        Vec::new()
    } else {
        Commodity::ALL
            .into_iter()
            .filter_map(|c| outcome.price(c).map(|p| Observation::new(date, city, c, p)))
            .collect()
    };

    let summary = if persisted.is_empty() {
        UpsertSummary::default()
    } else {
        store
            .upsert_many(&persisted)
            .with_context(|| format!("persisting prices to {}", store.path().display()))?
    };

    gauge!("fetch_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
    info!(
        target: "fetch",
        %city,
        %date,
        petrol = ?outcome.price(Commodity::Petrol),
        diesel = ?outcome.price(Commodity::Diesel),
        inserted = summary.inserted,
        replaced = summary.replaced,
        unchanged = summary.unchanged,
        "fetch cycle finished"
    );

    Ok(CycleReport {
        date,
        city: city.to_string(),
        outcome,
        persisted,
        summary,
    })
}
