//! Fetch entry point: resolve today's petrol and diesel prices for the
//! configured city and upsert them into the time-series file.
//!
//! Exit codes: 0 = at least one price stored, 1 = nothing resolved (or
//! cancelled), 2 = configuration or store failure.

use std::process::ExitCode;
use std::sync::Arc;

use fuel_price_tracker::fetcher::HttpFetcher;
use fuel_price_tracker::pipeline::run_fetch_cycle;
use fuel_price_tracker::{CancelFlag, FallbackCoordinator, TimeSeriesStore, TrackerConfig};
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    fuel_price_tracker::init_tracing();

    let cfg = match TrackerConfig::load_default() {
        Ok(c) => c,
        Err(e) => {
            error!(error = ?e, "invalid configuration");
            return ExitCode::from(2);
        }
    };

    let fetcher = match HttpFetcher::new(cfg.request_timeout(), &cfg.user_agent) {
        Ok(f) => Arc::new(f),
        Err(e) => {
            error!(error = ?e, "cannot build http client");
            return ExitCode::from(2);
        }
    };
    let coordinator = match FallbackCoordinator::from_config(&cfg, fetcher) {
        Ok(c) => c,
        Err(e) => {
            error!(error = ?e, "invalid source configuration");
            return ExitCode::from(2);
        }
    };
    let store = TimeSeriesStore::new(cfg.data_path.clone());

    // Ctrl-C stops the cycle at the next source boundary.
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after current source");
                cancel.cancel();
            }
        });
    }

    let today = chrono::Local::now().date_naive();
    match run_fetch_cycle(&coordinator, &store, &cfg.city, today, &cancel).await {
        Ok(report) => {
            let unresolved = report.unresolved();
            if unresolved.is_empty() {
                info!(city = %report.city, date = %report.date, "all prices stored");
            } else {
                warn!(city = %report.city, date = %report.date, ?unresolved, "some prices unresolved");
            }
            ExitCode::from(report.exit_code() as u8)
        }
        Err(e) => {
            error!(error = ?e, "store write failed; previous data left untouched");
            ExitCode::from(2)
        }
    }
}
