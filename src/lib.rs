// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod dashboard;
pub mod extract;
pub mod fetcher;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod plausibility;
pub mod source;
pub mod store;
pub mod trend;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::TrackerConfig;
pub use crate::coordinator::{CancelFlag, FallbackCoordinator};
pub use crate::model::{Commodity, FetchOutcome, Observation};
pub use crate::store::TimeSeriesStore;
pub use crate::trend::{analyze, TrendReport};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_JSON: &str = "FUEL_TRACKER_LOG_JSON";

/// Install the global tracing subscriber. `RUST_LOG` controls the filter
/// (default `info`); `FUEL_TRACKER_LOG_JSON=1` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(ENV_LOG_JSON).ok().is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}
