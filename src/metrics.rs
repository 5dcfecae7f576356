use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_cycles_total", "Fetch cycles started.");
        describe_counter!(
            "fetch_source_errors_total",
            "Source requests that failed (network, timeout, status)."
        );
        describe_counter!(
            "fetch_candidates_rejected_total",
            "Extracted prices rejected by range or collision checks."
        );
        describe_counter!(
            "fetch_unresolved_total",
            "Commodities left unresolved at the end of a cycle."
        );
        describe_histogram!("fetch_source_ms", "Source fetch + extract time in milliseconds.");
        describe_gauge!("fetch_last_run_ts", "Unix ts when a fetch cycle last finished.");
        describe_counter!("store_writes_total", "Successful time-series file rewrites.");
        describe_counter!(
            "store_rows_dropped_total",
            "Persisted rows dropped on load because they did not parse."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Fails if another recorder is already set.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
