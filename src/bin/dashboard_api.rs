//! Read-only JSON API over the stored time series for the dashboard frontend.

use anyhow::Context;
use fuel_price_tracker::api::{self, AppState};
use fuel_price_tracker::metrics::Metrics;
use fuel_price_tracker::TrackerConfig;

const ENV_BIND_ADDR: &str = "FUEL_DASHBOARD_ADDR";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    fuel_price_tracker::init_tracing();

    let cfg = TrackerConfig::load_default()?;
    let metrics = Metrics::init()?;
    let app = api::router(AppState::new(cfg)).merge(metrics.router());

    let addr = std::env::var(ENV_BIND_ADDR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "dashboard api listening");
    axum::serve(listener, app).await.context("serving dashboard api")?;
    Ok(())
}
