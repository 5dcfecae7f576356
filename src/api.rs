use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::config::TrackerConfig;
use crate::dashboard::PriceView;
use crate::model::{Commodity, Observation};
use crate::store::TimeSeriesStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TrackerConfig>,
    pub store: Arc<TimeSeriesStore>,
}

impl AppState {
    pub fn new(config: TrackerConfig) -> Self {
        let store = TimeSeriesStore::new(config.data_path.clone());
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/cities", get(list_cities))
        .route("/api/prices/{commodity}", get(price_series))
        .route("/api/summary/{commodity}", get(summary))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct CityQuery {
    city: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(msg: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: msg })).into_response()
}

fn parse_commodity(raw: &str) -> Result<Commodity, Response> {
    raw.parse::<Commodity>()
        .map_err(|_| bad_request(format!("unknown fuel type '{raw}', expected petrol or diesel")))
}

impl AppState {
    fn city_or_default(&self, q: CityQuery) -> String {
        q.city
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.config.city.clone())
    }
}

/// Run store I/O off the async workers. A panicked or aborted task is a 500,
/// never an empty result.
async fn run_blocking<T, F>(what: &'static str, f: F) -> Result<T, Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = ?e, task = what, "store task failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: format!("{what} unavailable"),
            }),
        )
            .into_response()
    })
}

async fn list_cities(State(state): State<AppState>) -> Response {
    let store = state.store.clone();
    match run_blocking("cities", move || store.cities()).await {
        Ok(cities) => Json(cities).into_response(),
        Err(resp) => resp,
    }
}

#[derive(Serialize)]
struct SeriesOut {
    city: String,
    commodity: Commodity,
    observations: Vec<Observation>,
}

async fn price_series(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Query(q): Query<CityQuery>,
) -> Response {
    let commodity = match parse_commodity(&raw) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let city = state.city_or_default(q);
    let store = state.store.clone();
    let c = city.clone();
    let observations = match run_blocking("price series", move || store.read(&c, commodity)).await {
        Ok(obs) => obs,
        Err(resp) => return resp,
    };
    Json(SeriesOut {
        city,
        commodity,
        observations,
    })
    .into_response()
}

async fn summary(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Query(q): Query<CityQuery>,
) -> Response {
    let commodity = match parse_commodity(&raw) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let city = state.city_or_default(q);
    let store = state.store.clone();
    let cfg = state.config.clone();
    let today = chrono::Local::now().date_naive();
    let view = run_blocking("summary", move || {
        PriceView::load(&store, &city, commodity, &cfg.trend, cfg.stale_after_days, today)
    })
    .await;
    match view {
        Ok(v) => Json(v).into_response(),
        Err(resp) => resp,
    }
}
