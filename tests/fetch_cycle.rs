// tests/fetch_cycle.rs
//
// End-to-end fetch cycles against canned pages and a temp store.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use fuel_price_tracker::config::TrackerConfig;
use fuel_price_tracker::fetcher::{PageFetcher, StaticFetcher};
use fuel_price_tracker::pipeline::run_fetch_cycle;
use fuel_price_tracker::source::{default_source_configs, SourceConfig, SourceKind};
use fuel_price_tracker::{CancelFlag, Commodity, FallbackCoordinator, TimeSeriesStore};

const PETROL_URL: &str = "https://www.goodreturns.in/petrol-price.html";
const DIESEL_URL: &str = "https://www.goodreturns.in/diesel-price.html";
const CITY_URL: &str = "https://www.goodreturns.in/petrol-price-in-new-delhi.html";

fn fixture(name: &str) -> String {
    fs::read_to_string(format!("tests/fixtures/{name}")).expect("fixture")
}

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn test_config() -> TrackerConfig {
    TrackerConfig {
        request_delay_ms: 0,
        ..TrackerConfig::default()
    }
}

fn coordinator(cfg: &TrackerConfig, fetcher: Arc<StaticFetcher>) -> FallbackCoordinator {
    FallbackCoordinator::from_config(cfg, fetcher).expect("sources build")
}

fn temp_store() -> (tempfile::TempDir, TimeSeriesStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = TimeSeriesStore::new(dir.path().join("fuel_prices.csv"));
    (dir, store)
}

#[tokio::test]
async fn default_registry_resolves_from_table_pages() {
    let fetcher = Arc::new(
        StaticFetcher::new()
            .with_page(PETROL_URL, fixture("petrol_table.html"))
            .with_page(DIESEL_URL, fixture("diesel_table.html")),
    );
    let cfg = test_config();
    let (_dir, store) = temp_store();

    let report = run_fetch_cycle(
        &coordinator(&cfg, fetcher.clone()),
        &store,
        &cfg.city,
        day("2025-10-17"),
        &CancelFlag::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.exit_code(), 0);
    assert!(report.unresolved().is_empty());
    assert_eq!(report.outcome.petrol.as_ref().unwrap().source_id, "goodreturns-petrol-table");
    assert_eq!(report.outcome.diesel.as_ref().unwrap().source_id, "goodreturns-diesel-table");
    // Both resolved after two sources; the city page is never requested.
    assert_eq!(fetcher.requested(), vec![PETROL_URL, DIESEL_URL]);

    let petrol = store.read("New Delhi", Commodity::Petrol);
    assert_eq!(petrol.len(), 1);
    assert_eq!(petrol[0].price, 94.77);
    assert_eq!(store.latest("New Delhi", Commodity::Diesel).unwrap().price, 87.67);
}

#[tokio::test]
async fn dead_table_source_falls_back_to_city_page() {
    // Diesel table is down; the labeled city page fills the gap.
    let fetcher = Arc::new(
        StaticFetcher::new()
            .with_page(PETROL_URL, fixture("petrol_table.html"))
            .with_page(CITY_URL, fixture("city_page.html")),
    );
    let cfg = test_config();
    let (_dir, store) = temp_store();

    let report = run_fetch_cycle(
        &coordinator(&cfg, fetcher),
        &store,
        &cfg.city,
        day("2025-10-17"),
        &CancelFlag::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.outcome.price(Commodity::Petrol), Some(94.77));
    let diesel = report.outcome.diesel.unwrap();
    assert_eq!(diesel.source_id, "goodreturns-city-labels");
    assert_eq!(diesel.price, 87.67);
}

#[tokio::test]
async fn total_failure_leaves_store_untouched() {
    let fetcher = Arc::new(StaticFetcher::new());
    let cfg = test_config();
    let (_dir, store) = temp_store();
    store
        .upsert(day("2025-10-16"), "New Delhi", Commodity::Petrol, 94.72)
        .unwrap();
    let before = fs::read(store.path()).unwrap();

    let report = run_fetch_cycle(
        &coordinator(&cfg, fetcher.clone()),
        &store,
        &cfg.city,
        day("2025-10-17"),
        &CancelFlag::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.unresolved(), vec![Commodity::Petrol, Commodity::Diesel]);
    assert!(report.persisted.is_empty());
    assert_eq!(fetcher.requested().len(), default_source_configs().len());
    assert_eq!(fs::read(store.path()).unwrap(), before);
}

#[tokio::test]
async fn partial_resolution_persists_only_resolved_fuel() {
    let fetcher = Arc::new(StaticFetcher::new().with_page(PETROL_URL, fixture("petrol_table.html")));
    let cfg = test_config();
    let (_dir, store) = temp_store();

    let report = run_fetch_cycle(
        &coordinator(&cfg, fetcher),
        &store,
        &cfg.city,
        day("2025-10-17"),
        &CancelFlag::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.unresolved(), vec![Commodity::Diesel]);
    assert_eq!(store.read("New Delhi", Commodity::Petrol).len(), 1);
    assert!(store.read("New Delhi", Commodity::Diesel).is_empty());
}

#[tokio::test]
async fn same_day_refetch_replaces_and_repeat_is_idempotent() {
    let cfg = test_config();
    let (_dir, store) = temp_store();
    let today = day("2025-10-17");

    let stale = TrackerConfig {
        sources: vec![SourceConfig {
            id: "city".into(),
            url: CITY_URL.into(),
            kind: SourceKind::LabeledText {
                petrol_label: "Petrol".into(),
                diesel_label: "Diesel".into(),
                max_gap: 80,
                require_city: false,
            },
        }],
        ..cfg.clone()
    };
    let early = Arc::new(
        StaticFetcher::new().with_page(CITY_URL, "<p>Petrol ₹ 94.50 Diesel ₹ 87.40</p>"),
    );
    run_fetch_cycle(&coordinator(&stale, early), &store, &cfg.city, today, &CancelFlag::new())
        .await
        .unwrap();

    let later = Arc::new(StaticFetcher::new().with_page(CITY_URL, fixture("city_page.html")));
    let report = run_fetch_cycle(&coordinator(&stale, later.clone()), &store, &cfg.city, today, &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(report.summary.replaced, 2);
    let bytes_after_first = fs::read(store.path()).unwrap();

    let report = run_fetch_cycle(&coordinator(&stale, later), &store, &cfg.city, today, &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(report.summary.unchanged, 2);
    assert_eq!(fs::read(store.path()).unwrap(), bytes_after_first);

    let petrol = store.read("New Delhi", Commodity::Petrol);
    assert_eq!(petrol.len(), 1);
    assert_eq!(petrol[0].price, 94.77);
}

#[tokio::test]
async fn cancelled_cycle_persists_nothing() {
    let fetcher = Arc::new(
        StaticFetcher::new()
            .with_page(PETROL_URL, fixture("petrol_table.html"))
            .with_page(DIESEL_URL, fixture("diesel_table.html")),
    );
    let cfg = test_config();
    let (_dir, store) = temp_store();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let report = run_fetch_cycle(&coordinator(&cfg, fetcher), &store, &cfg.city, day("2025-10-17"), &cancel)
        .await
        .unwrap();

    assert!(report.outcome.cancelled);
    assert_eq!(report.exit_code(), 1);
    assert!(!store.path().exists());
}

/// Serves canned pages and raises the cancel flag on the first request,
/// like a Ctrl-C arriving while a source is in flight.
struct CancelDuringFetch {
    inner: StaticFetcher,
    cancel: CancelFlag,
}

#[async_trait]
impl PageFetcher for CancelDuringFetch {
    async fn fetch(&self, url: &str) -> anyhow::Result<String> {
        self.cancel.cancel();
        self.inner.fetch(url).await
    }
}

#[tokio::test]
async fn cancel_mid_cycle_discards_resolved_price() {
    let cancel = CancelFlag::new();
    let fetcher = Arc::new(CancelDuringFetch {
        inner: StaticFetcher::new()
            .with_page(PETROL_URL, fixture("petrol_table.html"))
            .with_page(DIESEL_URL, fixture("diesel_table.html")),
        cancel: cancel.clone(),
    });
    let cfg = test_config();
    let (_dir, store) = temp_store();
    store.upsert(day("2025-10-16"), "New Delhi", Commodity::Petrol, 94.72).unwrap();
    let before = fs::read(store.path()).unwrap();

    let c = FallbackCoordinator::from_config(&cfg, fetcher.clone()).unwrap();
    let report = run_fetch_cycle(&c, &store, &cfg.city, day("2025-10-17"), &cancel)
        .await
        .unwrap();

    // Petrol resolved from the first page before the cancel was seen.
    assert_eq!(report.outcome.price(Commodity::Petrol), Some(94.77));
    assert!(report.outcome.cancelled);
    assert!(report.persisted.is_empty());
    assert_eq!(report.exit_code(), 1);
    assert_eq!(fetcher.inner.requested(), vec![PETROL_URL]);
    assert_eq!(fs::read(store.path()).unwrap(), before);
}

#[tokio::test]
async fn city_page_for_another_city_is_not_attributed() {
    // Only the New Delhi page answers; a Mumbai run must not borrow its numbers.
    let fetcher = Arc::new(
        StaticFetcher::new().with_page(CITY_URL, "<h1>Fuel in New Delhi</h1><p>94.77 87.67</p>"),
    );
    let cfg = test_config();
    let (_dir, store) = temp_store();

    let report = run_fetch_cycle(
        &coordinator(&cfg, fetcher),
        &store,
        "Mumbai",
        day("2025-10-17"),
        &CancelFlag::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.unresolved(), vec![Commodity::Petrol, Commodity::Diesel]);
    assert_eq!(report.exit_code(), 1);
    assert!(store.read_all().is_empty());
    assert!(!store.path().exists());
}

#[tokio::test]
async fn inter_source_delay_is_applied() {
    let fetcher = Arc::new(StaticFetcher::new());
    let cfg = TrackerConfig {
        request_delay_ms: 40,
        ..TrackerConfig::default()
    };
    let c = coordinator(&cfg, fetcher);
    let t0 = std::time::Instant::now();
    let out = c.fetch(&cfg.city, &CancelFlag::new()).await;
    // Four sources, three pauses between them.
    assert!(t0.elapsed() >= Duration::from_millis(120));
    assert!(out.petrol.is_none() && out.diesel.is_none());
}
