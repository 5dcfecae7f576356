// src/coordinator.rs
//! Fallback chain over price sources.
//!
//! Sources are tried one at a time in priority order with a fixed pause between
//! requests. Each source only gets asked for commodities that are still
//! missing; the first in-range value per commodity wins. A source that fails in
//! any way is skipped. Nothing here ever substitutes a default price.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::fetcher::PageFetcher;
use crate::metrics::ensure_metrics_described;
use crate::model::{Commodity, ExtractionResult, FetchOutcome, ResolvedPrice};
use crate::plausibility::PlausibilityFilter;
use crate::source::{build_sources, Source};

/// Cooperative cancellation, checked between source attempts.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct FallbackCoordinator {
    sources: Vec<Source>,
    fetcher: Arc<dyn PageFetcher>,
    filter: PlausibilityFilter,
    delay: Duration,
    timeout: Duration,
}

impl FallbackCoordinator {
    pub fn new(sources: Vec<Source>, fetcher: Arc<dyn PageFetcher>, filter: PlausibilityFilter) -> Self {
        Self {
            sources,
            fetcher,
            filter,
            delay: Duration::from_millis(1500),
            timeout: Duration::from_secs(15),
        }
    }

    /// Sources, ranges, delay and timeout as configured.
    pub fn from_config(cfg: &TrackerConfig, fetcher: Arc<dyn PageFetcher>) -> anyhow::Result<Self> {
        Ok(Self::new(build_sources(&cfg.sources)?, fetcher, cfg.ranges)
            .with_delay(cfg.request_delay())
            .with_timeout(cfg.request_timeout()))
    }

    /// Minimum pause between two successive source requests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Upper bound on a single source request, independent of the fetcher's own.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub async fn fetch(&self, city: &str, cancel: &CancelFlag) -> FetchOutcome {
        ensure_metrics_described();
        let mut out = FetchOutcome::default();

        for (i, source) in self.sources.iter().enumerate() {
            if out.is_complete() {
                break;
            }
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if cancel.is_cancelled() {
                info!(target: "fetch", source = %source.id, "fetch cycle cancelled");
                out.cancelled = true;
                return out;
            }

            let missing = out.missing();
            let t0 = Instant::now();
            let results = self.query_source(source, city, &missing).await;
            histogram!("fetch_source_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

            if let Some(results) = results {
                self.merge(&mut out, results);
            }
        }

        for c in out.missing() {
            warn!(target: "fetch", %city, commodity = %c, "no source produced a valid price");
            counter!("fetch_unresolved_total").increment(1);
        }
        out
    }

    /// Fetch one source page and run its extractor for each missing commodity.
    /// `None` when the request itself failed.
    async fn query_source(
        &self,
        source: &Source,
        city: &str,
        missing: &[Commodity],
    ) -> Option<Vec<ExtractionResult>> {
        let page = match tokio::time::timeout(self.timeout, self.fetcher.fetch(&source.url)).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                warn!(target: "fetch", source = %source.id, error = ?e, "source request failed");
                counter!("fetch_source_errors_total").increment(1);
                return None;
            }
            Err(_) => {
                warn!(
                    target: "fetch",
                    source = %source.id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "source request timed out"
                );
                counter!("fetch_source_errors_total").increment(1);
                return None;
            }
        };

        let results = missing
            .iter()
            .map(|&commodity| {
                let price = source.extractor.extract(&page, commodity, city);
                if price.is_none() {
                    debug!(
                        target: "fetch",
                        source = %source.id,
                        extractor = source.extractor.name(),
                        %commodity,
                        "no price found in page"
                    );
                }
                ExtractionResult {
                    commodity,
                    price,
                    source_id: source.id.clone(),
                }
            })
            .collect();
        Some(results)
    }

    /// Fold one source's candidates into the outcome.
    fn merge(&self, out: &mut FetchOutcome, results: Vec<ExtractionResult>) {
        let mut accepted: Vec<ExtractionResult> = results
            .into_iter()
            .filter(|r| match r.price {
                Some(p) if self.filter.validate(r.commodity, p) => true,
                Some(_) => {
                    counter!("fetch_candidates_rejected_total").increment(1);
                    false
                }
                None => false,
            })
            .collect();

        // Same value for both fuels from one page: both were read from the same text.
        let collided = match accepted.as_slice() {
            [a, b] => match (a.price, b.price) {
                (Some(pa), Some(pb)) if self.filter.is_collision(pa, pb) => {
                    warn!(
                        target: "fetch",
                        source = %a.source_id,
                        price = pa,
                        "petrol and diesel extracted as the same value, rejecting both"
                    );
                    true
                }
                _ => false,
            },
            _ => false,
        };
        if collided {
            counter!("fetch_candidates_rejected_total").increment(2);
            accepted.clear();
        }

        for r in accepted {
            let Some(price) = r.price else { continue };
            if let Some(other) = out.price(r.commodity.other()) {
                if self.filter.is_collision(price, other) {
                    warn!(
                        target: "fetch",
                        source = %r.source_id,
                        commodity = %r.commodity,
                        price,
                        "value equals the other fuel's accepted price, rejecting"
                    );
                    counter!("fetch_candidates_rejected_total").increment(1);
                    continue;
                }
            }
            info!(
                target: "fetch",
                source = %r.source_id,
                commodity = %r.commodity,
                price,
                "price accepted"
            );
            *out.slot_mut(r.commodity) = Some(ResolvedPrice {
                price,
                source_id: r.source_id,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PriceExtractor;
    use crate::fetcher::StaticFetcher;

    /// Returns fixed values regardless of page content.
    struct Fixed {
        petrol: Option<f64>,
        diesel: Option<f64>,
    }

    impl PriceExtractor for Fixed {
        fn extract(&self, _page: &str, commodity: Commodity, _city: &str) -> Option<f64> {
            match commodity {
                Commodity::Petrol => self.petrol,
                Commodity::Diesel => self.diesel,
            }
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn src(id: &str, petrol: Option<f64>, diesel: Option<f64>) -> Source {
        Source::new(id, format!("https://{id}.test/"), Box::new(Fixed { petrol, diesel }))
    }

    fn coordinator(sources: Vec<Source>, fetcher: Arc<StaticFetcher>) -> FallbackCoordinator {
        FallbackCoordinator::new(sources, fetcher, PlausibilityFilter::default())
            .with_delay(Duration::ZERO)
    }

    fn all_pages(ids: &[&str]) -> StaticFetcher {
        ids.iter().fold(StaticFetcher::new(), |f, id| {
            f.with_page(format!("https://{id}.test/"), "<html></html>")
        })
    }

    #[tokio::test]
    async fn later_source_fills_missing_field() {
        let fetcher = Arc::new(all_pages(&["a", "b"]));
        let c = coordinator(
            vec![src("a", Some(94.72), None), src("b", Some(99.0), Some(87.62))],
            fetcher.clone(),
        );
        let out = c.fetch("New Delhi", &CancelFlag::new()).await;
        assert_eq!(out.petrol.as_ref().unwrap().source_id, "a");
        assert_eq!(out.price(Commodity::Petrol), Some(94.72));
        assert_eq!(out.diesel.as_ref().unwrap().source_id, "b");
        assert_eq!(out.price(Commodity::Diesel), Some(87.62));
    }

    #[tokio::test]
    async fn stops_once_both_resolved() {
        let fetcher = Arc::new(all_pages(&["a", "b"]));
        let c = coordinator(
            vec![src("a", Some(94.72), Some(87.62)), src("b", Some(99.0), Some(88.0))],
            fetcher.clone(),
        );
        let out = c.fetch("New Delhi", &CancelFlag::new()).await;
        assert!(out.is_complete());
        assert_eq!(fetcher.requested(), vec!["https://a.test/"]);
    }

    #[tokio::test]
    async fn implausible_value_falls_through() {
        let fetcher = Arc::new(all_pages(&["a", "b"]));
        let c = coordinator(
            vec![src("a", Some(10.0), Some(87.62)), src("b", Some(94.72), None)],
            fetcher,
        );
        let out = c.fetch("New Delhi", &CancelFlag::new()).await;
        assert_eq!(out.price(Commodity::Petrol), Some(94.72));
        assert_eq!(out.price(Commodity::Diesel), Some(87.62));
    }

    #[tokio::test]
    async fn collision_within_one_source_rejects_both() {
        let fetcher = Arc::new(all_pages(&["a", "b"]));
        let c = coordinator(
            vec![src("a", Some(90.0), Some(90.0)), src("b", Some(94.72), Some(87.62))],
            fetcher,
        );
        let out = c.fetch("New Delhi", &CancelFlag::new()).await;
        assert_eq!(out.petrol.unwrap().source_id, "b");
        assert_eq!(out.diesel.unwrap().source_id, "b");
    }

    #[tokio::test]
    async fn collision_with_earlier_value_rejects_newcomer() {
        let fetcher = Arc::new(all_pages(&["a", "b", "c"]));
        let c = coordinator(
            vec![
                src("a", Some(94.72), None),
                src("b", None, Some(94.72)),
                src("c", None, Some(87.62)),
            ],
            fetcher,
        );
        let out = c.fetch("New Delhi", &CancelFlag::new()).await;
        assert_eq!(out.price(Commodity::Petrol), Some(94.72));
        assert_eq!(out.diesel.unwrap().source_id, "c");
    }

    #[tokio::test]
    async fn failing_sources_leave_fields_unresolved() {
        let fetcher = Arc::new(StaticFetcher::new());
        let c = coordinator(vec![src("a", Some(94.72), Some(87.62))], fetcher.clone());
        let out = c.fetch("New Delhi", &CancelFlag::new()).await;
        assert_eq!(out.petrol, None);
        assert_eq!(out.diesel, None);
        assert!(!out.cancelled);
        assert_eq!(fetcher.requested().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_before_first_source() {
        let fetcher = Arc::new(all_pages(&["a"]));
        let c = coordinator(vec![src("a", Some(94.72), Some(87.62))], fetcher.clone());
        let cancel = CancelFlag::new();
        cancel.cancel();
        let out = c.fetch("New Delhi", &cancel).await;
        assert!(out.cancelled);
        assert!(out.petrol.is_none());
        assert!(fetcher.requested().is_empty());
    }

    /// Never answers within any sane deadline.
    struct Stalled;

    #[async_trait::async_trait]
    impl PageFetcher for Stalled {
        async fn fetch(&self, _url: &str) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("<html></html>".into())
        }
    }

    /// Stalls on one URL, serves the rest from a `StaticFetcher`.
    struct StallOn {
        url: &'static str,
        inner: StaticFetcher,
    }

    #[async_trait::async_trait]
    impl PageFetcher for StallOn {
        async fn fetch(&self, url: &str) -> anyhow::Result<String> {
            if url == self.url {
                return Stalled.fetch(url).await;
            }
            self.inner.fetch(url).await
        }
    }

    #[tokio::test]
    async fn hung_source_times_out_and_chain_moves_on() {
        let fetcher = Arc::new(StallOn {
            url: "https://a.test/",
            inner: all_pages(&["b"]),
        });
        let c = FallbackCoordinator::new(
            vec![src("a", Some(99.0), Some(88.0)), src("b", Some(94.72), Some(87.62))],
            fetcher.clone(),
            PlausibilityFilter::default(),
        )
        .with_delay(Duration::ZERO)
        .with_timeout(Duration::from_millis(10));

        let started = std::time::Instant::now();
        let out = c.fetch("New Delhi", &CancelFlag::new()).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(out.petrol.unwrap().source_id, "b");
        assert_eq!(out.diesel.unwrap().source_id, "b");
        assert_eq!(fetcher.inner.requested(), vec!["https://b.test/"]);
    }

    #[test]
    fn failed_source_still_records_latency() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let c = coordinator(vec![src("a", Some(94.72), Some(87.62))], Arc::new(StaticFetcher::new()));

        let out = metrics::with_local_recorder(&recorder, || {
            tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap()
                .block_on(c.fetch("New Delhi", &CancelFlag::new()))
        });

        assert!(out.petrol.is_none());
        let rendered = handle.render();
        assert!(rendered.contains("fetch_source_ms_count 1"), "{rendered}");
        assert!(rendered.contains("fetch_source_errors_total 1"), "{rendered}");
    }
}
