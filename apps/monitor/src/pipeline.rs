//! One monitoring run: fetch, record, compare, classify, notify.

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use pricewatch_alerts::{DispatchSummary, Dispatcher};
use pricewatch_core::{PriceObservation, ProductId, ProductTarget};
use pricewatch_engine::{classify, Alert, AlertBatch, AlertThreshold, ChangeDetector, Detection};
use pricewatch_feeds::{FeedError, ScraperClient, TargetScrape};
use pricewatch_store::{AlertRecord, PriceStore, StorageError};
use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// What happened to one product during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ProductOutcome {
    /// Observation recorded and compared with the previous one.
    Stored,
    /// Compared with stored history without a new observation.
    Checked,
    /// No baseline to compare against.
    Skipped,
    /// Same product already observed earlier in this run; not recorded.
    Duplicate,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductReport {
    pub retailer: String,
    pub url: String,
    #[serde(flatten)]
    pub outcome: ProductOutcome,
}

impl ProductReport {
    fn new(product: &ProductId, outcome: ProductOutcome) -> Self {
        Self {
            retailer: product.retailer.to_string(),
            url: product.url.clone(),
            outcome,
        }
    }

    fn for_target(target: &ProductTarget, outcome: ProductOutcome) -> Self {
        Self {
            retailer: target.retailer.clone(),
            url: target.url.clone(),
            outcome,
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub products_scraped: usize,
    pub products_stored: usize,
    pub targets_failed: usize,
    pub outcomes: Vec<ProductReport>,
    pub alerts: Vec<Alert>,
    pub dispatch: Option<DispatchSummary>,
    pub total_records: i64,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
}

fn serialize_secs<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64((duration.as_secs_f64() * 100.0).round() / 100.0)
}

impl RunSummary {
    pub fn count(&self, wanted: fn(&ProductOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|r| wanted(&r.outcome)).count()
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ProductOutcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ProductOutcome::Skipped))
    }

    /// Every target failed to produce an observation.
    pub fn nothing_scraped(&self, targets: usize) -> bool {
        targets > 0 && self.targets_failed == targets
    }

    pub fn log(&self) {
        info!(
            scraped = self.products_scraped,
            stored = self.products_stored,
            skipped = self.skipped(),
            failed = self.failed(),
            alerts = self.alerts.len(),
            total_records = self.total_records,
            duration_secs = self.duration.as_secs_f64(),
            "Run complete"
        );
    }
}

/// Fetch every target with bounded concurrency, in target order.
pub async fn fetch_all(
    client: &ScraperClient,
    targets: &[ProductTarget],
) -> Vec<(ProductTarget, Result<TargetScrape, FeedError>)> {
    let observed_at = Utc::now();
    let concurrency = client.settings().concurrency.max(1);
    info!(targets = targets.len(), concurrency, "Scraping targets");

    stream::iter(targets)
        .map(|target| async move { (target.clone(), client.scrape(target, observed_at).await) })
        .buffered(concurrency)
        .collect()
        .await
}

/// Dry run: scrape and normalize without touching the store.
pub async fn dry_run(client: &ScraperClient, targets: &[ProductTarget]) -> Vec<PriceObservation> {
    let mut observations = Vec::new();
    for (target, result) in fetch_all(client, targets).await {
        match result {
            Ok(scrape) => observations.extend(scrape.observations),
            Err(e) => error!(retailer = %target.retailer, error = %e, "Scrape failed"),
        }
    }
    observations
}

pub struct Pipeline<'a> {
    store: &'a PriceStore,
    dispatcher: &'a Dispatcher,
    threshold: AlertThreshold,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a PriceStore, dispatcher: &'a Dispatcher, threshold: AlertThreshold) -> Self {
        Self {
            store,
            dispatcher,
            threshold,
        }
    }

    /// Full run over `targets`.
    pub async fn run(&self, client: &ScraperClient, targets: &[ProductTarget]) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        let mut batch = AlertBatch::new();
        let mut seen = HashSet::new();

        for (target, result) in fetch_all(client, targets).await {
            let scrape = match result {
                Ok(scrape) => scrape,
                Err(e) => {
                    error!(
                        retailer = %target.retailer,
                        error = %e,
                        transient = e.is_transient(),
                        "Scrape failed"
                    );
                    summary.targets_failed += 1;
                    summary
                        .outcomes
                        .push(ProductReport::for_target(&target, ProductOutcome::Failed(e.to_string())));
                    continue;
                }
            };

            if scrape.observations.is_empty() && scrape.rejected.is_empty() {
                warn!(retailer = %target.retailer, "Provider returned no products");
                summary.targets_failed += 1;
                summary.outcomes.push(ProductReport::for_target(
                    &target,
                    ProductOutcome::Failed("provider returned no products".to_string()),
                ));
            }
            for reason in &scrape.rejected {
                summary
                    .outcomes
                    .push(ProductReport::for_target(&target, ProductOutcome::Failed(reason.to_string())));
            }

            summary.products_scraped += scrape.observations.len();
            for observation in &scrape.observations {
                let outcome = if seen.insert(observation.product.clone()) {
                    self.process(observation, &mut batch).await
                } else {
                    warn!(product = %observation.product, "Duplicate product in run, keeping the first");
                    ProductOutcome::Duplicate
                };
                if matches!(outcome, ProductOutcome::Stored | ProductOutcome::Skipped) {
                    summary.products_stored += 1;
                }
                summary
                    .outcomes
                    .push(ProductReport::new(&observation.product, outcome));
            }
        }

        self.finish(summary, batch, started).await
    }

    /// Compare the stored history of every known product without scraping.
    pub async fn detect_only(&self) -> Result<RunSummary, StorageError> {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        let mut batch = AlertBatch::new();

        let products = self.store.products().await?;
        info!(products = products.len(), "Detecting changes in stored history");
        for product in &products {
            let outcome = match self.compare(product, &mut batch).await {
                ProductOutcome::Stored => ProductOutcome::Checked,
                other => other,
            };
            summary.outcomes.push(ProductReport::new(product, outcome));
        }

        Ok(self.finish(summary, batch, started).await)
    }

    /// Record one observation and compare it with its predecessor.
    async fn process(&self, observation: &PriceObservation, batch: &mut AlertBatch) -> ProductOutcome {
        if let Err(e) = self.store.record(observation).await {
            error!(product = %observation.product, error = %e, "Failed to record observation");
            return ProductOutcome::Failed(e.to_string());
        }
        self.compare(&observation.product, batch).await
    }

    async fn compare(&self, product: &ProductId, batch: &mut AlertBatch) -> ProductOutcome {
        match ChangeDetector::new(self.store).detect(product).await {
            Ok(Detection::NoPriorData) => {
                info!(product = %product, "First observation, nothing to compare");
                ProductOutcome::Skipped
            }
            Ok(Detection::Delta(delta)) => {
                if let Some(alert) = classify(&delta, self.threshold) {
                    batch.push(alert);
                }
                ProductOutcome::Stored
            }
            Err(e) => {
                error!(product = %product, error = %e, "Change detection failed");
                ProductOutcome::Failed(e.to_string())
            }
        }
    }

    async fn finish(&self, mut summary: RunSummary, batch: AlertBatch, started: Instant) -> RunSummary {
        let alerts = batch.into_alerts();
        info!(
            alerts = alerts.len(),
            threshold_pct = self.threshold.pct(),
            "Change detection complete"
        );

        for alert in &alerts {
            if let Err(e) = self.store.record_alert(&AlertRecord::from(alert)).await {
                error!(product = %alert.product, error = %e, "Failed to record alert");
            }
        }
        if !alerts.is_empty() {
            summary.dispatch = Some(self.dispatcher.dispatch(&alerts).await);
        }

        match self.store.stats().await {
            Ok(stats) => summary.total_records = stats.total_records,
            Err(e) => warn!(error = %e, "Could not read store statistics"),
        }
        summary.alerts = alerts;
        summary.duration = started.elapsed();
        summary
    }
}
