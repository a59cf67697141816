//! Concurrent acquisition scheduler and per-unit worker.

use chrono::Utc;
use daybook_fetch::{ClientError, PriceSource, RateLimiter};
use daybook_store::{Store, UpsertOutcome};
use daybook_types::{FetchUnit, HistoryRecord};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::report::{FailureKind, FetchOutcome, RunReport, UnitFailure, UnitResult};
use crate::{CancelFlag, RetryPolicy};

/// Configuration for an acquisition run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum concurrent units in flight. 1 means strictly sequential.
    pub concurrency: usize,
    /// Replace existing rows instead of leaving them untouched.
    pub overwrite: bool,
    /// Retry discipline for transient fetch failures.
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: std::thread::available_parallelism()
                .map_or(4, std::num::NonZeroUsize::get),
            overwrite: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// The bulk acquisition engine.
///
/// Dispatches (asset, date) units to a bounded set of concurrent workers.
/// Units are independent: outcomes never depend on another unit's result or
/// timing beyond the shared rate limiter and the store's accumulated state,
/// and one failing unit never aborts the run.
pub struct Engine {
    source: Arc<dyn PriceSource>,
    store: Store,
    limiter: Arc<RateLimiter>,
    config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine over a fetch source, a store, and a shared rate
    /// limiter.
    #[must_use]
    pub fn new(
        source: Arc<dyn PriceSource>,
        store: Store,
        limiter: Arc<RateLimiter>,
        config: EngineConfig,
    ) -> Self {
        Self {
            source,
            store,
            limiter,
            config,
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs a unit set to completion and returns the report.
    pub async fn run(&self, units: Vec<FetchUnit>, cancel: &CancelFlag) -> RunReport {
        self.run_each(units, cancel, |_| {}).await
    }

    /// Runs a unit set, invoking `on_result` as each unit reaches its
    /// terminal outcome (completion order, not submission order).
    ///
    /// The run ends when every unit has a terminal outcome, or earlier when
    /// `cancel` is tripped: dispatching stops promptly, in-flight units
    /// finish, and the report covers everything completed so far. A store
    /// that becomes unavailable aborts the same way and is recorded on the
    /// report as fatal.
    pub async fn run_each(
        &self,
        units: Vec<FetchUnit>,
        cancel: &CancelFlag,
        mut on_result: impl FnMut(&UnitResult),
    ) -> RunReport {
        let run_id = Uuid::new_v4();
        let planned = units.len();
        let started_at = Utc::now();
        let concurrency = self.config.concurrency.max(1);
        info!(
            %run_id,
            planned,
            concurrency,
            overwrite = self.config.overwrite,
            "run started"
        );

        // Tripped internally when the store goes away; the operator's
        // `cancel` flag stays untouched.
        let halt = CancelFlag::new();
        let mut fatal: Option<String> = None;
        let mut results = Vec::with_capacity(planned);

        {
            let halt_ref = &halt;
            let mut outcomes = stream::iter(units)
                .map(|unit| async move {
                    if cancel.is_cancelled() || halt_ref.is_cancelled() {
                        return None;
                    }
                    self.process_unit(&unit, cancel, halt_ref)
                        .await
                        .map(|outcome| UnitResult { unit, outcome })
                })
                .buffer_unordered(concurrency);

            while let Some(item) = outcomes.next().await {
                let Some(result) = item else { continue };
                if let FetchOutcome::Failed(failure) = &result.outcome {
                    if failure.kind == FailureKind::StorageUnavailable && fatal.is_none() {
                        error!(%run_id, reason = %failure.reason, "storage unavailable, aborting run");
                        fatal = Some(failure.reason.clone());
                        halt.cancel();
                    }
                }
                on_result(&result);
                results.push(result);
            }
        }

        let report = RunReport {
            run_id,
            planned,
            results,
            cancelled: cancel.is_cancelled(),
            fatal,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            %run_id,
            stored = report.stored(),
            already_present = report.already_present(),
            failed = report.failed(),
            skipped = report.skipped(),
            cancelled = report.cancelled,
            "run finished"
        );
        report
    }

    /// Drives one unit to a terminal outcome.
    ///
    /// Returns `None` only when the run is cancelled between retries; the
    /// unit then counts as never dispatched.
    async fn process_unit(
        &self,
        unit: &FetchUnit,
        cancel: &CancelFlag,
        halt: &CancelFlag,
    ) -> Option<FetchOutcome> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            // Every attempt, retries included, goes through the limiter
            self.limiter.acquire().await;

            match self.source.fetch_daily(&unit.asset_id, unit.date).await {
                Ok(quote) => {
                    let record = HistoryRecord::new(unit.asset_id.clone(), unit.date, quote);
                    return Some(self.persist(unit, &record, attempts).await);
                }
                Err(err) if err.is_transient() && attempts <= self.config.retry.max_retries => {
                    let hint = match &err {
                        ClientError::RateLimited { retry_after } => *retry_after,
                        _ => None,
                    };
                    let delay = self.config.retry.delay_for(attempts, hint);
                    debug!(
                        unit = %unit,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    sleep(delay).await;
                    if cancel.is_cancelled() || halt.is_cancelled() {
                        debug!(unit = %unit, "abandoning retries, run cancelled");
                        return None;
                    }
                }
                Err(err) => {
                    let kind = match &err {
                        ClientError::RateLimited { .. } => FailureKind::RateLimited,
                        ClientError::Transient(_) => FailureKind::Transient,
                        ClientError::Permanent(_) | ClientError::Decode(_) => {
                            FailureKind::Permanent
                        }
                    };
                    warn!(unit = %unit, attempts, error = %err, "unit failed");
                    return Some(FetchOutcome::Failed(UnitFailure {
                        kind,
                        reason: err.to_string(),
                        attempts,
                    }));
                }
            }
        }
    }

    /// Persists a fetched record; a persistence failure is a unit failure,
    /// never a silent `Stored`.
    async fn persist(
        &self,
        unit: &FetchUnit,
        record: &HistoryRecord,
        attempts: u32,
    ) -> FetchOutcome {
        match self.store.store_record(record, self.config.overwrite).await {
            Ok(UpsertOutcome::Inserted) => {
                debug!(unit = %unit, price = ?record.price, "stored");
                FetchOutcome::Stored
            }
            Ok(UpsertOutcome::AlreadyPresent) => {
                debug!(unit = %unit, "already present");
                FetchOutcome::AlreadyPresent
            }
            Err(err) => {
                let kind = if err.is_unavailable() {
                    FailureKind::StorageUnavailable
                } else {
                    FailureKind::Storage
                };
                warn!(unit = %unit, error = %err, "persistence failed");
                FetchOutcome::Failed(UnitFailure {
                    kind,
                    reason: err.to_string(),
                    attempts,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use daybook_types::{DailyQuote, DateRange};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Deterministic fake remote: the price is derived from the date, and
    /// failures are scripted per date.
    struct ScriptedSource {
        permanent_failures: HashSet<NaiveDate>,
        always_rate_limited: bool,
        per_call_delay: Option<Duration>,
        calls: AtomicU32,
    }

    impl ScriptedSource {
        fn ok() -> Self {
            Self {
                permanent_failures: HashSet::new(),
                always_rate_limited: false,
                per_call_delay: None,
                calls: AtomicU32::new(0),
            }
        }

        fn price_for(date: NaiveDate) -> f64 {
            f64::from(chrono::Datelike::day(&date)) * 100.0
                + f64::from(chrono::Datelike::month(&date))
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedSource {
        async fn fetch_daily(
            &self,
            _asset_id: &str,
            date: NaiveDate,
        ) -> Result<DailyQuote, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.per_call_delay {
                sleep(delay).await;
            }
            if self.always_rate_limited {
                return Err(ClientError::RateLimited { retry_after: None });
            }
            if self.permanent_failures.contains(&date) {
                return Err(ClientError::Permanent("404: coin not found".to_string()));
            }
            let price = Self::price_for(date);
            Ok(DailyQuote::from_payload(json!({
                "market_data": { "current_price": { "usd": price } }
            })))
        }
    }

    async fn engine_with(
        source: Arc<ScriptedSource>,
        config: EngineConfig,
    ) -> (TempDir, Store, Engine) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("daybook.db")).await.unwrap();
        // Generous ceiling: limiter behavior has its own tests
        let limiter = Arc::new(RateLimiter::new(10_000, Duration::from_secs(60)));
        let engine = Engine::new(source, store.clone(), limiter, config);
        (dir, store, engine)
    }

    fn january_units(asset: &str, days: u32) -> Vec<FetchUnit> {
        let range = DateRange::new(ymd(2024, 1, 1), ymd(2024, 1, days)).unwrap();
        FetchUnit::expand(&[asset.to_string()], range).unwrap()
    }

    #[tokio::test]
    async fn test_run_stores_every_unit() {
        let (_dir, store, engine) = engine_with(Arc::new(ScriptedSource::ok()), EngineConfig::default()).await;

        let report = engine
            .run(january_units("bitcoin", 5), &CancelFlag::new())
            .await;

        assert_eq!(report.stored(), 5);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.skipped(), 0);
        assert!(!report.has_failures());
        assert_eq!(store.history_count().await.unwrap(), 5);

        let aggs = store
            .monthly_aggregates("bitcoin", None, None)
            .await
            .unwrap();
        assert_eq!(aggs.len(), 1);
        assert_eq!(aggs[0].min_price, ScriptedSource::price_for(ymd(2024, 1, 1)));
        assert_eq!(aggs[0].max_price, ScriptedSource::price_for(ymd(2024, 1, 5)));
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let (_dir, store, engine) = engine_with(Arc::new(ScriptedSource::ok()), EngineConfig::default()).await;
        let units = january_units("bitcoin", 5);

        let first = engine.run(units.clone(), &CancelFlag::new()).await;
        assert_eq!(first.stored(), 5);
        let aggs_before = store
            .monthly_aggregates("bitcoin", None, None)
            .await
            .unwrap();

        let second = engine.run(units, &CancelFlag::new()).await;
        assert_eq!(second.stored(), 0);
        assert_eq!(second.already_present(), 5);
        assert!(!second.has_failures());

        assert_eq!(store.history_count().await.unwrap(), 5);
        let aggs_after = store
            .monthly_aggregates("bitcoin", None, None)
            .await
            .unwrap();
        assert_eq!(aggs_before.len(), aggs_after.len());
        assert_eq!(aggs_before[0].min_price, aggs_after[0].min_price);
        assert_eq!(aggs_before[0].max_price, aggs_after[0].max_price);
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let mut source = ScriptedSource::ok();
        source.permanent_failures.insert(ymd(2024, 1, 5));
        let (_dir, store, engine) = engine_with(Arc::new(source), EngineConfig::default()).await;

        let report = engine
            .run(january_units("bitcoin", 10), &CancelFlag::new())
            .await;

        assert_eq!(report.stored(), 9);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 0);

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures[0].0.date, ymd(2024, 1, 5));
        assert_eq!(failures[0].1.kind, FailureKind::Permanent);
        // Permanent failures are not retried.
        assert_eq!(failures[0].1.attempts, 1);

        assert_eq!(store.history_count().await.unwrap(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_unit_exhausts_bounded_retries() {
        let mut source = ScriptedSource::ok();
        source.always_rate_limited = true;
        let source = Arc::new(source);
        let config = EngineConfig {
            concurrency: 1,
            retry: RetryPolicy {
                max_retries: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        let (_dir, store, engine) = engine_with(Arc::clone(&source), config).await;

        let units = vec![FetchUnit::new("bitcoin", ymd(2024, 1, 1)).unwrap()];
        let report = engine.run(units, &CancelFlag::new()).await;

        assert_eq!(report.failed(), 1);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures[0].1.kind, FailureKind::RateLimited);
        // max_retries + 1 attempts in total.
        assert_eq!(failures[0].1.attempts, 3);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.history_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrency_and_order_converge_on_same_aggregates() {
        let sequential_cfg = EngineConfig {
            concurrency: 1,
            ..Default::default()
        };
        let concurrent_cfg = EngineConfig {
            concurrency: 8,
            ..Default::default()
        };

        let (_dir_a, store_a, engine_a) =
            engine_with(Arc::new(ScriptedSource::ok()), sequential_cfg).await;
        let (_dir_b, store_b, engine_b) = engine_with(Arc::new(ScriptedSource::ok()), concurrent_cfg).await;

        // Two assets across a month boundary, and a reversed permutation
        // for the concurrent run.
        let range = DateRange::new(ymd(2024, 1, 28), ymd(2024, 2, 3)).unwrap();
        let assets = vec!["bitcoin".to_string(), "ethereum".to_string()];
        let units = FetchUnit::expand(&assets, range).unwrap();
        let mut reversed = units.clone();
        reversed.reverse();

        let report_a = engine_a.run(units, &CancelFlag::new()).await;
        let report_b = engine_b.run(reversed, &CancelFlag::new()).await;
        assert!(!report_a.has_failures());
        assert!(!report_b.has_failures());

        assert_eq!(
            store_a.history_count().await.unwrap(),
            store_b.history_count().await.unwrap()
        );
        for asset in &assets {
            let a = store_a.monthly_aggregates(asset, None, None).await.unwrap();
            let b = store_b.monthly_aggregates(asset, None, None).await.unwrap();
            assert_eq!(a.len(), b.len());
            for (x, y) in a.iter().zip(&b) {
                assert_eq!((x.year, x.month), (y.year, y.month));
                assert_eq!(x.min_price, y.min_price);
                assert_eq!(x.max_price, y.max_price);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_dispatch_and_keeps_committed_state() {
        let mut source = ScriptedSource::ok();
        source.per_call_delay = Some(Duration::from_millis(50));
        let source = Arc::new(source);
        let config = EngineConfig {
            concurrency: 2,
            ..Default::default()
        };
        let (_dir, store, engine) = engine_with(source, config).await;

        let cancel = CancelFlag::new();
        let cancel_trigger = cancel.clone();
        let mut seen = 0u32;
        let report = engine
            .run_each(january_units("bitcoin", 20), &cancel, |_| {
                seen += 1;
                if seen == 3 {
                    cancel_trigger.cancel();
                }
            })
            .await;

        assert!(report.cancelled);
        assert!(report.skipped() > 0);
        assert!(report.results.len() < report.planned);

        // Every reported `Stored` corresponds to a fully committed row.
        for result in &report.results {
            if result.outcome == FetchOutcome::Stored {
                let row = store
                    .history_record(&result.unit.asset_id, result.unit.date)
                    .await
                    .unwrap();
                assert!(row.is_some(), "missing committed row for {}", result.unit);
            }
        }
        assert_eq!(store.history_count().await.unwrap(), report.stored() as u64);
    }

    #[tokio::test]
    async fn test_storage_unavailable_aborts_run() {
        let config = EngineConfig {
            concurrency: 1,
            ..Default::default()
        };
        let (_dir, store, engine) = engine_with(Arc::new(ScriptedSource::ok()), config).await;

        // Kill the pool out from under the engine.
        store.close().await;

        let report = engine
            .run(january_units("bitcoin", 5), &CancelFlag::new())
            .await;

        assert!(report.fatal.is_some());
        assert!(report.has_failures());
        assert!(!report.cancelled);
        // The first unit failed; the rest were never dispatched.
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.skipped(), 4);
    }
}
