//! PumpEngine - the purge loop
//!
//! Every tick drains the analytics set, decodes it, applies global
//! redaction and fans the batch out to the sinks. The sink list and the
//! store handle are fixed once the engine is built.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{
    AnalyticsRecord, AnalyticsStore, ContractError, OverrunPolicy, PumpBlueprint,
};
use dispatcher::{initialize_pumps, CycleReport, FanOut, SinkRegistry};
use observability::{MetricsSummary, PumpMetricsAggregator};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::codec::{DecodedBatch, RecordCodec};

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// The backing store rejected its options
    #[error("store '{kind}' init failed: {source}")]
    StoreInit {
        kind: String,
        #[source]
        source: ContractError,
    },

    /// Purge interval must be nonzero
    #[error("purge interval must be greater than zero")]
    InvalidInterval,
}

/// Engine settings derived from the blueprint
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tick period
    pub purge_interval: Duration,
    /// Strip policy/decision traces before any sink sees a record
    pub omit_detailed_recording: bool,
    /// Store set drained every tick
    pub analytics_key: String,
    /// What to do with ticks that arrive while a cycle is running
    pub overrun_policy: OverrunPolicy,
}

impl EngineConfig {
    pub fn from_blueprint(blueprint: &PumpBlueprint) -> Self {
        Self {
            purge_interval: blueprint.purge_interval(),
            omit_detailed_recording: blueprint.omit_detailed_recording,
            analytics_key: blueprint.analytics_key.clone(),
            overrun_policy: blueprint.overrun_policy,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_blueprint(&PumpBlueprint::default())
    }
}

/// The purge scheduler and everything it drives
pub struct PumpEngine {
    config: EngineConfig,
    store: Arc<dyn AnalyticsStore>,
    fanout: FanOut,
    codec: RecordCodec,
    stats: Mutex<PumpMetricsAggregator>,
}

impl PumpEngine {
    /// Assemble an engine from ready parts
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn AnalyticsStore>,
        fanout: FanOut,
        codec: RecordCodec,
    ) -> Result<Self, EngineError> {
        if config.purge_interval.is_zero() {
            return Err(EngineError::InvalidInterval);
        }
        Ok(Self {
            config,
            store,
            fanout,
            codec,
            stats: Mutex::default(),
        })
    }

    /// Initialize the store and every configured sink
    ///
    /// A store failure is fatal. A sink that cannot be resolved or
    /// initialized is logged and left out.
    #[instrument(
        name = "engine_initialize",
        skip_all,
        fields(store = %blueprint.store.kind, pumps = blueprint.pumps.len())
    )]
    pub async fn initialize(
        blueprint: &PumpBlueprint,
        registry: &SinkRegistry,
        mut store: Box<dyn AnalyticsStore>,
    ) -> Result<Self, EngineError> {
        let kind = store.kind().to_string();
        store
            .init(&blueprint.store.options)
            .await
            .map_err(|source| EngineError::StoreInit { kind, source })?;

        let config = EngineConfig::from_blueprint(blueprint);
        let handles = initialize_pumps(registry, &blueprint.pumps).await;
        if handles.is_empty() {
            warn!("No pumps initialized, drained records will be discarded");
        }

        let fanout = FanOut::new(handles, config.purge_interval);
        Self::new(
            config,
            Arc::from(store),
            fanout,
            RecordCodec::new(blueprint.record_format),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fanout(&self) -> &FanOut {
        &self.fanout
    }

    /// Run statistics accumulated so far
    pub fn summary(&self) -> MetricsSummary {
        self.stats().summary()
    }

    fn stats(&self) -> MutexGuard<'_, PumpMetricsAggregator> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One purge cycle
    ///
    /// An empty drain does nothing. A failed drain is logged and the cycle
    /// ends; the set is retried next tick.
    #[instrument(name = "purge_cycle", skip(self), fields(key = %self.config.analytics_key))]
    pub async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();

        let entries = match self.store.get_and_delete_set(&self.config.analytics_key).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Failed to drain analytics set");
                return self.finish(CycleReport::default(), started);
            }
        };

        if entries.is_empty() {
            debug!("Nothing to purge");
            return self.finish(CycleReport::default(), started);
        }

        let DecodedBatch {
            mut records,
            dropped,
        } = self.codec.decode_batch(&entries);

        if self.config.omit_detailed_recording {
            records.iter_mut().for_each(AnalyticsRecord::redact_details);
        }

        if records.is_empty() {
            warn!(dropped, "No decodable records in drained set");
        }
        // sinks still see the (possibly empty) batch of a non-empty drain
        let mut report = self.fanout.dispatch(records.into()).await;

        report.drained = entries.len();
        report.dropped = dropped;

        info!(
            drained = report.drained,
            dropped = report.dropped,
            sinks = report.outcomes.len(),
            written = report.written(),
            "Purge cycle complete"
        );

        self.finish(report, started)
    }

    fn finish(&self, mut report: CycleReport, started: Instant) -> CycleReport {
        report.elapsed = started.elapsed();
        let elapsed_ms = report.elapsed.as_secs_f64() * 1000.0;

        observability::record_cycle(report.drained, report.dropped, elapsed_ms);

        let mut stats = self.stats();
        stats.update_cycle(report.drained, report.dropped, elapsed_ms);
        for outcome in &report.outcomes {
            stats.update_sink(&outcome.sink, outcome.outcome.status());
        }

        report
    }

    /// Run the purge loop forever
    pub async fn run(self: Arc<Self>) {
        self.run_until(CancellationToken::new()).await;
    }

    /// Run the purge loop until `shutdown` fires
    ///
    /// The first tick comes one interval after start. Ticks missed while a
    /// cycle runs are skipped, never bursted. Writes still in flight when
    /// the loop stops are left to finish on their own.
    #[instrument(name = "purge_loop", skip_all, fields(purge_delay_secs = self.config.purge_interval.as_secs()))]
    pub async fn run_until(self: Arc<Self>, shutdown: CancellationToken) {
        let period = self.config.purge_interval;
        let Some(first_tick) = Instant::now().checked_add(period) else {
            warn!(
                purge_delay_secs = period.as_secs(),
                "Purge interval beyond the clock range, no cycle will run"
            );
            shutdown.cancelled().await;
            info!("Purge loop stopped");
            return;
        };
        let mut ticker = interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            sinks = self.fanout.len(),
            policy = ?self.config.overrun_policy,
            "Starting purge loop"
        );

        let mut in_flight: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.config.overrun_policy {
                OverrunPolicy::Block => {
                    tokio::select! {
                        _ = self.run_cycle() => {}
                        () = shutdown.cancelled() => {
                            warn!("Shutdown requested during a purge cycle");
                            break;
                        }
                    }
                }
                OverrunPolicy::SkipMissedTicks => {
                    if in_flight.as_ref().is_some_and(|task| !task.is_finished()) {
                        warn!("Previous purge cycle still running, skipping tick");
                        continue;
                    }
                    let engine = Arc::clone(&self);
                    in_flight = Some(tokio::spawn(async move {
                        engine.run_cycle().await;
                    }));
                }
            }
        }

        info!("Purge loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        AnalyticsSink, BoxFuture, Filter, FilterRule, RecordBatch, RecordField, RecordFormat,
        SinkConfig, SinkParams, StoreConfig, WriteContext,
    };
    use dispatcher::{PumpHandle, WriteOutcome};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage::MemoryStore;

    const KEY: &str = contracts::ANALYTICS_KEY_NAME;

    #[derive(Clone, Default)]
    struct RecordingSink {
        delay: Duration,
        calls: Arc<AtomicUsize>,
        received: Arc<Mutex<Vec<AnalyticsRecord>>>,
    }

    impl AnalyticsSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        fn init<'a>(
            &'a mut self,
            _params: &'a SinkParams,
        ) -> BoxFuture<'a, Result<(), ContractError>> {
            Box::pin(async { Ok(()) })
        }

        fn write_data<'a>(
            &'a self,
            _ctx: &'a WriteContext,
            records: RecordBatch,
        ) -> BoxFuture<'a, Result<(), ContractError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                self.received.lock().unwrap().extend(records.iter().cloned());
                Ok(())
            })
        }
    }

    fn record(timestamp: i64, outcome: &str) -> AnalyticsRecord {
        AnalyticsRecord {
            timestamp,
            outcome: outcome.into(),
            policies: "p".into(),
            deciders: "d".into(),
            ..Default::default()
        }
    }

    fn push(store: &MemoryStore, record: &AnalyticsRecord) {
        store.push(KEY, RecordCodec::default().encode(record).unwrap());
    }

    fn engine(
        config: EngineConfig,
        store: Arc<MemoryStore>,
        handles: Vec<PumpHandle>,
    ) -> Arc<PumpEngine> {
        let fanout = FanOut::new(handles, config.purge_interval);
        Arc::new(PumpEngine::new(config, store, fanout, RecordCodec::default()).unwrap())
    }

    #[tokio::test]
    async fn test_cycle_decodes_redacts_and_dispatches() {
        let store = Arc::new(MemoryStore::new());
        push(&store, &record(1, "allow"));
        store.push(KEY, vec![0xc1]);
        push(&store, &record(3, "deny"));

        let sink = RecordingSink::default();
        let received = Arc::clone(&sink.received);
        let config = EngineConfig {
            omit_detailed_recording: true,
            ..Default::default()
        };
        let engine = engine(config, Arc::clone(&store), vec![PumpHandle::new(Arc::new(sink))]);

        let report = engine.run_cycle().await;

        assert_eq!(report.drained, 3);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.records, 2);
        assert!(matches!(report.get("recording"), Some(WriteOutcome::Written { records: 2 })));
        assert!(store.is_empty(KEY));

        let received = received.lock().unwrap();
        let timestamps: Vec<i64> = received.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![1, 3]);
        assert!(received.iter().all(AnalyticsRecord::is_redacted));
    }

    #[tokio::test]
    async fn test_empty_drain_does_nothing() {
        let sink = RecordingSink::default();
        let calls = Arc::clone(&sink.calls);
        let engine = engine(
            EngineConfig::default(),
            Arc::new(MemoryStore::new()),
            vec![PumpHandle::new(Arc::new(sink))],
        );

        let report = engine.run_cycle().await;

        assert_eq!(report.drained, 0);
        assert!(report.outcomes.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.summary().total_cycles, 1);
    }

    #[tokio::test]
    async fn test_no_sinks_still_drains() {
        let store = Arc::new(MemoryStore::new());
        push(&store, &record(1, "allow"));
        let engine = engine(EngineConfig::default(), Arc::clone(&store), Vec::new());

        let report = engine.run_cycle().await;

        assert_eq!(report.drained, 1);
        assert!(report.outcomes.is_empty());
        assert!(store.is_empty(KEY));
    }

    #[tokio::test]
    async fn test_undecodable_drain_still_reaches_sinks() {
        let store = Arc::new(MemoryStore::new());
        store.push(KEY, vec![0xc1]);
        store.push(KEY, vec![0xc1, 0x00]);

        let sink = RecordingSink::default();
        let calls = Arc::clone(&sink.calls);
        let engine = engine(
            EngineConfig::default(),
            Arc::clone(&store),
            vec![PumpHandle::new(Arc::new(sink))],
        );

        let report = engine.run_cycle().await;

        assert_eq!(report.drained, 2);
        assert_eq!(report.dropped, 2);
        assert_eq!(report.records, 0);
        assert!(matches!(report.get("recording"), Some(WriteOutcome::Written { records: 0 })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.is_empty(KEY));
    }

    #[tokio::test]
    async fn test_initialize_skips_bad_sinks() {
        let store = MemoryStore::new();
        push(&store, &record(1, "allow"));

        let mut registry = SinkRegistry::with_builtin();
        registry.register("recording", |_| Box::new(RecordingSink::default()));

        let blueprint = PumpBlueprint {
            purge_delay: 5,
            pumps: vec![
                SinkConfig {
                    name: "recording".into(),
                    filters: Filter::new(vec![FilterRule::include(
                        RecordField::Outcome,
                        ["allow"],
                    )]),
                    ..Default::default()
                },
                SinkConfig {
                    name: "events".into(),
                    sink_type: Some("kafka".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let engine = PumpEngine::initialize(&blueprint, &registry, Box::new(store))
            .await
            .unwrap();

        assert_eq!(engine.fanout().len(), 1);
        assert_eq!(engine.config().purge_interval, Duration::from_secs(5));

        let report = engine.run_cycle().await;
        assert!(matches!(report.get("recording"), Some(WriteOutcome::Written { records: 1 })));
    }

    #[tokio::test]
    async fn test_store_init_failure_is_fatal() {
        let blueprint = PumpBlueprint {
            store: StoreConfig {
                kind: "memory".into(),
                options: [("max_entries".to_string(), "lots".to_string())].into(),
            },
            ..Default::default()
        };

        let result = PumpEngine::initialize(
            &blueprint,
            &SinkRegistry::with_builtin(),
            Box::new(MemoryStore::new()),
        )
        .await;

        assert!(matches!(result, Err(EngineError::StoreInit { .. })));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = EngineConfig {
            purge_interval: Duration::ZERO,
            ..Default::default()
        };
        let result = PumpEngine::new(
            config,
            Arc::new(MemoryStore::new()),
            FanOut::new(Vec::new(), Duration::ZERO),
            RecordCodec::new(RecordFormat::Json),
        );
        assert!(matches!(result, Err(EngineError::InvalidInterval)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_interval() {
        let store = Arc::new(MemoryStore::new());
        push(&store, &record(1, "allow"));
        let config = EngineConfig {
            purge_interval: Duration::from_secs(10),
            ..Default::default()
        };
        let engine = engine(config, Arc::clone(&store), Vec::new());

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(&engine).run_until(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(store.len(KEY), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.is_empty(KEY));

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(engine.summary().total_cycles, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_interval_idles_until_shutdown() {
        let store = Arc::new(MemoryStore::new());
        push(&store, &record(1, "allow"));
        let config = EngineConfig {
            purge_interval: Duration::from_secs(u64::MAX),
            ..Default::default()
        };
        let engine = engine(config, Arc::clone(&store), Vec::new());

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(&engine).run_until(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(!task.is_finished());
        assert_eq!(store.len(KEY), 1);

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(engine.summary().total_cycles, 0);
    }

    async fn run_with_slow_sink(policy: OverrunPolicy) -> (usize, u64) {
        let store = Arc::new(MemoryStore::new());
        push(&store, &record(1, "allow"));

        let sink = RecordingSink {
            delay: Duration::from_secs(25),
            ..Default::default()
        };
        let calls = Arc::clone(&sink.calls);
        let config = EngineConfig {
            purge_interval: Duration::from_secs(10),
            overrun_policy: policy,
            ..Default::default()
        };
        let engine = engine(config, Arc::clone(&store), vec![PumpHandle::new(Arc::new(sink))]);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(&engine).run_until(shutdown.clone()));

        // cycle at t=10 runs until t=35; ticks at 20 and 30 are skipped
        tokio::time::sleep(Duration::from_secs(21)).await;
        push(&store, &record(2, "allow"));
        tokio::time::sleep(Duration::from_secs(24)).await;

        shutdown.cancel();
        task.await.unwrap();
        (calls.load(Ordering::SeqCst), engine.summary().total_cycles)
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_policy_never_overlaps() {
        // cycles at t=10 and t=40 only
        let (calls, cycles) = run_with_slow_sink(OverrunPolicy::Block).await;
        assert_eq!(calls, 2);
        assert_eq!(cycles, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_policy_never_overlaps() {
        let (calls, cycles) = run_with_slow_sink(OverrunPolicy::SkipMissedTicks).await;
        assert_eq!(calls, 2);
        assert_eq!(cycles, 1);
    }
}
