//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 配置 -> 存储 -> 清理循环 -> sinks 的端到端场景（暂停的 tokio 时钟）

#[cfg(test)]
mod contract_tests {
    use contracts::{AnalyticsRecord, PumpBlueprint, RecordFormat};
    use purger::RecordCodec;

    #[test]
    fn test_legacy_version_key_is_ignored() {
        let blueprint: PumpBlueprint =
            serde_json::from_str(r#"{"version": "V1", "purge_delay": 4}"#).unwrap();
        assert_eq!(blueprint.purge_delay, 4);
    }

    #[test]
    fn test_redaction_idempotent() {
        let mut record = AnalyticsRecord {
            username: "alice".into(),
            policies: "p".into(),
            deciders: "d".into(),
            ..Default::default()
        };
        record.redact_details();
        let once = record.clone();
        record.redact_details();
        assert_eq!(record, once);
        assert!(record.is_redacted());
        assert_eq!(record.username, "alice");
    }

    #[test]
    fn test_messagepack_wire_uses_field_names() {
        let raw = RecordCodec::new(RecordFormat::MessagePack)
            .encode(&AnalyticsRecord {
                username: "alice".into(),
                ..Default::default()
            })
            .unwrap();
        let needle = b"username";
        assert!(raw.windows(needle.len()).any(|w| w == needle));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        AnalyticsRecord, AnalyticsSink, BoxFuture, ContractError, PumpBlueprint, RecordBatch,
        SinkParams, WriteContext, ANALYTICS_KEY_NAME,
    };
    use dispatcher::{initialize_pumps, FanOut, SinkRegistry, WriteOutcome};
    use purger::{EngineConfig, PumpEngine, RecordCodec};
    use storage::MemoryStore;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    type Deliveries = Arc<Mutex<HashMap<String, Vec<AnalyticsRecord>>>>;

    /// Sink that keeps what it receives
    ///
    /// Params: `delay_ms` (write latency), `fail` (`"true"` to error).
    struct RecordingSink {
        name: String,
        delay: Duration,
        fail: bool,
        deliveries: Deliveries,
    }

    impl AnalyticsSink for RecordingSink {
        fn name(&self) -> &str {
            &self.name
        }

        fn init<'a>(
            &'a mut self,
            params: &'a SinkParams,
        ) -> BoxFuture<'a, Result<(), ContractError>> {
            Box::pin(async move {
                if let Some(ms) = params.get("delay_ms") {
                    let ms = ms
                        .parse()
                        .map_err(|_| ContractError::sink_init(&self.name, "bad delay_ms"))?;
                    self.delay = Duration::from_millis(ms);
                }
                self.fail = params.get("fail").is_some_and(|v| v == "true");
                Ok(())
            })
        }

        fn write_data<'a>(
            &'a self,
            ctx: &'a WriteContext,
            records: RecordBatch,
        ) -> BoxFuture<'a, Result<(), ContractError>> {
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                if let Some(reason) = ctx.err() {
                    return Err(ContractError::sink_write(&self.name, reason.to_string()));
                }
                if self.fail {
                    return Err(ContractError::sink_write(&self.name, "backend unavailable"));
                }
                self.deliveries
                    .lock()
                    .unwrap()
                    .entry(self.name.clone())
                    .or_default()
                    .extend(records.iter().cloned());
                Ok(())
            })
        }
    }

    fn registry(deliveries: &Deliveries) -> SinkRegistry {
        let mut registry = SinkRegistry::with_builtin();
        let deliveries = Arc::clone(deliveries);
        registry.register("recording", move |name| {
            Box::new(RecordingSink {
                name: name.to_string(),
                delay: Duration::ZERO,
                fail: false,
                deliveries: Arc::clone(&deliveries),
            })
        });
        registry
    }

    fn record(timestamp: i64, outcome: &str) -> AnalyticsRecord {
        AnalyticsRecord {
            timestamp,
            username: format!("user-{timestamp}"),
            method: "POST".into(),
            path: "/v1/authz".into(),
            outcome: outcome.into(),
            policies: "policy-trace".into(),
            deciders: "decider-trace".into(),
            ..Default::default()
        }
    }

    fn push_all(store: &MemoryStore, codec: RecordCodec, records: &[AnalyticsRecord]) {
        for record in records {
            store.push(ANALYTICS_KEY_NAME, codec.encode(record).unwrap());
        }
    }

    fn delivered(deliveries: &Deliveries, sink: &str) -> Vec<AnalyticsRecord> {
        deliveries
            .lock()
            .unwrap()
            .get(sink)
            .cloned()
            .unwrap_or_default()
    }

    async fn build_engine(
        blueprint: &PumpBlueprint,
        deliveries: &Deliveries,
        store: Arc<MemoryStore>,
    ) -> Arc<PumpEngine> {
        let handles = initialize_pumps(&registry(deliveries), &blueprint.pumps).await;
        let fanout = FanOut::new(handles, blueprint.purge_interval());
        let engine = PumpEngine::new(
            EngineConfig::from_blueprint(blueprint),
            store,
            fanout,
            RecordCodec::new(blueprint.record_format),
        )
        .unwrap();
        Arc::new(engine)
    }

    fn scenario_config(b_delay_ms: u64) -> PumpBlueprint {
        let toml = format!(
            r#"
purge_delay = 3

[[pumps]]
name = "A"
sink_type = "recording"

[[pumps]]
name = "B"
sink_type = "recording"
timeout = 1
[pumps.params]
delay_ms = "{b_delay_ms}"
[[pumps.filters.rules]]
field = "outcome"
action = "exclude"
values = ["deny"]
"#
        );
        ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap()
    }

    fn scenario_records() -> Vec<AnalyticsRecord> {
        vec![record(1, "allow"), record(2, "deny"), record(3, "allow")]
    }

    /// A (no timeout) gets everything, B (1s, deny excluded) gets the allows
    #[tokio::test(start_paused = true)]
    async fn test_e2e_two_sinks_with_filter() {
        let blueprint = scenario_config(0);
        let deliveries = Deliveries::default();
        let store = Arc::new(MemoryStore::new());
        push_all(&store, RecordCodec::default(), &scenario_records());

        let engine = build_engine(&blueprint, &deliveries, Arc::clone(&store)).await;
        let report = engine.run_cycle().await;

        assert_eq!(report.drained, 3);
        assert!(matches!(report.get("A"), Some(WriteOutcome::Written { records: 3 })));
        assert!(matches!(report.get("B"), Some(WriteOutcome::Written { records: 2 })));
        assert!(store.is_empty(ANALYTICS_KEY_NAME));

        let a: Vec<i64> = delivered(&deliveries, "A").iter().map(|r| r.timestamp).collect();
        let b: Vec<i64> = delivered(&deliveries, "B").iter().map(|r| r.timestamp).collect();
        assert_eq!(a, vec![1, 2, 3]);
        assert_eq!(b, vec![1, 3]);
        assert_eq!(delivered(&deliveries, "A")[1].policies, "policy-trace");
    }

    /// B's write takes 2s against a 1s timeout; A is unaffected
    #[tokio::test(start_paused = true)]
    async fn test_e2e_slow_sink_times_out() {
        let blueprint = scenario_config(2000);
        let deliveries = Deliveries::default();
        let store = Arc::new(MemoryStore::new());
        push_all(&store, RecordCodec::default(), &scenario_records());

        let engine = build_engine(&blueprint, &deliveries, Arc::clone(&store)).await;
        let started = Instant::now();
        let report = engine.run_cycle().await;

        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert!(matches!(report.get("A"), Some(WriteOutcome::Written { records: 3 })));
        assert!(matches!(report.get("B"), Some(WriteOutcome::TimedOut)));
        assert_eq!(delivered(&deliveries, "A").len(), 3);

        // the abandoned write wakes with a cancelled context and delivers nothing
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(delivered(&deliveries, "B").is_empty());

        let metrics: HashMap<String, _> = engine.fanout().metrics().into_iter().collect();
        assert_eq!(metrics["B"].timeout_count, 1);
        assert_eq!(metrics["A"].records_delivered, 3);
    }

    /// Ticks every purge_delay; the first one a full interval after start
    #[tokio::test(start_paused = true)]
    async fn test_e2e_scheduled_purges() {
        let blueprint = scenario_config(0);
        let deliveries = Deliveries::default();
        let store = Arc::new(MemoryStore::new());
        push_all(&store, RecordCodec::default(), &scenario_records());

        let engine = build_engine(&blueprint, &deliveries, Arc::clone(&store)).await;
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(&engine).run_until(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(store.len(ANALYTICS_KEY_NAME), 3);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store.is_empty(ANALYTICS_KEY_NAME));
        assert_eq!(delivered(&deliveries, "A").len(), 3);

        push_all(&store, RecordCodec::default(), &[record(4, "allow")]);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(store.is_empty(ANALYTICS_KEY_NAME));
        assert_eq!(delivered(&deliveries, "A").len(), 4);
        assert_eq!(delivered(&deliveries, "B").len(), 3);

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(engine.summary().total_cycles, 2);
    }

    /// Zero sinks: entries are still drained
    #[tokio::test]
    async fn test_e2e_no_sinks() {
        let blueprint = PumpBlueprint::default();
        let deliveries = Deliveries::default();
        let store = Arc::new(MemoryStore::new());
        push_all(&store, RecordCodec::default(), &scenario_records());

        let engine = build_engine(&blueprint, &deliveries, Arc::clone(&store)).await;
        let report = engine.run_cycle().await;

        assert_eq!(report.drained, 3);
        assert!(report.outcomes.is_empty());
        assert!(store.is_empty(ANALYTICS_KEY_NAME));
        assert!(deliveries.lock().unwrap().is_empty());
    }

    /// A malformed JSON entry among well-formed ones costs only itself
    #[tokio::test]
    async fn test_e2e_decode_isolation_json() {
        let blueprint = ConfigLoader::load_from_str(
            r#"{
                "purge_delay": 5,
                "record_format": "json",
                "omit_detailed_recording": true,
                "pumps": [{ "name": "A", "sink_type": "recording" }]
            }"#,
            ConfigFormat::Json,
        )
        .unwrap();
        let deliveries = Deliveries::default();
        let store = Arc::new(MemoryStore::new());
        let codec = RecordCodec::new(blueprint.record_format);
        push_all(&store, codec, &[record(1, "allow")]);
        store.push(ANALYTICS_KEY_NAME, "{\"timestamp\": ");
        push_all(&store, codec, &[record(3, "deny")]);

        let engine = build_engine(&blueprint, &deliveries, Arc::clone(&store)).await;
        let report = engine.run_cycle().await;

        assert_eq!(report.drained, 3);
        assert_eq!(report.dropped, 1);
        let a = delivered(&deliveries, "A");
        assert_eq!(a.len(), 2);
        assert!(a.iter().all(AnalyticsRecord::is_redacted));
    }

    /// One sink failing leaves the other's delivery intact
    #[tokio::test]
    async fn test_e2e_sink_isolation() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
purge_delay = 5

[[pumps]]
name = "broken"
sink_type = "recording"
timeout = 2
[pumps.params]
fail = "true"

[[pumps]]
name = "healthy"
sink_type = "recording"
timeout = 2

[[pumps]]
name = "unknown"
sink_type = "kafka"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();
        let deliveries = Deliveries::default();
        let store = Arc::new(MemoryStore::new());
        push_all(&store, RecordCodec::default(), &scenario_records());

        let engine = build_engine(&blueprint, &deliveries, Arc::clone(&store)).await;
        assert_eq!(engine.fanout().len(), 2);

        let report = engine.run_cycle().await;
        assert!(matches!(report.get("broken"), Some(WriteOutcome::Failed(_))));
        assert!(matches!(report.get("healthy"), Some(WriteOutcome::Written { records: 3 })));
        assert!(report.get("unknown").is_none());
        assert_eq!(delivered(&deliveries, "healthy").len(), 3);
    }

    /// No timeout and a write longer than the interval: advisory, not cancellation
    #[tokio::test(start_paused = true)]
    async fn test_e2e_advisory_without_timeout() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
purge_delay = 3

[[pumps]]
name = "lagging"
sink_type = "recording"
[pumps.params]
delay_ms = "4000"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();
        let deliveries = Deliveries::default();
        let store = Arc::new(MemoryStore::new());
        push_all(&store, RecordCodec::default(), &scenario_records());

        let engine = build_engine(&blueprint, &deliveries, Arc::clone(&store)).await;
        let report = engine.run_cycle().await;

        assert!(matches!(report.get("lagging"), Some(WriteOutcome::Written { records: 3 })));
        let metrics = engine.fanout().metrics();
        assert_eq!(metrics[0].1.advisory_count, 1);
        assert_eq!(metrics[0].1.timeout_count, 0);
    }
}
