//! Scripted sinks shared by the unit tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{
    AnalyticsRecord, AnalyticsSink, BoxFuture, ContractError, RecordBatch, SinkParams,
    WriteContext,
};

pub fn batch(n: usize) -> RecordBatch {
    (0..n)
        .map(|i| AnalyticsRecord {
            timestamp: i as i64,
            username: format!("user-{i}"),
            outcome: if i % 2 == 0 { "allow" } else { "deny" }.into(),
            policies: "policy-trace".into(),
            deciders: "decider-trace".into(),
            ..Default::default()
        })
        .collect::<Vec<_>>()
        .into()
}

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    Panic,
}

/// Sink whose latency and result are fixed up front
pub struct ScriptedSink {
    name: String,
    delay: Duration,
    behavior: Behavior,
    received: Arc<Mutex<Vec<Vec<AnalyticsRecord>>>>,
    saw_done: Arc<AtomicBool>,
}

impl ScriptedSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            behavior: Behavior::Succeed,
            received: Arc::default(),
            saw_done: Arc::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.behavior = Behavior::Fail;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.behavior = Behavior::Panic;
        self
    }

    /// Batches accepted so far
    pub fn received(&self) -> Arc<Mutex<Vec<Vec<AnalyticsRecord>>>> {
        Arc::clone(&self.received)
    }

    /// Set once a write noticed its context had ended
    pub fn saw_done(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.saw_done)
    }
}

impl AnalyticsSink for ScriptedSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn init<'a>(&'a mut self, _params: &'a SinkParams) -> BoxFuture<'a, Result<(), ContractError>> {
        Box::pin(async { Ok(()) })
    }

    fn write_data<'a>(
        &'a self,
        ctx: &'a WriteContext,
        records: RecordBatch,
    ) -> BoxFuture<'a, Result<(), ContractError>> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(reason) = ctx.err() {
                self.saw_done.store(true, Ordering::SeqCst);
                return Err(ContractError::sink_write(&self.name, reason.to_string()));
            }
            match self.behavior {
                Behavior::Succeed => {}
                Behavior::Fail => {
                    return Err(ContractError::sink_write(&self.name, "scripted failure"));
                }
                Behavior::Panic => panic!("scripted panic in {}", self.name),
            }
            self.received.lock().unwrap().push(records.to_vec());
            Ok(())
        })
    }
}
