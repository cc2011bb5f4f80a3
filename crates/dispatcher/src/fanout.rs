//! FanOut - delivers one cycle's batch to every sink concurrently

use std::sync::Arc;
use std::time::Duration;

use contracts::RecordBatch;
use tracing::{debug, error, instrument, warn};

use crate::handle::PumpHandle;
use crate::metrics::MetricsSnapshot;
use crate::supervisor::{supervise_write, WriteOutcome};

/// Outcome of one sink within a cycle
#[derive(Debug)]
pub struct SinkOutcome {
    pub sink: String,
    pub outcome: WriteOutcome,
}

/// What happened during one purge cycle
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Entries taken from the store
    pub drained: usize,
    /// Entries that failed to decode
    pub dropped: usize,
    /// Records handed to the fan-out
    pub records: usize,
    /// Per-sink outcomes, in sink order
    pub outcomes: Vec<SinkOutcome>,
    /// Wall time of the cycle
    pub elapsed: Duration,
}

impl CycleReport {
    /// Outcome for a sink by name
    pub fn get(&self, sink: &str) -> Option<&WriteOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.sink == sink)
            .map(|o| &o.outcome)
    }

    /// Number of sinks whose write completed successfully
    pub fn written(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_written()).count()
    }
}

/// Fan-out coordinator over the active sinks
///
/// The sink list is fixed at construction and shared read-only with every
/// cycle.
#[derive(Debug, Clone)]
pub struct FanOut {
    handles: Arc<[Arc<PumpHandle>]>,
    purge_interval: Duration,
}

impl FanOut {
    pub fn new(handles: Vec<PumpHandle>, purge_interval: Duration) -> Self {
        Self {
            handles: handles.into_iter().map(Arc::new).collect(),
            purge_interval,
        }
    }

    pub fn handles(&self) -> &[Arc<PumpHandle>] {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Deliver `batch` to every sink and wait for all supervisors
    ///
    /// Returns once each sink has finished, failed or hit its deadline. One
    /// sink's outcome never affects another's.
    #[instrument(name = "fanout_dispatch", skip_all, fields(records = batch.len(), sinks = self.handles.len()))]
    pub async fn dispatch(&self, batch: RecordBatch) -> CycleReport {
        let records = batch.len();

        if self.handles.is_empty() {
            warn!("No sinks defined!");
            return CycleReport {
                records,
                ..Default::default()
            };
        }

        let tasks: Vec<_> = self
            .handles
            .iter()
            .map(|handle| {
                let task = tokio::spawn(supervise_write(
                    Arc::clone(handle),
                    Arc::clone(&batch),
                    self.purge_interval,
                ));
                (handle.name().to_string(), task)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (sink, task) in tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => {
                    error!(sink = %sink, "Supervisor panicked");
                    WriteOutcome::Panicked
                }
                Err(_) => WriteOutcome::Canceled,
            };
            outcomes.push(SinkOutcome { sink, outcome });
        }

        debug!(records, "Fan-out complete");

        CycleReport {
            records,
            outcomes,
            ..Default::default()
        }
    }
}
