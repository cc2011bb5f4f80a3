//! Dispatch supervisor - one bounded write per sink per cycle
//!
//! The write runs on its own task so the supervisor can stop waiting at the
//! sink's deadline. A write that ignores its context keeps running detached;
//! its result is discarded.

use std::sync::Arc;
use std::time::Duration;

use contracts::{ContextError, ContractError, RecordBatch, WriteContext};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::handle::PumpHandle;

/// Result of one supervised write
#[derive(Debug)]
pub enum WriteOutcome {
    /// The sink accepted its filtered batch
    Written { records: usize },
    /// The sink returned an error
    Failed(ContractError),
    /// The sink's deadline passed first
    TimedOut,
    /// The write context was cancelled first
    Canceled,
    /// The write panicked
    Panicked,
}

impl WriteOutcome {
    /// Metric/log label
    pub fn status(&self) -> &'static str {
        match self {
            Self::Written { .. } => "written",
            Self::Failed(_) => "failed",
            Self::TimedOut => "timed_out",
            Self::Canceled => "canceled",
            Self::Panicked => "panicked",
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// Which slow-write warning applies to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Advisory {
    /// No timeout configured
    NoTimeout,
    /// Timeout longer than the purge interval
    TimeoutTooLong,
}

impl Advisory {
    fn for_timeout(timeout: Duration, purge_interval: Duration) -> Option<Self> {
        if timeout.is_zero() {
            Some(Self::NoTimeout)
        } else if timeout > purge_interval {
            Some(Self::TimeoutTooLong)
        } else {
            None
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::NoTimeout => "no_timeout",
            Self::TimeoutTooLong => "timeout_too_long",
        }
    }

    fn emit(self, handle: &PumpHandle) {
        handle.metrics().inc_advisory_count();
        observability::record_advisory(handle.name(), self.label());

        match self {
            Self::NoTimeout => warn!(
                sink = %handle.name(),
                "Pump is taking more time than purge_delay. Try setting a timeout for this pump."
            ),
            Self::TimeoutTooLong => warn!(
                sink = %handle.name(),
                timeout_secs = handle.timeout().as_secs(),
                "Pump is taking more time than purge_delay. Try lowering the timeout configured for this pump."
            ),
        }
    }
}

/// One-shot warning armed for the duration of a supervised write
///
/// Aborted on drop, so it only fires while the write is outstanding.
struct AdvisoryTimer {
    task: Option<JoinHandle<()>>,
}

impl AdvisoryTimer {
    fn arm(handle: &Arc<PumpHandle>, purge_interval: Duration) -> Self {
        let Some(advisory) = Advisory::for_timeout(handle.timeout(), purge_interval) else {
            return Self { task: None };
        };

        let handle = Arc::clone(handle);
        let task = tokio::spawn(async move {
            tokio::time::sleep(purge_interval).await;
            advisory.emit(&handle);
        });

        Self { task: Some(task) }
    }
}

impl Drop for AdvisoryTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Deliver one cycle's batch to one sink
///
/// Filters the batch for the sink, bounds the write by the sink's timeout
/// (zero = unbounded) and reports the outcome. Never fails: every failure
/// mode is logged and folded into the returned `WriteOutcome`.
#[instrument(
    name = "supervise_write",
    skip_all,
    fields(sink = %handle.name(), timeout_secs = handle.timeout().as_secs())
)]
pub async fn supervise_write(
    handle: Arc<PumpHandle>,
    batch: RecordBatch,
    purge_interval: Duration,
) -> WriteOutcome {
    let started = Instant::now();
    let _advisory = AdvisoryTimer::arm(&handle, purge_interval);
    let ctx = WriteContext::for_timeout(handle.timeout());

    let mut write = {
        let handle = Arc::clone(&handle);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let records = handle.filter(&batch);
            let count = records.len();
            handle.sink().write_data(&ctx, records).await.map(|()| count)
        })
    };

    let outcome = tokio::select! {
        biased;
        joined = &mut write => match joined {
            Ok(Ok(records)) => WriteOutcome::Written { records },
            Ok(Err(e)) => WriteOutcome::Failed(e),
            Err(e) if e.is_panic() => WriteOutcome::Panicked,
            Err(_) => WriteOutcome::Canceled,
        },
        reason = ctx.done() => match reason {
            ContextError::DeadlineExceeded => WriteOutcome::TimedOut,
            ContextError::Canceled => WriteOutcome::Canceled,
        },
    };

    // a write still running past this point only sees a cancelled context
    ctx.cancel();

    report(&handle, &outcome, started.elapsed());
    outcome
}

fn report(handle: &PumpHandle, outcome: &WriteOutcome, elapsed: Duration) {
    let metrics = handle.metrics();
    match outcome {
        WriteOutcome::Written { records } => {
            metrics.record_write(*records);
            observability::record_records_delivered(handle.name(), *records);
            debug!(sink = %handle.name(), records, elapsed_ms = elapsed.as_millis() as u64, "Sink write complete");
        }
        WriteOutcome::Failed(e) => {
            metrics.inc_failure_count();
            warn!(sink = %handle.name(), error = %e, "Error writing to sink");
        }
        WriteOutcome::TimedOut => {
            metrics.inc_timeout_count();
            warn!(
                sink = %handle.name(),
                timeout_secs = handle.timeout().as_secs(),
                "Timeout writing to sink"
            );
        }
        WriteOutcome::Canceled => {
            metrics.inc_canceled_count();
            warn!(sink = %handle.name(), "Sink write canceled");
        }
        WriteOutcome::Panicked => {
            metrics.inc_failure_count();
            warn!(sink = %handle.name(), "Sink write panicked");
        }
    }

    observability::record_sink_outcome(
        handle.name(),
        outcome.status(),
        elapsed.as_secs_f64() * 1000.0,
    );
}
