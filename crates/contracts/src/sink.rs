//! AnalyticsSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for sinks ("pumps") and the write context
//! they receive.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{AnalyticsRecord, ContractError};

/// Boxed future returned by dyn-compatible async trait methods
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Immutable batch of records handed to a sink
pub type RecordBatch = Arc<[AnalyticsRecord]>;

/// Opaque per-sink settings, passed through to `AnalyticsSink::init`
pub type SinkParams = HashMap<String, String>;

/// Data output trait
///
/// Uses `Pin<Box<dyn Future>>` return types so the trait is dyn-compatible
/// and sinks can be resolved by name at startup and held as
/// `Arc<dyn AnalyticsSink>`.
pub trait AnalyticsSink: Send + Sync {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// One-time initialization from the opaque settings blob
    ///
    /// # Errors
    /// Returns init error; the sink is then left out of the active set
    fn init<'a>(&'a mut self, params: &'a SinkParams)
        -> BoxFuture<'a, Result<(), ContractError>>;

    /// Write one filtered batch
    ///
    /// Implementations should stop early once `ctx` is done. The caller
    /// stops waiting at the deadline whether or not they do.
    ///
    /// # Errors
    /// Returns write error (should include context)
    fn write_data<'a>(
        &'a self,
        ctx: &'a WriteContext,
        records: RecordBatch,
    ) -> BoxFuture<'a, Result<(), ContractError>>;
}

/// Why a write context ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// Explicitly cancelled
    Canceled,
    /// Deadline passed
    DeadlineExceeded,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Canceled => f.write_str("context canceled"),
            Self::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

/// Cancellation scope for a single sink write
///
/// Clones share the same cancellation state.
#[derive(Debug, Clone)]
pub struct WriteContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl WriteContext {
    /// Context without a deadline, ends only when cancelled
    pub fn unbounded() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Context ending `timeout` from now
    ///
    /// A timeout past the clock's range never expires.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Bounded when `timeout` is nonzero, unbounded otherwise
    pub fn for_timeout(timeout: Duration) -> Self {
        if timeout.is_zero() {
            Self::unbounded()
        } else {
            Self::with_timeout(timeout)
        }
    }

    /// Deadline, if bounded
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel the context
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Reason the context ended, or `None` while still live
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Whether the context has ended
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves when the context ends
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                () = self.token.cancelled() => ContextError::Canceled,
                () = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ContextError::Canceled
            }
        }
    }
}
