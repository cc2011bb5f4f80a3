//! PumpHandle - an initialized sink bound to its configuration

use std::sync::Arc;
use std::time::Duration;

use contracts::{AnalyticsSink, Filter, RecordBatch, SinkConfig};

use crate::filter::filter_records;
use crate::metrics::SinkMetrics;

/// Handle to a live sink
///
/// Carries the settings common to every sink (filters, write timeout,
/// per-sink redaction) next to the sink itself. Read-only after startup.
pub struct PumpHandle {
    /// Sink name
    name: String,
    /// The sink
    sink: Arc<dyn AnalyticsSink>,
    /// Inclusion/exclusion rules
    filters: Filter,
    /// Write timeout (zero = unbounded)
    timeout: Duration,
    /// Strip policy/decision traces for this sink
    omit_detailed_recording: bool,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
}

impl PumpHandle {
    /// Wrap a sink with default settings (no filters, no timeout)
    pub fn new(sink: Arc<dyn AnalyticsSink>) -> Self {
        Self {
            name: sink.name().to_string(),
            sink,
            filters: Filter::default(),
            timeout: Duration::ZERO,
            omit_detailed_recording: false,
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    /// Wrap a sink with the settings from its configuration
    pub fn from_config(sink: Arc<dyn AnalyticsSink>, config: &SinkConfig) -> Self {
        Self::new(sink)
            .with_name(&config.name)
            .with_filters(config.filters.clone())
            .with_timeout(config.write_timeout())
            .with_omit_detailed_recording(config.omit_detailed_recording)
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_filters(mut self, filters: Filter) -> Self {
        self.filters = filters;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_omit_detailed_recording(mut self, omit: bool) -> Self {
        self.omit_detailed_recording = omit;
        self
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the sink
    pub fn sink(&self) -> &Arc<dyn AnalyticsSink> {
        &self.sink
    }

    pub fn filters(&self) -> &Filter {
        &self.filters
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn omit_detailed_recording(&self) -> bool {
        self.omit_detailed_recording
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// This sink's view of the cycle batch
    pub fn filter(&self, batch: &RecordBatch) -> RecordBatch {
        filter_records(&self.filters, self.omit_detailed_recording, batch)
    }
}

impl std::fmt::Debug for PumpHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PumpHandle")
            .field("name", &self.name)
            .field("filters", &self.filters)
            .field("timeout", &self.timeout)
            .field("omit_detailed_recording", &self.omit_detailed_recording)
            .finish_non_exhaustive()
    }
}
