//! LogSink - logs batch summaries via tracing

use contracts::{
    AnalyticsSink, BoxFuture, ContractError, RecordBatch, SinkParams, WriteContext,
};
use tracing::{debug, info, instrument};

/// Sink that logs batch summaries for debugging
///
/// Params:
/// - `detail`: `"true"` also logs every record at debug level
pub struct LogSink {
    name: String,
    detail: bool,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail: false,
        }
    }

    fn log_batch_summary(&self, records: &RecordBatch) {
        let first = records.first().map(|r| r.timestamp);
        let last = records.last().map(|r| r.timestamp);
        let redacted = records.iter().filter(|r| r.is_redacted()).count();

        info!(
            sink = %self.name,
            records = records.len(),
            first_timestamp = ?first,
            last_timestamp = ?last,
            redacted,
            "Analytics batch received"
        );

        if self.detail {
            for record in records.iter() {
                debug!(
                    sink = %self.name,
                    timestamp = record.timestamp,
                    username = %record.username,
                    method = %record.method,
                    path = %record.path,
                    outcome = %record.outcome,
                    "Analytics record"
                );
            }
        }
    }
}

impl AnalyticsSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn init<'a>(&'a mut self, params: &'a SinkParams) -> BoxFuture<'a, Result<(), ContractError>> {
        Box::pin(async move {
            self.detail = params.get("detail").is_some_and(|v| v == "true");
            Ok(())
        })
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, _ctx, records),
        fields(sink = %self.name, records = records.len())
    )]
    fn write_data<'a>(
        &'a self,
        _ctx: &'a WriteContext,
        records: RecordBatch,
    ) -> BoxFuture<'a, Result<(), ContractError>> {
        self.log_batch_summary(&records);
        Box::pin(async { Ok(()) })
    }
}
