//! Per-sink view of a drained batch
//!
//! Each sink gets its own copy; nothing a sink sees is shared mutably with
//! another sink.

use std::sync::Arc;

use contracts::{AnalyticsRecord, Filter, RecordBatch};

/// Apply a sink's filter and redaction to the cycle batch
///
/// Without rules and without redaction the shared batch itself is returned.
/// Otherwise a new batch is built in the original relative order.
pub fn filter_records(filter: &Filter, omit_detail: bool, batch: &RecordBatch) -> RecordBatch {
    if !filter.has_filter() && !omit_detail {
        return Arc::clone(batch);
    }

    let kept: Vec<AnalyticsRecord> = batch
        .iter()
        // filterable fields never include the redacted traces
        .filter(|record| !filter.should_filter(record))
        .map(|record| {
            let mut record = record.clone();
            if omit_detail {
                record.redact_details();
            }
            record
        })
        .collect();

    kept.into()
}
