//! Record codec - raw store entries to `AnalyticsRecord`
//!
//! Stateless; a bad entry only costs that entry.

use bytes::Bytes;
use contracts::{AnalyticsRecord, RecordFormat};
use thiserror::Error;
use tracing::{error, trace};

/// Codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("messagepack decode error: {0}")]
    MessagePackDecode(#[from] rmp_serde::decode::Error),

    #[error("messagepack encode error: {0}")]
    MessagePackEncode(#[from] rmp_serde::encode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Records that decoded, in store order, plus how many entries did not
#[derive(Debug, Default)]
pub struct DecodedBatch {
    pub records: Vec<AnalyticsRecord>,
    pub dropped: usize,
}

/// Encoder/decoder for one wire format
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordCodec {
    format: RecordFormat,
}

impl RecordCodec {
    pub fn new(format: RecordFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> RecordFormat {
        self.format
    }

    /// Decode one raw entry
    pub fn decode(&self, raw: &[u8]) -> Result<AnalyticsRecord, CodecError> {
        let record = match self.format {
            RecordFormat::MessagePack => rmp_serde::from_slice(raw)?,
            RecordFormat::Json => serde_json::from_slice(raw)?,
        };
        Ok(record)
    }

    /// Encode a record the way producers write it
    pub fn encode(&self, record: &AnalyticsRecord) -> Result<Vec<u8>, CodecError> {
        let raw = match self.format {
            // map keyed by field name, so producers may omit or reorder fields
            RecordFormat::MessagePack => rmp_serde::to_vec_named(record)?,
            RecordFormat::Json => serde_json::to_vec(record)?,
        };
        Ok(raw)
    }

    /// Decode a drained set, dropping (and logging) entries that fail
    pub fn decode_batch(&self, entries: &[Bytes]) -> DecodedBatch {
        let mut batch = DecodedBatch {
            records: Vec::with_capacity(entries.len()),
            dropped: 0,
        };

        for (index, entry) in entries.iter().enumerate() {
            match self.decode(entry) {
                Ok(record) => {
                    trace!(index, ?record, "Decoded record");
                    batch.records.push(record);
                }
                Err(e) => {
                    error!(index, bytes = entry.len(), error = %e, "Couldn't decode analytics entry");
                    batch.dropped += 1;
                }
            }
        }

        batch
    }
}
