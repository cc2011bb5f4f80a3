//! FileSink - appends records to daily JSON-lines files

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use contracts::{
    AnalyticsSink, BoxFuture, ContractError, RecordBatch, SinkParams, WriteContext,
};
use tokio::sync::Mutex;
use tracing::{debug, debug_span, Instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output directory
    pub dir: PathBuf,
    /// File name prefix
    pub prefix: String,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(name: &str, params: &SinkParams) -> Self {
        let dir = params
            .get("dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./analytics"));
        let prefix = params
            .get("prefix")
            .cloned()
            .unwrap_or_else(|| name.to_string());

        Self { dir, prefix }
    }

    /// File holding the records of `date`
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}-{}.jsonl", self.prefix, date.format("%Y-%m-%d")))
    }
}

/// Sink that writes one JSON object per line, one file per UTC day
///
/// Params: `dir` (default `./analytics`), `prefix` (default the sink name).
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    // serializes appends from overlapping cycles
    write_lock: Mutex<()>,
}

impl FileSink {
    /// Create a new FileSink with default settings
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let config = FileSinkConfig::from_params(&name, &SinkParams::new());
        Self {
            name,
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &FileSinkConfig {
        &self.config
    }

    fn append(&self, ctx: &WriteContext, records: &RecordBatch) -> Result<usize, ContractError> {
        let path = self.config.path_for(Utc::now().date_naive());
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);

        for (written, record) in records.iter().enumerate() {
            if let Some(reason) = ctx.err() {
                writer.flush()?;
                return Err(ContractError::sink_write(
                    &self.name,
                    format!("{reason} after {written} records"),
                ));
            }
            serde_json::to_writer(&mut writer, record)
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
            writer.write_all(b"\n")?;
        }

        writer.flush()?;
        Ok(records.len())
    }
}

impl AnalyticsSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn init<'a>(&'a mut self, params: &'a SinkParams) -> BoxFuture<'a, Result<(), ContractError>> {
        Box::pin(async move {
            self.config = FileSinkConfig::from_params(&self.name, params);
            fs::create_dir_all(&self.config.dir).map_err(|e| {
                ContractError::sink_init(
                    &self.name,
                    format!("cannot create {}: {e}", self.config.dir.display()),
                )
            })?;
            debug!(sink = %self.name, dir = %self.config.dir.display(), "FileSink ready");
            Ok(())
        })
    }

    fn write_data<'a>(
        &'a self,
        ctx: &'a WriteContext,
        records: RecordBatch,
    ) -> BoxFuture<'a, Result<(), ContractError>> {
        let span = debug_span!("file_sink_write", sink = %self.name, records = records.len());
        Box::pin(
            async move {
                if records.is_empty() {
                    return Ok(());
                }
                let _guard = self.write_lock.lock().await;
                let written = self.append(ctx, &records)?;
                debug!(sink = %self.name, written, "Records appended");
                Ok(())
            }
            .instrument(span),
        )
    }
}
