//! # Dispatcher
//!
//! 数据分发模块。
//!
//! 负责：
//! - 按名字解析并初始化 sinks (`SinkRegistry`)
//! - 为每个 sink 过滤、脱敏本周期的记录
//! - Fan-out 到所有 sinks，每个写入受各自超时约束
//! - 隔离慢 sink / 失败 sink，不影响其他 sink

pub mod error;
pub mod fanout;
pub mod filter;
pub mod handle;
pub mod metrics;
pub mod registry;
pub mod sinks;
pub mod supervisor;

#[cfg(test)]
mod test_support;

pub use contracts::{AnalyticsSink, RecordBatch};
pub use error::DispatcherError;
pub use fanout::{CycleReport, FanOut, SinkOutcome};
pub use filter::filter_records;
pub use handle::PumpHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use registry::{initialize_pumps, SinkConstructor, SinkRegistry};
pub use sinks::{FileSink, LogSink, NetworkSink};
pub use supervisor::{supervise_write, WriteOutcome};
