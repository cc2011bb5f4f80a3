//! # Purger
//!
//! 清理调度模块。
//!
//! 负责：
//! - 按固定周期从存储中原子取出分析记录集合
//! - 解码记录 (MessagePack / JSON)，坏条目单独丢弃
//! - 全局脱敏后交给 `FanOut` 分发
//!
//! ## 使用示例
//!
//! ```ignore
//! use purger::PumpEngine;
//!
//! let engine = PumpEngine::initialize(&blueprint, &registry, store).await?;
//! Arc::new(engine).run_until(shutdown).await;
//! ```

mod codec;
mod engine;

pub use codec::{CodecError, DecodedBatch, RecordCodec};
pub use engine::{EngineConfig, EngineError, PumpEngine};

// Re-export cycle types
pub use dispatcher::{CycleReport, SinkOutcome, WriteOutcome};
