//! # Storage
//!
//! 后端存储适配器。
//!
//! 负责：
//! - 提供 `AnalyticsStore` 的进程内实现
//! - 按配置的 kind 创建存储实例

mod memory;

pub use memory::MemoryStore;

use contracts::{AnalyticsStore, ContractError, StoreConfig};
use tracing::debug;

/// Create the store described by `config`
///
/// The store is returned uninitialized; `AnalyticsStore::init` receives
/// `config.options` when the engine starts.
///
/// # Errors
/// Unknown store kind, fatal at startup
pub fn create_store(config: &StoreConfig) -> Result<Box<dyn AnalyticsStore>, ContractError> {
    let store: Box<dyn AnalyticsStore> = match config.kind.as_str() {
        "memory" => Box::new(MemoryStore::new()),
        other => {
            return Err(ContractError::store_init(other, "unknown store kind"));
        }
    };

    debug!(kind = %store.kind(), "Analytics store created");
    Ok(store)
}
