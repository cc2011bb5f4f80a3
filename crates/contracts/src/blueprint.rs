//! PumpBlueprint - Config Loader 输出
//!
//! 描述完整的 pump 配置：清理周期、存储、记录格式、输出路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::{Filter, SinkParams, ANALYTICS_KEY_NAME};

/// Store-specific connection options
pub type StoreOptions = HashMap<String, String>;

/// 完整的 pump 配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpBlueprint {
    /// 清理周期 (秒)，必须 > 0
    #[serde(default = "default_purge_delay")]
    pub purge_delay: u64,

    /// 全局脱敏：分发前清除 policies / deciders
    #[serde(default)]
    pub omit_detailed_recording: bool,

    /// 存储中的集合 key
    #[serde(default = "default_analytics_key")]
    pub analytics_key: String,

    /// 存储中记录的序列化格式
    #[serde(default)]
    pub record_format: RecordFormat,

    /// 上一周期未完成时的处理策略
    #[serde(default)]
    pub overrun_policy: OverrunPolicy,

    /// 存储配置
    #[serde(default)]
    pub store: StoreConfig,

    /// 输出路由配置
    #[serde(default)]
    pub pumps: Vec<SinkConfig>,
}

fn default_purge_delay() -> u64 {
    10
}

fn default_analytics_key() -> String {
    ANALYTICS_KEY_NAME.to_string()
}

impl PumpBlueprint {
    /// Purge interval as a duration
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_delay)
    }
}

impl Default for PumpBlueprint {
    fn default() -> Self {
        Self {
            purge_delay: default_purge_delay(),
            omit_detailed_recording: false,
            analytics_key: default_analytics_key(),
            record_format: RecordFormat::default(),
            overrun_policy: OverrunPolicy::default(),
            store: StoreConfig::default(),
            pumps: Vec::new(),
        }
    }
}

/// 记录序列化格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// MessagePack map keyed by field name
    #[default]
    MessagePack,
    /// JSON object
    Json,
}

/// 周期超时策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrunPolicy {
    /// 等待当前周期结束后才处理下一个 tick
    #[default]
    Block,
    /// 周期仍在运行时跳过到达的 tick 并告警
    SkipMissedTicks,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// 存储类型 (e.g., "memory")
    #[serde(default = "default_store_kind")]
    pub kind: String,

    /// 连接参数
    #[serde(default)]
    pub options: StoreOptions,
}

fn default_store_kind() -> String {
    "memory".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: default_store_kind(),
            options: StoreOptions::new(),
        }
    }
}

/// Sink 输出配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型 (注册表中的名字)，缺省时使用 `name`
    #[serde(default)]
    pub sink_type: Option<String>,

    /// 类型特定参数
    #[serde(default)]
    pub params: SinkParams,

    /// 过滤规则
    #[serde(default)]
    pub filters: Filter,

    /// 写入超时 (秒)，0 表示不限
    #[serde(default)]
    pub timeout: u64,

    /// 该 sink 单独脱敏
    #[serde(default)]
    pub omit_detailed_recording: bool,
}

impl SinkConfig {
    /// Registry name this sink resolves to
    pub fn resolved_type(&self) -> &str {
        self.sink_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.name)
    }

    /// Write timeout (zero = unbounded)
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
