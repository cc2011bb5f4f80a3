//! # Observability
//!
//! 日志与指标：tracing 订阅器 + Prometheus 导出。
//!
//! - 日志格式：JSON / Pretty / Compact，`RUST_LOG` 优先于默认级别
//! - 指标：清理周期、sink 写入结果、慢写告警（见 [`metrics`]）
//!
//! ```ignore
//! observability::init_with_config(ObservabilityConfig::for_verbosity(LogFormat::Pretty, 1, false))?;
//! observability::init_metrics_only(9000)?;
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    record_active_sinks, record_advisory, record_cycle, record_records_delivered,
    record_sink_outcome, MetricsSummary, PumpMetricsAggregator, RunningStats, StatsSummary,
};

/// 日志与指标配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus 端口 (None = 不导出)
    pub metrics_port: Option<u16>,
    /// 未设置 `RUST_LOG` 时的过滤级别
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::for_verbosity(LogFormat::default(), 0, false)
    }
}

impl ObservabilityConfig {
    /// Log-only config from `-v` count and `-q`; quiet wins
    pub fn for_verbosity(log_format: LogFormat, verbose: u8, quiet: bool) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        Self {
            log_format,
            metrics_port: None,
            default_log_level: level.to_string(),
        }
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// 每行一个 JSON 对象，适合采集
    #[default]
    Json,
    Pretty,
    Compact,
}

fn format_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    }
}

/// 安装全局 tracing 订阅器，按需启动 Prometheus
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(format_layer(config.log_format))
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        install_prometheus(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        level = %config.default_log_level,
        metrics_port = ?config.metrics_port,
        "Logging ready"
    );
    Ok(())
}

/// 仅启动 Prometheus 导出（日志已初始化时使用）
pub fn init_metrics_only(port: u16) -> Result<()> {
    install_prometheus(port)
}

fn install_prometheus(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("Failed to expose pump metrics on port {port}"))?;

    tracing::info!(port, "Pump metrics exported");
    Ok(())
}
