//! Pump 指标收集模块
//!
//! 清理周期、解码失败、各 sink 写入结果的 Prometheus 指标，以及内存中的
//! 运行摘要。

use std::collections::BTreeMap;

use metrics::{counter, gauge, histogram};

/// 记录一次清理周期
///
/// `drained` 为从存储取出的条目数，`dropped` 为解码失败被丢弃的条目数。
pub fn record_cycle(drained: usize, dropped: usize, elapsed_ms: f64) {
    counter!("analytics_pump_cycles_total").increment(1);
    counter!("analytics_pump_records_drained_total").increment(drained as u64);
    gauge!("analytics_pump_last_cycle_records").set(drained as f64);
    histogram!("analytics_pump_cycle_duration_ms").record(elapsed_ms);

    if dropped > 0 {
        counter!("analytics_pump_decode_failures_total").increment(dropped as u64);
    }
}

/// 记录一个 sink 的写入结果
///
/// `status` 取值: written / failed / timed_out / canceled / panicked
pub fn record_sink_outcome(sink_name: &str, status: &'static str, elapsed_ms: f64) {
    counter!(
        "analytics_pump_sink_writes_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);

    histogram!(
        "analytics_pump_sink_write_duration_ms",
        "sink" => sink_name.to_string()
    )
    .record(elapsed_ms);
}

/// 记录交付给 sink 的记录数
pub fn record_records_delivered(sink_name: &str, count: usize) {
    counter!(
        "analytics_pump_records_delivered_total",
        "sink" => sink_name.to_string()
    )
    .increment(count as u64);
}

/// 记录慢写入提示
///
/// `kind` 取值: no_timeout / timeout_too_long
pub fn record_advisory(sink_name: &str, kind: &'static str) {
    counter!(
        "analytics_pump_slow_write_advisories_total",
        "sink" => sink_name.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// 记录活跃 sink 数
pub fn record_active_sinks(count: usize) {
    gauge!("analytics_pump_active_sinks").set(count as f64);
}

/// Pump 运行指标聚合器
///
/// 在内存中聚合指标，便于退出时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct PumpMetricsAggregator {
    /// 周期总数
    pub total_cycles: u64,

    /// 取出的条目总数
    pub total_drained: u64,

    /// 解码失败总数
    pub total_decode_failures: u64,

    /// 周期耗时统计 (毫秒)
    pub cycle_stats: RunningStats,

    /// 各 sink 各状态的次数
    pub sink_outcomes: BTreeMap<String, BTreeMap<&'static str, u64>>,
}

impl PumpMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新周期统计
    pub fn update_cycle(&mut self, drained: usize, dropped: usize, elapsed_ms: f64) {
        self.total_cycles += 1;
        self.total_drained += drained as u64;
        self.total_decode_failures += dropped as u64;
        self.cycle_stats.push(elapsed_ms);
    }

    /// 更新 sink 结果统计
    pub fn update_sink(&mut self, sink_name: &str, status: &'static str) {
        *self
            .sink_outcomes
            .entry(sink_name.to_string())
            .or_default()
            .entry(status)
            .or_insert(0) += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_cycles: self.total_cycles,
            total_drained: self.total_drained,
            total_decode_failures: self.total_decode_failures,
            decode_failure_rate: if self.total_drained > 0 {
                self.total_decode_failures as f64 / self.total_drained as f64 * 100.0
            } else {
                0.0
            },
            cycle_duration_ms: StatsSummary::from(&self.cycle_stats),
            sink_outcomes: self.sink_outcomes.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_cycles: u64,
    pub total_drained: u64,
    pub total_decode_failures: u64,
    pub decode_failure_rate: f64,
    pub cycle_duration_ms: StatsSummary,
    pub sink_outcomes: BTreeMap<String, BTreeMap<&'static str, u64>>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Pump Metrics Summary ===")?;
        writeln!(f, "Purge cycles: {}", self.total_cycles)?;
        writeln!(f, "Records drained: {}", self.total_drained)?;
        writeln!(
            f,
            "Decode failures: {} ({:.2}%)",
            self.total_decode_failures, self.decode_failure_rate
        )?;
        writeln!(f, "Cycle duration (ms): {}", self.cycle_duration_ms)?;

        if !self.sink_outcomes.is_empty() {
            writeln!(f, "Sink outcomes:")?;
            for (sink, outcomes) in &self.sink_outcomes {
                let parts: Vec<String> = outcomes
                    .iter()
                    .map(|(status, count)| format!("{status}={count}"))
                    .collect();
                writeln!(f, "  {}: {}", sink, parts.join(", "))?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
