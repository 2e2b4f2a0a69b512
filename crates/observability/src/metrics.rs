//! 事件分发指标收集模块
//!
//! 记录 Siddi 的分发、探测与投递指标，并提供内存聚合用于输出摘要。

use metrics::{counter, histogram};
use std::collections::BTreeMap;

/// 记录一次 track 调用
pub fn record_event_tracked() {
    counter!("siddi_events_tracked_total").increment(1);
}

/// 记录某个 consumer 对一次 track 的处理结果
///
/// `outcome` 取值：sent / filtered / disabled / failed / unregistered
pub fn record_consumer_outcome(consumer: &str, outcome: &str) {
    counter!(
        "siddi_consumer_events_total",
        "consumer" => consumer.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录一次存活探测
pub fn record_consumer_probe(consumer: &str, live: bool) {
    counter!(
        "siddi_consumer_probes_total",
        "consumer" => consumer.to_string(),
        "live" => live.to_string()
    )
    .increment(1);
}

/// 记录一次惰性 identify 补发
pub fn record_identify_pushed(consumer: &str) {
    counter!(
        "siddi_identify_pushed_total",
        "consumer" => consumer.to_string()
    )
    .increment(1);
}

/// 记录后台队列的一次投递结果
///
/// `status` 取值：delivered / failed / dropped
pub fn record_delivery(transport: &str, status: &str) {
    counter!(
        "siddi_deliveries_total",
        "transport" => transport.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录 track 调用耗时 (微秒)
pub fn record_track_latency_us(latency_us: f64) {
    histogram!("siddi_track_latency_us").record(latency_us);
}

/// 分发指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DispatchMetricsAggregator {
    /// track 调用总数
    pub total_events: u64,

    /// identify 调用总数
    pub total_identifies: u64,

    /// 至少送达一个 consumer 的事件数
    pub events_delivered: u64,

    /// track 耗时统计 (微秒)
    pub latency_stats: RunningStats,

    /// 各 consumer 各结果计数
    pub outcome_counts: BTreeMap<String, BTreeMap<String, u64>>,
}

impl DispatchMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次 identify
    pub fn record_identify(&mut self) {
        self.total_identifies += 1;
    }

    /// 记录一次 track 的各 consumer 结果
    pub fn update<'a>(
        &mut self,
        outcomes: impl IntoIterator<Item = (&'a str, &'a str)>,
        latency_us: f64,
    ) {
        self.total_events += 1;
        self.latency_stats.push(latency_us);

        let mut delivered = false;
        for (consumer, outcome) in outcomes {
            delivered |= outcome == "sent";
            *self
                .outcome_counts
                .entry(consumer.to_string())
                .or_default()
                .entry(outcome.to_string())
                .or_insert(0) += 1;
        }
        if delivered {
            self.events_delivered += 1;
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_events: self.total_events,
            total_identifies: self.total_identifies,
            events_delivered: self.events_delivered,
            delivery_rate: if self.total_events > 0 {
                self.events_delivered as f64 / self.total_events as f64 * 100.0
            } else {
                0.0
            },
            track_latency_us: StatsSummary::from(&self.latency_stats),
            outcome_counts: self.outcome_counts.clone(),
        }
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_events: u64,
    pub total_identifies: u64,
    pub events_delivered: u64,
    pub delivery_rate: f64,
    pub track_latency_us: StatsSummary,
    pub outcome_counts: BTreeMap<String, BTreeMap<String, u64>>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Summary ===")?;
        writeln!(f, "Identify calls: {}", self.total_identifies)?;
        writeln!(f, "Tracked events: {}", self.total_events)?;
        writeln!(
            f,
            "Delivered to at least one consumer: {} ({:.2}%)",
            self.events_delivered, self.delivery_rate
        )?;
        writeln!(f, "Track latency (us): {}", self.track_latency_us)?;

        if !self.outcome_counts.is_empty() {
            writeln!(f, "Per consumer:")?;
            for (consumer, counts) in &self.outcome_counts {
                let line: Vec<String> = counts.iter().map(|(o, n)| format!("{o}={n}")).collect();
                writeln!(f, "  {}: {}", consumer, line.join(", "))?;
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
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
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
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
