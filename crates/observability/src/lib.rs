//! # Observability
//!
//! Siddi 的日志与指标初始化。
//!
//! ## 功能
//!
//! - Tracing 初始化 (JSON / Pretty / Compact)，日志写入 stderr，stdout 留给命令输出
//! - 过滤规则优先读 `SIDDI_LOG`，其次 `RUST_LOG`
//! - 可选 Prometheus 导出
//! - 分发指标记录与聚合
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{init_with_config, DispatchMetricsAggregator, ObservabilityConfig};
//!
//! init_with_config(ObservabilityConfig::default().with_metrics_port(9464))?;
//!
//! let mut aggregator = DispatchMetricsAggregator::new();
//! aggregator.update([("amplitude", "sent")], 42.0);
//! println!("{}", aggregator.summary());
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

pub use crate::metrics::{
    record_consumer_outcome, record_consumer_probe, record_delivery, record_event_tracked,
    record_identify_pushed, record_track_latency_us, DispatchMetricsAggregator, MetricsSummary,
    RunningStats, StatsSummary,
};

/// 优先于 `RUST_LOG` 的过滤环境变量
pub const LOG_ENV: &str = "SIDDI_LOG";

/// 可观测性配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus 端口 (None = 禁用)
    pub metrics_port: Option<u16>,
    /// Prometheus 监听地址
    pub metrics_addr: IpAddr,
    /// 环境变量未设置时使用的过滤规则
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: None,
            metrics_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            default_log_level: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.metrics_port = Some(port);
        self
    }

    pub fn with_default_log_level(mut self, level: impl Into<String>) -> Self {
        self.default_log_level = level.into();
        self
    }

    /// 导出端点地址，未启用时为 None
    pub fn metrics_endpoint(&self) -> Option<SocketAddr> {
        self.metrics_port
            .map(|port| SocketAddr::new(self.metrics_addr, port))
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志
    #[default]
    Json,
    /// 人类可读格式
    Pretty,
    /// 紧凑单行格式
    Compact,
}

/// 按 `SIDDI_LOG` > `RUST_LOG` > 默认级别解析过滤规则
fn resolve_filter(default_level: &str) -> EnvFilter {
    [LOG_ENV, EnvFilter::DEFAULT_ENV]
        .into_iter()
        .filter_map(|var| std::env::var(var).ok())
        .filter(|value| !value.trim().is_empty())
        .find_map(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level))
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = fmt::layer().with_writer(std::io::stderr);
    match format {
        LogFormat::Json => layer
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

/// 使用自定义配置初始化 Tracing 与 (可选的) Prometheus 导出
///
/// 只能调用一次，重复初始化返回错误。
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt_layer(config.log_format))
        .with(resolve_filter(&config.default_log_level))
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(endpoint) = config.metrics_endpoint() {
        PrometheusBuilder::new()
            .with_http_listener(endpoint)
            .install()
            .context("Failed to install Prometheus recorder")?;
        tracing::info!(%endpoint, "Prometheus metrics endpoint initialized");
    }

    tracing::debug!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}
