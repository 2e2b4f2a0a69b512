//! # Dispatcher
//!
//! 事件分发模块。
//!
//! 负责：
//! - 按规则过滤事件并剥离敏感参数
//! - 惰性探测 consumer 存活并补发 identify
//! - 隔离慢 consumer，不阻塞调用方

pub mod builder;
pub mod consumers;
pub mod error;
pub mod filter;
pub mod handle;
pub mod metrics;
pub mod registry;
pub mod siddi;

pub use builder::{create_consumer, create_siddi, SiddiBuilder};
pub use consumers::{LogConsumer, MockCall, MockConsumer, QueuedConsumer};
pub use contracts::{Consumer, ConsumerRule, Properties, PropertyValue};
pub use error::DispatcherError;
pub use filter::{should_track, strip_denied_parameters};
pub use handle::TransportHandle;
pub use metrics::{DeliveryResult, TransportMetrics};
pub use registry::ConsumerRegistry;
pub use siddi::{DispatchReport, Outcome, Siddi};
