//! EventBlueprint - Config Loader 输出
//!
//! 描述完整的分发配置：分发策略、consumer 实例、路由规则。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ConsumerRule;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的分发配置蓝图
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 分发策略
    #[serde(default)]
    pub dispatch: DispatchSettings,

    /// Consumer 实例定义 (registry)
    #[serde(default)]
    pub consumers: Vec<ConsumerConfig>,

    /// 路由规则，按顺序分发
    #[serde(default)]
    pub rules: Vec<ConsumerRule>,
}

impl EventBlueprint {
    /// 按名称查找 consumer 定义
    pub fn consumer(&self, name: &str) -> Option<&ConsumerConfig> {
        self.consumers.iter().find(|c| c.name == name)
    }

    /// 引用了未定义 consumer 的规则名
    pub fn unresolved_rules(&self) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|r| self.consumer(&r.name).is_none())
            .map(|r| r.name.as_str())
            .collect()
    }
}

/// 分发策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// 用户重新识别策略
    #[serde(default)]
    pub reidentify: ReidentifyPolicy,
}

/// 用户重新识别策略
///
/// 决定一个已识别的 consumer 在用户变更后是否再次收到 identify。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReidentifyPolicy {
    /// 每个 consumer 只识别一次
    #[default]
    Never,
    /// 当前用户 id 与已识别 id 不同时再次识别
    OnUserChange,
}

/// Consumer 实例配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Consumer 名称 (规则通过它引用)
    pub name: String,

    /// Consumer 类型
    #[serde(alias = "consumerType", alias = "type")]
    pub consumer_type: ConsumerType,

    /// 队列容量 (仅队列型 consumer)
    #[serde(default = "default_queue_capacity", alias = "queueCapacity")]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl ConsumerConfig {
    pub fn new(name: impl Into<String>, consumer_type: ConsumerType) -> Self {
        Self {
            name: name.into(),
            consumer_type,
            queue_capacity: default_queue_capacity(),
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

fn default_queue_capacity() -> usize {
    256
}

/// Consumer 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerType {
    /// 日志输出
    Log,
    /// JSON lines 文件输出
    File,
    /// Amplitude HTTP API
    Amplitude,
    /// Matomo HTTP tracking API
    Matomo,
    /// Postgres 事件表
    Postgres,
}

impl ConsumerType {
    /// 是否通过后台队列投递
    pub fn is_queued(&self) -> bool {
        !matches!(self, Self::Log)
    }
}
