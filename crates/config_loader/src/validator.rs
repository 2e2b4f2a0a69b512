//! 配置校验模块
//!
//! 校验规则：
//! - consumer 名称非空且唯一
//! - queue_capacity > 0
//! - 规则名称非空
//! - deny_parameters 的 event_id 非空
//!
//! 引用未定义 consumer 的规则不是错误，只产生警告 (见 [`warnings`])。

use std::collections::HashSet;

use contracts::{ContractError, EventBlueprint};

/// 校验 EventBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &EventBlueprint) -> Result<(), ContractError> {
    validate_consumer_names(blueprint)?;
    validate_queue_capacities(blueprint)?;
    validate_rules(blueprint)?;
    Ok(())
}

/// 非致命问题列表
pub fn warnings(blueprint: &EventBlueprint) -> Vec<String> {
    if blueprint.rules.is_empty() {
        return vec!["no rules configured, every event will be dropped".to_string()];
    }

    let mut warnings: Vec<String> = blueprint
        .unresolved_rules()
        .into_iter()
        .map(|name| format!("rule '{name}' names no configured consumer and will be skipped"))
        .collect();

    for rule in &blueprint.rules {
        if rule.allow.as_ref().is_some_and(Vec::is_empty) {
            warnings.push(format!(
                "rule '{}' has an empty allow list and will never forward",
                rule.name
            ));
        }
    }

    for consumer in &blueprint.consumers {
        if !blueprint.rules.iter().any(|r| r.name == consumer.name) {
            warnings.push(format!(
                "consumer '{}' is not referenced by any rule",
                consumer.name
            ));
        }
    }
    warnings
}

/// 校验 consumer 名称唯一性
fn validate_consumer_names(blueprint: &EventBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, consumer) in blueprint.consumers.iter().enumerate() {
        if consumer.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("consumers[{idx}].name"),
                "consumer name cannot be empty",
            ));
        }
        if !seen.insert(&consumer.name) {
            return Err(ContractError::config_validation(
                format!("consumers[name={}]", consumer.name),
                "duplicate consumer name",
            ));
        }
    }
    Ok(())
}

/// 校验队列容量
fn validate_queue_capacities(blueprint: &EventBlueprint) -> Result<(), ContractError> {
    for consumer in &blueprint.consumers {
        if consumer.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("consumers[{}].queue_capacity", consumer.name),
                "queue_capacity must be > 0",
            ));
        }
    }
    Ok(())
}

/// 校验规则
fn validate_rules(blueprint: &EventBlueprint) -> Result<(), ContractError> {
    for (idx, rule) in blueprint.rules.iter().enumerate() {
        if rule.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("rules[{idx}].name"),
                "rule name cannot be empty",
            ));
        }
        for (entry_idx, entry) in rule.deny_parameters.iter().enumerate() {
            if entry.event_id.is_empty() {
                return Err(ContractError::config_validation(
                    format!("rules[{}].deny_parameters[{entry_idx}].event_id", rule.name),
                    "event_id cannot be empty",
                ));
            }
        }
    }
    Ok(())
}
