//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;

use contracts::{ConsumerConfig, ConsumerRule, EventBlueprint};

use super::load_blueprint;
use crate::cli::InfoArgs;

/// Param keys whose values are never printed
const SECRET_PARAMS: &[&str] = &["api_key", "password", "url"];

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    reidentify: String,
    consumers: Vec<ConsumerInfo>,
    rules: Vec<RuleInfo>,
}

#[derive(Serialize)]
struct ConsumerInfo {
    name: String,
    consumer_type: String,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct RuleInfo {
    name: String,
    allow: String,
    deny: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    deny_parameters: BTreeMap<String, Vec<String>>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let blueprint = load_blueprint(&args.config)?;
    let info = build_config_info(&blueprint);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &EventBlueprint) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        reidentify: format!("{:?}", blueprint.dispatch.reidentify),
        consumers: blueprint.consumers.iter().map(consumer_info).collect(),
        rules: blueprint.rules.iter().map(rule_info).collect(),
    }
}

fn consumer_info(config: &ConsumerConfig) -> ConsumerInfo {
    let params = config
        .params
        .iter()
        .map(|(k, v)| {
            let shown = if SECRET_PARAMS.contains(&k.as_str()) {
                "***".to_string()
            } else {
                v.clone()
            };
            (k.clone(), shown)
        })
        .collect();

    ConsumerInfo {
        name: config.name.clone(),
        consumer_type: format!("{:?}", config.consumer_type),
        queue_capacity: config.queue_capacity,
        params,
    }
}

fn rule_info(rule: &ConsumerRule) -> RuleInfo {
    let patterns = |list: &Option<Vec<String>>, absent: &str| match list {
        None => absent.to_string(),
        Some(list) if list.is_empty() => "(none)".to_string(),
        Some(list) => list.join(", "),
    };

    RuleInfo {
        name: rule.name.clone(),
        allow: patterns(&rule.allow, "*"),
        deny: patterns(&rule.deny, "(none)"),
        deny_parameters: rule
            .deny_parameters
            .iter()
            .map(|d| (d.event_id.clone(), d.parameters.iter().cloned().collect()))
            .collect(),
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("=== Siddi Configuration ===\n");
    println!("Version: {}", info.version);
    println!("Reidentify: {}", info.reidentify);

    println!("\nConsumers ({})", info.consumers.len());
    for (i, consumer) in info.consumers.iter().enumerate() {
        let prefix = if i == info.consumers.len() - 1 { "└─" } else { "├─" };
        println!(
            "   {} {} ({}, queue {})",
            prefix, consumer.name, consumer.consumer_type, consumer.queue_capacity
        );
        for (key, value) in &consumer.params {
            println!("        {} = {}", key, value);
        }
    }

    println!("\nRules ({})", info.rules.len());
    for (i, rule) in info.rules.iter().enumerate() {
        let prefix = if i == info.rules.len() - 1 { "└─" } else { "├─" };
        println!("   {} {}", prefix, rule.name);
        println!("        allow: {}", rule.allow);
        println!("        deny:  {}", rule.deny);
        for (event_id, params) in &rule.deny_parameters {
            println!("        strip {:?} from {}", params, event_id);
        }
    }

    println!();
}
