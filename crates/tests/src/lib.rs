//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 配置 -> Siddi -> consumer 的端到端测试（无需外部服务）

#[cfg(test)]
mod contract_tests {
    use contracts::{
        ConfigVersion, ConsumerRule, Delivery, EventBlueprint, Properties, PropertyValue,
    };

    #[test]
    fn test_blueprint_version_snapshot() {
        let implicit: EventBlueprint = serde_json::from_str("{}").unwrap();
        assert_eq!(implicit.version, ConfigVersion::V1);

        let json = serde_json::to_value(&implicit).unwrap();
        assert_eq!(json["version"], "V1");

        // 未知版本直接拒绝
        assert!(serde_json::from_str::<EventBlueprint>(r#"{"version": "V2"}"#).is_err());
    }

    #[test]
    fn test_delivery_wire_format() {
        let props = Properties::from([("value1".to_string(), PropertyValue::from(3_i64))]);
        let json = serde_json::to_value(Delivery::track("document.create", props)).unwrap();

        assert_eq!(json["kind"], "track");
        assert_eq!(json["event"], "document.create");
        assert_eq!(json["properties"]["value1"], 3.0);
        assert!(json["at"].is_string());
    }

    #[test]
    fn test_rule_snapshot() {
        let rule = ConsumerRule::new("mixpanel")
            .with_deny(["site.login."])
            .with_deny_parameters("document.create", ["value1"]);
        let json = serde_json::to_value(&rule).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "name": "mixpanel",
                "deny": ["site.login."],
                "deny_parameters": [
                    { "event_id": "document.create", "parameters": ["value1"] }
                ]
            })
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::sync::Arc;

    use config_loader::ConfigFormat;
    use contracts::{
        ConsumerRule, DeliveryStats, EventBlueprint, Properties, PropertyValue, ReidentifyPolicy,
    };
    use dispatcher::{create_siddi, MockCall, MockConsumer, Outcome, SiddiBuilder};
    use observability::DispatchMetricsAggregator;
    use serde_json::Value;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), PropertyValue::from(*v)))
            .collect()
    }

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn file_blueprint(path: &Path) -> EventBlueprint {
        let content = format!(
            r#"
[[consumers]]
name = "console"
consumer_type = "log"

[[consumers]]
name = "archive"
consumer_type = "file"
queue_capacity = 64
[consumers.params]
path = '{}'

[[rules]]
name = "console"
deny = ["*"]

[[rules]]
name = "archive"
deny = ["site.login."]

[[rules.deny_parameters]]
event_id = "document.create"
parameters = ["value1"]
"#,
            path.display()
        );
        config_loader::load_from_str(&content, ConfigFormat::Toml)
            .unwrap()
            .blueprint
    }

    /// End-to-end test: TOML -> Siddi -> FileTransport
    ///
    /// 验证完整的数据流：
    /// 1. 首个到达的事件前补发 identify
    /// 2. deny 规则过滤命名空间
    /// 3. deny_parameters 只作用于指定事件
    /// 4. shutdown 等待队列投递完成
    #[tokio::test]
    async fn test_e2e_file_consumer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let siddi = create_siddi(&file_blueprint(&path)).unwrap();

        siddi.identify("u1", Some(props(&[("plan", "pro")])));
        let login = siddi.track("site.login.success", &Properties::new());
        let create = siddi.track(
            "document.create",
            &props(&[("value1", "secret"), ("value2", "kept")]),
        );
        let update = siddi.track("document.update", &props(&[("value1", "kept")]));

        assert_eq!(login.outcome_of("archive"), Some(Outcome::Filtered));
        assert_eq!(login.outcome_of("console"), Some(Outcome::Filtered));
        assert_eq!(create.sent_to(), vec!["archive"]);
        assert_eq!(update.sent_to(), vec!["archive"]);

        siddi.shutdown().await;

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["kind"], "identify");
        assert_eq!(lines[0]["user_id"], "u1");
        assert_eq!(lines[0]["properties"]["plan"], "pro");

        assert_eq!(lines[1]["event"], "document.create");
        assert!(lines[1]["properties"].get("value1").is_none());
        assert_eq!(lines[1]["properties"]["value2"], "kept");

        assert_eq!(lines[2]["event"], "document.update");
        assert_eq!(lines[2]["properties"]["value1"], "kept");

        assert_eq!(
            siddi.delivery_stats(),
            vec![(
                "archive".to_string(),
                DeliveryStats {
                    delivered: 3,
                    ..Default::default()
                }
            )]
        );
    }

    /// Consumer liveness walkthrough: A is live, B comes up later
    #[test]
    fn test_e2e_lazy_liveness() {
        let a = Arc::new(MockConsumer::new("A"));
        let b = Arc::new(MockConsumer::offline("B"));

        let siddi = SiddiBuilder::new()
            .rule(ConsumerRule::new("A"))
            .rule(ConsumerRule::new("B"))
            .rule(ConsumerRule::new("C"))
            .consumer(a.clone())
            .consumer(b.clone())
            .build()
            .unwrap();

        siddi.identify("u1", None);

        let first = siddi.track("e1", &Properties::new());
        assert_eq!(first.outcome_of("A"), Some(Outcome::Sent));
        assert_eq!(first.outcome_of("B"), Some(Outcome::Disabled));
        assert_eq!(first.outcome_of("C"), Some(Outcome::Unregistered));

        b.set_live(true);
        let second = siddi.track("e2", &Properties::new());
        assert_eq!(second.sent_to(), vec!["A", "B"]);

        // A was probed once; B once per disabled event
        assert_eq!(a.test_count(), 1);
        assert_eq!(b.test_count(), 2);

        let b_calls: Vec<MockCall> = b
            .calls()
            .into_iter()
            .filter(|c| !matches!(c, MockCall::Init | MockCall::Test))
            .collect();
        assert_eq!(b_calls.len(), 2);
        assert!(matches!(&b_calls[0], MockCall::Identify { user_id, .. } if user_id == "u1"));
        assert!(matches!(&b_calls[1], MockCall::Track { event, .. } if event == "e2"));
    }

    /// Re-identification after the user changes
    #[test]
    fn test_e2e_user_switch() {
        let a = Arc::new(MockConsumer::new("A"));
        let siddi = SiddiBuilder::new()
            .rule(ConsumerRule::new("A"))
            .consumer(a.clone())
            .policy(ReidentifyPolicy::OnUserChange)
            .build()
            .unwrap();

        siddi.identify("u1", None);
        siddi.track("e1", &Properties::new());
        siddi.identify("u2", None);
        siddi.track("e2", &Properties::new());
        siddi.track("e3", &Properties::new());

        let users: Vec<String> = a.identified().into_iter().map(|(id, _)| id).collect();
        assert_eq!(users, vec!["u1", "u2"]);
        assert_eq!(a.tracked().len(), 3);
    }

    /// Concurrent callers share one engine; every event lands exactly once
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_e2e_concurrent_tracking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut blueprint = file_blueprint(&path);
        blueprint.consumers[1].queue_capacity = 1024;
        let siddi = Arc::new(create_siddi(&blueprint).unwrap());

        siddi.identify("u1", None);

        let mut tasks = Vec::new();
        for worker in 0..8 {
            let siddi = Arc::clone(&siddi);
            tasks.push(tokio::spawn(async move {
                let mut aggregator = DispatchMetricsAggregator::new();
                for i in 0..25 {
                    let report = siddi.track(&format!("app.w{worker}.e{i}"), &Properties::new());
                    aggregator.update(
                        report
                            .outcomes
                            .iter()
                            .map(|(name, outcome)| (name.as_str(), outcome.as_str())),
                        0.0,
                    );
                }
                aggregator
            }));
        }

        let mut delivered = 0;
        for task in tasks {
            delivered += task.await.unwrap().events_delivered;
        }
        assert_eq!(delivered, 200);

        siddi.shutdown().await;

        let lines = read_lines(&path);
        let identifies = lines.iter().filter(|l| l["kind"] == "identify").count();
        assert_eq!(identifies, 1);
        assert_eq!(lines[0]["kind"], "identify");
        assert_eq!(lines.len(), 201);
    }
}
