//! ConsumerRule - which events reach which consumer
//!
//! Patterns are plain substrings of the event name; `*` matches everything.
//!
//! ```text
//! { name = "mixpanel" }                                  -> every event
//! { name = "mixpanel", deny = ["*"] }                    -> nothing
//! { name = "mixpanel", deny = ["site.login.", "user."] } -> all but those namespaces
//! { name = "mixpanel", allow = ["app."] }                -> only app.* events
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Pattern matching every event name
pub const WILDCARD: &str = "*";

/// Routing rule for one consumer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerRule {
    /// Consumer name, looked up in the registry
    pub name: String,

    /// Allowed patterns (`None` = `["*"]`, empty = nothing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Vec<String>>,

    /// Denied patterns (`None` = `[]`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny: Option<Vec<String>>,

    /// Properties stripped from specific events before forwarding
    #[serde(
        default,
        alias = "denyParameters",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub deny_parameters: Vec<DenyParameters>,
}

/// Property names removed from one event id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyParameters {
    /// Exact event name this entry applies to
    #[serde(alias = "eventId")]
    pub event_id: String,

    /// Property names to remove
    #[serde(default)]
    pub parameters: BTreeSet<String>,
}

impl ConsumerRule {
    /// Rule forwarding every event to `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_allow<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_deny<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deny = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_deny_parameters<I, S>(mut self, event_id: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deny_parameters.push(DenyParameters {
            event_id: event_id.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_lists_stay_absent() {
        let rule: ConsumerRule = serde_json::from_str(r#"{"name": "mixpanel"}"#).unwrap();
        assert_eq!(rule.allow, None);
        assert_eq!(rule.deny, None);
        assert!(rule.deny_parameters.is_empty());
    }

    #[test]
    fn test_empty_allow_is_kept() {
        let rule: ConsumerRule =
            serde_json::from_str(r#"{"name": "mixpanel", "allow": []}"#).unwrap();
        assert_eq!(rule.allow, Some(vec![]));
    }

    #[test]
    fn test_camel_case_aliases() {
        let rule: ConsumerRule = serde_json::from_str(
            r#"{
                "name": "heap",
                "denyParameters": [{ "eventId": "app.login", "parameters": ["email", "ip"] }]
            }"#,
        )
        .unwrap();

        assert_eq!(rule.deny_parameters.len(), 1);
        assert_eq!(rule.deny_parameters[0].event_id, "app.login");
        assert!(rule.deny_parameters[0].parameters.contains("email"));
    }

    #[test]
    fn test_builder() {
        let rule = ConsumerRule::new("ga4")
            .with_allow(["app."])
            .with_deny(["app.debug."])
            .with_deny_parameters("app.login", ["email"]);

        assert_eq!(rule.allow.as_deref(), Some(&["app.".to_string()][..]));
        assert_eq!(rule.deny.as_deref(), Some(&["app.debug.".to_string()][..]));
        assert_eq!(rule.deny_parameters[0].parameters.len(), 1);
    }
}
