//! Rule evaluation: which events reach a consumer, and with which properties

use std::borrow::Cow;

use contracts::{ConsumerRule, Properties, WILDCARD};

/// Check whether `event_name` should be forwarded under `rule`
///
/// Patterns match anywhere in the name. Deny is checked after allow and wins.
/// An absent allow list means `["*"]`; an explicit empty one matches nothing.
pub fn should_track(rule: &ConsumerRule, event_name: &str) -> bool {
    let allowed = match &rule.allow {
        None => true,
        Some(allow) => matches_any(allow, event_name),
    };
    if !allowed {
        return false;
    }

    match &rule.deny {
        None => true,
        Some(deny) => !matches_any(deny, event_name),
    }
}

fn matches_any(patterns: &[String], event_name: &str) -> bool {
    patterns
        .iter()
        .any(|p| p == WILDCARD || event_name.contains(p.as_str()))
}

/// Remove the properties `rule` denies for `event_name`
///
/// Borrows the input untouched when no entry targets this event, so other
/// consumers keep seeing the caller's original map.
pub fn strip_denied_parameters<'a>(
    rule: &ConsumerRule,
    event_name: &str,
    properties: &'a Properties,
) -> Cow<'a, Properties> {
    let mut entries = rule
        .deny_parameters
        .iter()
        .filter(|entry| entry.event_id == event_name)
        .peekable();

    if entries.peek().is_none() {
        return Cow::Borrowed(properties);
    }

    let mut filtered = properties.clone();
    for entry in entries {
        for parameter in &entry.parameters {
            filtered.remove(parameter);
        }
    }
    Cow::Owned(filtered)
}
