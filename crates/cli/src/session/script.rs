//! Replay script entries, one JSON object per line.

use anyhow::{Context, Result};
use contracts::Properties;
use serde::Deserialize;

/// One scripted call
///
/// ```text
/// {"identify": {"user_id": "u1", "properties": {"plan": "pro"}}}
/// {"track": {"event": "document.create", "properties": {"value1": 3}}}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptEntry {
    Identify {
        #[serde(alias = "userId")]
        user_id: String,
        #[serde(default)]
        properties: Option<Properties>,
    },
    Track {
        #[serde(alias = "name")]
        event: String,
        #[serde(default)]
        properties: Properties,
    },
}

impl ScriptEntry {
    /// Parse one script line; `None` for blank lines and `#` comments
    pub fn parse_line(line: &str) -> Option<Result<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        Some(serde_json::from_str(line).context("invalid script entry"))
    }
}

/// Parse a JSON object of event or user properties
pub fn parse_properties(raw: Option<&str>) -> Result<Properties> {
    match raw {
        Some(raw) => serde_json::from_str(raw)
            .with_context(|| format!("properties must be a JSON object of string, number, bool or nested objects: {raw}")),
        None => Ok(Properties::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::PropertyValue;

    #[test]
    fn test_parse_identify_and_track() {
        let identify =
            ScriptEntry::parse_line(r#"{"identify": {"user_id": "u1", "properties": {"plan": "pro"}}}"#)
                .unwrap()
                .unwrap();
        assert!(matches!(
            identify,
            ScriptEntry::Identify { ref user_id, properties: Some(ref p) }
                if user_id == "u1" && p.get("plan") == Some(&PropertyValue::from("pro"))
        ));

        let track = ScriptEntry::parse_line(r#"{"track": {"event": "app.login"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            track,
            ScriptEntry::Track {
                event: "app.login".into(),
                properties: Properties::new(),
            }
        );
    }

    #[test]
    fn test_skip_blank_and_comment_lines() {
        assert!(ScriptEntry::parse_line("   ").is_none());
        assert!(ScriptEntry::parse_line("# warm up").is_none());
    }

    #[test]
    fn test_invalid_line_is_error() {
        assert!(ScriptEntry::parse_line(r#"{"page": {}}"#).unwrap().is_err());
    }

    #[test]
    fn test_parse_properties() {
        let props = parse_properties(Some(r#"{"value1": 3, "ok": true}"#)).unwrap();
        assert_eq!(props.get("value1"), Some(&PropertyValue::from(3_i64)));
        assert!(parse_properties(None).unwrap().is_empty());
        assert!(parse_properties(Some("[1, 2]")).is_err());
        assert!(parse_properties(Some(r#"{"x": null}"#)).is_err());
    }
}
