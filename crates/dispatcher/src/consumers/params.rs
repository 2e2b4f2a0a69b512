//! Helpers for reading consumer `params` with environment fallbacks

use std::collections::HashMap;
use std::str::FromStr;

use contracts::ContractError;

/// Look up `key` in `params`, falling back to the `env` variable
///
/// Empty values count as missing.
pub(crate) fn param_or_env(
    params: &HashMap<String, String>,
    key: &str,
    env: &str,
) -> Option<String> {
    let present = |v: &String| !v.trim().is_empty();
    params
        .get(key)
        .filter(|v| present(v))
        .cloned()
        .or_else(|| std::env::var(env).ok().filter(present))
}

/// Parse an optional parameter, reporting which field was malformed
pub(crate) fn parse_param<T>(
    consumer: &str,
    key: &str,
    value: Option<String>,
) -> Result<Option<T>, ContractError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.parse::<T>().map_err(|e| {
                ContractError::config_validation(
                    format!("consumers[{consumer}].params.{key}"),
                    format!("invalid value '{raw}': {e}"),
                )
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_wins_over_env() {
        let params = HashMap::from([("path".to_string(), "/tmp/a".to_string())]);
        assert_eq!(
            param_or_env(&params, "path", "SIDDI_TEST_UNSET_PATH"),
            Some("/tmp/a".to_string())
        );
    }

    #[test]
    fn test_empty_param_is_missing() {
        let params = HashMap::from([("path".to_string(), "  ".to_string())]);
        assert_eq!(param_or_env(&params, "path", "SIDDI_TEST_UNSET_PATH"), None);
    }

    #[test]
    fn test_parse_param() {
        let ok: Option<u64> = parse_param("amp", "timeout_secs", Some("5".into())).unwrap();
        assert_eq!(ok, Some(5));

        let missing: Option<u64> = parse_param("amp", "timeout_secs", None).unwrap();
        assert_eq!(missing, None);

        let err = parse_param::<u64>("amp", "timeout_secs", Some("soon".into())).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }
}
