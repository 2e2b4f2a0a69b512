//! MatomoTransport - Matomo HTTP tracking API

use contracts::{ContractError, Delivery, Properties, Transport};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::params::{param_or_env, parse_param};

/// Offset added to `valueN` when mapped to a Matomo dimension
const DIMENSION_OFFSET: u32 = 3;

/// Event category sent as `e_c`
const DEFAULT_CATEGORY: &str = "Siddi";

/// Configuration for MatomoTransport
#[derive(Debug, Clone)]
pub struct MatomoConfig {
    pub site_id: Option<String>,
    /// Base URL of the Matomo install; `/matomo.php` is appended
    pub site_url: Option<String>,
    /// Page URL reported with each event; `?event={name}` is appended
    pub source_url: Option<String>,
    pub category: String,
    pub timeout: Duration,
}

impl MatomoConfig {
    /// Create config from params map, falling back to `MATOMO_*` env vars
    pub fn from_params(name: &str, params: &HashMap<String, String>) -> Result<Self, ContractError> {
        let timeout_secs: u64 =
            parse_param(name, "timeout_secs", params.get("timeout_secs").cloned())?.unwrap_or(10);

        Ok(Self {
            site_id: param_or_env(params, "site_id", "MATOMO_SITE_ID"),
            site_url: param_or_env(params, "site_url", "MATOMO_SITE_URL"),
            source_url: param_or_env(params, "source_url", "MATOMO_SOURCE_URL"),
            category: params
                .get("category")
                .cloned()
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    fn tracker_url(&self) -> Option<String> {
        self.site_url
            .as_deref()
            .map(|url| format!("{}/matomo.php", url.trim_end_matches('/')))
    }

    fn page_url(&self, event_name: &str) -> String {
        match self.source_url.as_deref() {
            Some(url) => format!("{url}?event={event_name}"),
            None => format!("https://siddi.local/?event={event_name}"),
        }
    }
}

/// Map event properties onto Matomo custom dimensions
///
/// `valueN` becomes `dimension{N+3}`, `valueNType` is dropped and every
/// other key is passed through.
pub fn prepare_dimensions(properties: &Properties) -> Vec<(String, String)> {
    properties
        .iter()
        .filter(|(key, _)| !is_value_type_key(key))
        .map(|(key, value)| {
            let key = match value_index(key) {
                Some(n) => format!("dimension{}", n + DIMENSION_OFFSET),
                None => key.clone(),
            };
            (key, value.to_string())
        })
        .collect()
}

/// `value3Type`, `myvalue1Type`, ...
fn is_value_type_key(key: &str) -> bool {
    key.match_indices("value").any(|(i, _)| {
        let rest = &key[i + "value".len()..];
        let mut chars = rest.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_digit()) && chars.as_str().starts_with("Type")
    })
}

/// Single digit after a trailing `value`, e.g. `value2` -> 2
fn value_index(key: &str) -> Option<u32> {
    let digit = key.chars().last()?.to_digit(10)?;
    let stem = &key[..key.len() - 1];
    stem.ends_with("value").then_some(digit)
}

/// Transport that sends events to Matomo
pub struct MatomoTransport {
    name: String,
    config: MatomoConfig,
    http: reqwest::Client,
    user_id: Option<String>,
    /// Identify properties echoed on every hit
    user_properties: Properties,
}

impl MatomoTransport {
    pub fn new(name: impl Into<String>, config: MatomoConfig) -> Result<Self, ContractError> {
        let name = name.into();
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ContractError::consumer_init(&name, e.to_string()))?;

        Ok(Self {
            name,
            config,
            http,
            user_id: None,
            user_properties: Properties::new(),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = MatomoConfig::from_params(&name, params)?;
        Self::new(name, config)
    }

    /// Query string for one tracked event
    pub fn build_query(&self, event_name: &str, properties: &Properties) -> Vec<(String, String)> {
        let site_id = self.config.site_id.clone().unwrap_or_default();
        let action = properties
            .get("eventType")
            .map(ToString::to_string)
            .unwrap_or_else(|| "unknown".to_string());

        let mut query: Vec<(String, String)> = self
            .user_properties
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect();
        query.extend(prepare_dimensions(properties));
        query.extend([
            ("idsite".to_string(), site_id),
            ("rec".to_string(), "1".to_string()),
            ("action_name".to_string(), event_name.to_string()),
            ("url".to_string(), self.config.page_url(event_name)),
            ("e_c".to_string(), self.config.category.clone()),
            ("e_a".to_string(), action),
            ("e_n".to_string(), event_name.to_string()),
        ]);
        if let Some(uid) = &self.user_id {
            query.push(("uid".to_string(), uid.clone()));
        }
        query
    }

    async fn send(&self, query: &[(String, String)]) -> Result<(), ContractError> {
        let Some(url) = self.config.tracker_url() else {
            return Err(ContractError::delivery(&self.name, "site_url not configured"));
        };

        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| ContractError::delivery(&self.name, e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            warn!(transport = %self.name, status = %status, "Matomo returned non-success");
            return Err(ContractError::delivery(
                &self.name,
                format!("matomo returned {status}"),
            ));
        }
        Ok(())
    }
}

impl Transport for MatomoTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.config.site_id.is_some() && self.config.site_url.is_some()
    }

    async fn open(&mut self) -> Result<(), ContractError> {
        debug!(transport = %self.name, url = ?self.config.tracker_url(), "Matomo tracker ready");
        Ok(())
    }

    #[instrument(
        name = "matomo_deliver",
        skip(self, delivery),
        fields(transport = %self.name, kind = delivery.kind())
    )]
    async fn deliver(&mut self, delivery: &Delivery) -> Result<(), ContractError> {
        match delivery {
            // Matomo has no identify call; the user rides along on later hits
            Delivery::Identify {
                user_id,
                properties,
                ..
            } => {
                self.user_id = Some(user_id.clone());
                self.user_properties
                    .extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(())
            }
            Delivery::Track {
                event, properties, ..
            } => {
                let query = self.build_query(event, properties);
                self.send(&query).await
            }
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(transport = %self.name, "MatomoTransport closed");
        Ok(())
    }
}
