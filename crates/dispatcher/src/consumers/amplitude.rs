//! AmplitudeTransport - Amplitude HTTP API v2

use contracts::{ContractError, Delivery, Properties, PropertyValue, Transport};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::params::{param_or_env, parse_param};

const DEFAULT_ENDPOINT: &str = "https://api2.amplitude.com";

/// Configuration for AmplitudeTransport
#[derive(Debug, Clone)]
pub struct AmplitudeConfig {
    pub api_key: Option<String>,
    /// API host, without a trailing path
    pub endpoint: String,
    /// Added to every event's `user_properties` as `region`
    pub region: Option<String>,
    pub timeout: Duration,
}

impl AmplitudeConfig {
    /// Create config from params map, falling back to `AMPLITUDE_*` env vars
    pub fn from_params(name: &str, params: &HashMap<String, String>) -> Result<Self, ContractError> {
        let timeout_secs: u64 =
            parse_param(name, "timeout_secs", params.get("timeout_secs").cloned())?.unwrap_or(10);

        Ok(Self {
            api_key: param_or_env(params, "api_key", "AMPLITUDE_API_KEY"),
            endpoint: param_or_env(params, "endpoint", "AMPLITUDE_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            region: param_or_env(params, "region", "REGION"),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// One event in an `/2/httpapi` upload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmplitudeEvent {
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub event_properties: Properties,
    pub user_properties: Properties,
    /// Milliseconds since epoch
    pub time: i64,
}

/// Transport that uploads events to Amplitude
pub struct AmplitudeTransport {
    name: String,
    config: AmplitudeConfig,
    http: reqwest::Client,
    user_id: Option<String>,
    user_properties: Properties,
}

impl AmplitudeTransport {
    pub fn new(name: impl Into<String>, config: AmplitudeConfig) -> Result<Self, ContractError> {
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
        let config = AmplitudeConfig::from_params(&name, params)?;
        Self::new(name, config)
    }

    /// Build the upload event, merging the identified user's properties
    pub fn build_event(&self, event_name: &str, properties: &Properties, time_ms: i64) -> AmplitudeEvent {
        let mut user_properties = self.user_properties.clone();
        if let Some(region) = &self.config.region {
            user_properties.insert("region".to_string(), PropertyValue::from(region.as_str()));
        }

        AmplitudeEvent {
            event_type: event_name.to_string(),
            user_id: self.user_id.clone(),
            event_properties: properties.clone(),
            user_properties,
            time: time_ms,
        }
    }

    fn api_key(&self) -> Result<&str, ContractError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| ContractError::delivery(&self.name, "api_key not configured"))
    }

    fn check_status(&self, resp: &reqwest::Response) -> Result<(), ContractError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        warn!(transport = %self.name, status = %status, "Amplitude returned non-success");
        Err(ContractError::delivery(
            &self.name,
            format!("amplitude returned {status}"),
        ))
    }

    async fn upload(&self, event: AmplitudeEvent) -> Result<(), ContractError> {
        let body = json!({
            "api_key": self.api_key()?,
            "events": [event],
        });

        let resp = self
            .http
            .post(format!("{}/2/httpapi", self.config.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| ContractError::delivery(&self.name, e.to_string()))?;
        self.check_status(&resp)
    }

    async fn identify(&self, user_id: &str, properties: &Properties) -> Result<(), ContractError> {
        let identification = json!({
            "user_id": user_id,
            "user_properties": properties,
        })
        .to_string();
        let form = [
            ("api_key", self.api_key()?),
            ("identification", identification.as_str()),
        ];

        let resp = self
            .http
            .post(format!("{}/identify", self.config.endpoint))
            .form(&form)
            .send()
            .await
            .map_err(|e| ContractError::delivery(&self.name, e.to_string()))?;
        self.check_status(&resp)
    }
}

impl Transport for AmplitudeTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn open(&mut self) -> Result<(), ContractError> {
        debug!(transport = %self.name, endpoint = %self.config.endpoint, "Amplitude client ready");
        Ok(())
    }

    #[instrument(
        name = "amplitude_deliver",
        skip(self, delivery),
        fields(transport = %self.name, kind = delivery.kind())
    )]
    async fn deliver(&mut self, delivery: &Delivery) -> Result<(), ContractError> {
        match delivery {
            Delivery::Identify {
                user_id,
                properties,
                ..
            } => {
                self.user_id = Some(user_id.clone());
                self.user_properties = properties.clone();
                self.identify(user_id, &self.user_properties).await
            }
            Delivery::Track {
                event,
                properties,
                at,
            } => {
                let event = self.build_event(event, properties, at.timestamp_millis());
                self.upload(event).await
            }
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(transport = %self.name, "AmplitudeTransport closed");
        Ok(())
    }
}
