//! PostgresTransport - stores tracked events in a Postgres table

use contracts::{ContractError, Delivery, Transport};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::params::{param_or_env, parse_param};

const DEFAULT_TABLE: &str = "siddi_events";

/// Configuration for PostgresTransport
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Full connection string; wins over the individual fields
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub table: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl PostgresConfig {
    /// Create config from params map, falling back to `POSTGRES_*` env vars
    pub fn from_params(name: &str, params: &HashMap<String, String>) -> Result<Self, ContractError> {
        let port: u16 =
            parse_param(name, "port", param_or_env(params, "port", "POSTGRES_PORT"))?.unwrap_or(5432);
        let max_connections: u32 =
            parse_param(name, "max_connections", params.get("max_connections").cloned())?
                .unwrap_or(4);
        let acquire_secs: u64 =
            parse_param(name, "acquire_timeout_secs", params.get("acquire_timeout_secs").cloned())?
                .unwrap_or(5);

        let table = params
            .get("table")
            .cloned()
            .unwrap_or_else(|| DEFAULT_TABLE.to_string());
        if !is_valid_identifier(&table) {
            return Err(ContractError::config_validation(
                format!("consumers[{name}].params.table"),
                format!("'{table}' is not a valid table name"),
            ));
        }

        Ok(Self {
            url: param_or_env(params, "url", "DATABASE_URL"),
            host: param_or_env(params, "host", "POSTGRES_HOST"),
            port,
            user: param_or_env(params, "user", "POSTGRES_USER"),
            password: param_or_env(params, "password", "POSTGRES_PASSWORD"),
            database: param_or_env(params, "database", "POSTGRES_DB"),
            table,
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_secs),
        })
    }

    fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        if let Some(url) = &self.url {
            return url.parse();
        }

        let mut options = PgConnectOptions::new().port(self.port);
        if let Some(host) = &self.host {
            options = options.host(host);
        }
        if let Some(user) = &self.user {
            options = options.username(user);
        }
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        if let Some(database) = &self.database {
            options = options.database(database);
        }
        Ok(options)
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                user_id TEXT,
                event_name TEXT NOT NULL,
                properties JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )",
            self.table
        )
    }

    fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (user_id, event_name, properties, created_at) VALUES ($1, $2, $3, $4)",
            self.table
        )
    }
}

/// Letters, digits and underscores, not starting with a digit
fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Transport that inserts one row per tracked event
///
/// The pool connects lazily. Table creation is retried before each insert
/// until it has succeeded once, so a database that comes up after the worker
/// starts still receives events.
pub struct PostgresTransport {
    name: String,
    config: PostgresConfig,
    pool: Option<PgPool>,
    schema_ready: bool,
    user_id: Option<String>,
}

impl PostgresTransport {
    pub fn new(name: impl Into<String>, config: PostgresConfig) -> Self {
        Self {
            name: name.into(),
            config,
            pool: None,
            schema_ready: false,
            user_id: None,
        }
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = PostgresConfig::from_params(&name, params)?;
        Ok(Self::new(name, config))
    }

    fn ensure_pool(&mut self) -> Result<PgPool, ContractError> {
        if let Some(pool) = &self.pool {
            return Ok(pool.clone());
        }

        let options = self
            .config
            .connect_options()
            .map_err(|e| ContractError::transport_connection(&self.name, e.to_string()))?;
        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(self.config.acquire_timeout)
            .connect_lazy_with(options);
        self.pool = Some(pool.clone());
        Ok(pool)
    }

    async fn ensure_schema(&mut self) -> Result<PgPool, ContractError> {
        let pool = self.ensure_pool()?;
        if self.schema_ready {
            return Ok(pool);
        }

        sqlx::query(&self.config.create_table_sql())
            .execute(&pool)
            .await
            .map_err(|e| ContractError::transport_connection(&self.name, e.to_string()))?;

        info!(transport = %self.name, table = %self.config.table, "Postgres table ready");
        self.schema_ready = true;
        Ok(pool)
    }

    fn db_error(&self, e: sqlx::Error) -> ContractError {
        ContractError::delivery(&self.name, e.to_string())
    }
}

impl Transport for PostgresTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.config.url.is_some() || self.config.host.is_some()
    }

    #[instrument(name = "postgres_transport_open", skip(self), fields(transport = %self.name))]
    async fn open(&mut self) -> Result<(), ContractError> {
        self.ensure_schema().await.map(|_| ())
    }

    #[instrument(
        name = "postgres_transport_deliver",
        skip(self, delivery),
        fields(transport = %self.name, kind = delivery.kind())
    )]
    async fn deliver(&mut self, delivery: &Delivery) -> Result<(), ContractError> {
        match delivery {
            Delivery::Identify { user_id, .. } => {
                self.user_id = Some(user_id.clone());
                Ok(())
            }
            Delivery::Track {
                event,
                properties,
                at,
            } => {
                let pool = self.ensure_schema().await?;
                sqlx::query(&self.config.insert_sql())
                    .bind(self.user_id.as_deref())
                    .bind(event)
                    .bind(sqlx::types::Json(properties))
                    .bind(*at)
                    .execute(&pool)
                    .await
                    .map_err(|e| self.db_error(e))?;
                Ok(())
            }
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "postgres_transport_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
        self.schema_ready = false;
        debug!(transport = %self.name, "PostgresTransport closed");
        Ok(())
    }
}
