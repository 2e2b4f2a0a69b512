//! FileTransport - appends deliveries to a JSON lines file

use contracts::{ContractError, Delivery, Transport};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, error, instrument};

use super::params::param_or_env;

/// Configuration for FileTransport
#[derive(Debug, Clone)]
pub struct FileTransportConfig {
    /// Output file, created if missing
    pub path: PathBuf,
}

impl FileTransportConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let path = param_or_env(params, "path", "SIDDI_EVENTS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./events.jsonl"));

        Self { path }
    }
}

/// Transport that writes one JSON object per delivery
pub struct FileTransport {
    name: String,
    config: FileTransportConfig,
    writer: Option<BufWriter<File>>,
}

impl FileTransport {
    /// Create a new FileTransport; the file is opened by the worker
    pub fn new(name: impl Into<String>, config: FileTransportConfig) -> Self {
        Self {
            name: name.into(),
            config,
            writer: None,
        }
    }

    /// Create from params map (for factory)
    pub fn from_params(name: impl Into<String>, params: &HashMap<String, String>) -> Self {
        Self::new(name, FileTransportConfig::from_params(params))
    }

    async fn open_file(&self) -> std::io::Result<BufWriter<File>> {
        if let Some(parent) = self.config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.path)
            .await?;
        Ok(BufWriter::new(file))
    }

    fn io_error(&self, e: impl std::fmt::Display) -> ContractError {
        ContractError::delivery(&self.name, e.to_string())
    }
}

impl Transport for FileTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "file_transport_open", skip(self), fields(transport = %self.name))]
    async fn open(&mut self) -> Result<(), ContractError> {
        let writer = self.open_file().await.map_err(|e| {
            error!(transport = %self.name, path = %self.config.path.display(), error = %e, "Open failed");
            ContractError::transport_connection(&self.name, e.to_string())
        })?;
        self.writer = Some(writer);
        debug!(transport = %self.name, path = %self.config.path.display(), "File opened");
        Ok(())
    }

    #[instrument(
        name = "file_transport_deliver",
        skip(self, delivery),
        fields(transport = %self.name, kind = delivery.kind())
    )]
    async fn deliver(&mut self, delivery: &Delivery) -> Result<(), ContractError> {
        let mut line = serde_json::to_vec(delivery).map_err(|e| self.io_error(e))?;
        line.push(b'\n');

        // A failed open is retried on every delivery until the file opens
        if self.writer.is_none() {
            let writer = self
                .open_file()
                .await
                .map_err(|e| ContractError::transport_connection(&self.name, e.to_string()))?;
            debug!(transport = %self.name, path = %self.config.path.display(), "File reopened");
            self.writer = Some(writer);
        }

        let Some(writer) = self.writer.as_mut() else {
            return Err(ContractError::delivery(&self.name, "file not open"));
        };
        writer
            .write_all(&line)
            .await
            .map_err(|e| ContractError::delivery(&self.name, e.to_string()))
    }

    #[instrument(name = "file_transport_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().await?;
        }
        Ok(())
    }

    #[instrument(name = "file_transport_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
        }
        debug!(transport = %self.name, "FileTransport closed");
        Ok(())
    }
}
