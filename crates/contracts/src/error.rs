//! Layered error definitions
//!
//! Categorized by source: config / consumer / transport

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Consumer Errors =====
    /// Consumer setup error
    #[error("consumer '{consumer}' init error: {message}")]
    ConsumerInit { consumer: String, message: String },

    /// Consumer rejected an identify/track call
    #[error("consumer '{consumer}' {operation} error: {message}")]
    ConsumerCall {
        consumer: String,
        operation: &'static str,
        message: String,
    },

    /// Consumer queue is full, call dropped
    #[error("consumer '{consumer}' queue full, {operation} dropped")]
    QueueFull {
        consumer: String,
        operation: &'static str,
    },

    /// Consumer worker has stopped
    #[error("consumer '{consumer}' is closed")]
    ConsumerClosed { consumer: String },

    // ===== Transport Errors =====
    /// Transport delivery error
    #[error("transport '{transport}' delivery error: {message}")]
    Delivery { transport: String, message: String },

    /// Transport connection error
    #[error("transport '{transport}' connection error: {message}")]
    TransportConnection { transport: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create consumer init error
    pub fn consumer_init(consumer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConsumerInit {
            consumer: consumer.into(),
            message: message.into(),
        }
    }

    /// Create consumer call error
    pub fn consumer_call(
        consumer: impl Into<String>,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::ConsumerCall {
            consumer: consumer.into(),
            operation,
            message: message.into(),
        }
    }

    /// Create transport delivery error
    pub fn delivery(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Create transport connection error
    pub fn transport_connection(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportConnection {
            transport: transport.into(),
            message: message.into(),
        }
    }
}
