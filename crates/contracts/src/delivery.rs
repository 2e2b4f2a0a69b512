//! Delivery - unit of work handed to a queued transport

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Properties;

/// A call forwarded to a transport worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delivery {
    /// Announce the current user
    Identify {
        user_id: String,
        #[serde(default)]
        properties: Properties,
        at: DateTime<Utc>,
    },

    /// Record one event
    Track {
        event: String,
        properties: Properties,
        at: DateTime<Utc>,
    },
}

impl Delivery {
    pub fn identify(user_id: impl Into<String>, properties: Properties) -> Self {
        Self::Identify {
            user_id: user_id.into(),
            properties,
            at: Utc::now(),
        }
    }

    pub fn track(event: impl Into<String>, properties: Properties) -> Self {
        Self::Track {
            event: event.into(),
            properties,
            at: Utc::now(),
        }
    }

    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Identify { .. } => "identify",
            Self::Track { .. } => "track",
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::Identify { at, .. } | Self::Track { at, .. } => *at,
        }
    }
}

/// Counters of one consumer's background deliveries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub failed: u64,
    /// Calls dropped because the queue was full
    pub dropped: u64,
    /// Calls still queued when the snapshot was taken
    pub pending: usize,
}

impl DeliveryStats {
    /// Calls the consumer accepted or dropped
    pub fn total(&self) -> u64 {
        self.delivered + self.failed + self.dropped + self.pending as u64
    }
}
