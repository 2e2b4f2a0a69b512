//! Consumer / Transport traits - dispatcher output interface
//!
//! `Consumer` is what the dispatch engine drives: a synchronous, non-blocking
//! contract. Vendors that talk to the network implement `Transport` instead
//! and are wrapped in a queue so the engine never waits on them.

use tokio::task::JoinHandle;

use crate::{ContractError, Delivery, DeliveryStats, Properties};

/// Event consumer driven by the dispatch engine
///
/// Calls must not block: anything slow is handed off to a background task.
pub trait Consumer: Send + Sync {
    /// Consumer name (used for logging/metrics)
    fn name(&self) -> &str;

    /// One-time setup, invoked once at engine construction
    fn init(&self) -> Result<(), ContractError> {
        Ok(())
    }

    /// Liveness probe
    ///
    /// Returns false when the consumer is not configured or cannot accept
    /// events right now. Must not fail.
    fn test(&self) -> bool;

    /// Announce a user
    ///
    /// # Errors
    /// Returns error if the call could not be handed off
    fn identify(&self, user_id: &str, properties: &Properties) -> Result<(), ContractError>;

    /// Record an event
    ///
    /// # Errors
    /// Returns error if the call could not be handed off
    fn track(&self, event_name: &str, properties: &Properties) -> Result<(), ContractError>;

    /// Stop accepting calls
    ///
    /// Returns the background worker, if any, so callers can wait for the
    /// backlog to drain.
    fn close(&self) -> Option<JoinHandle<()>> {
        None
    }

    /// Background delivery counters, for consumers that queue their calls
    fn delivery_stats(&self) -> Option<DeliveryStats> {
        None
    }
}

/// Asynchronous delivery backend behind a queued consumer
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Transport name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Whether enough configuration is present to deliver anything
    fn is_configured(&self) -> bool {
        true
    }

    /// Prepare connections or schema before the first delivery
    async fn open(&mut self) -> Result<(), ContractError>;

    /// Deliver one identify/track call
    ///
    /// # Errors
    /// Returns delivery error (should include context)
    async fn deliver(&mut self, delivery: &Delivery) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close transport
    async fn close(&mut self) -> Result<(), ContractError>;
}
