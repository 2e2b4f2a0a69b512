//! LogConsumer - logs identify/track calls via tracing

use contracts::{Consumer, ContractError, Properties};
use tracing::info;

/// Consumer that logs calls for debugging
pub struct LogConsumer {
    name: String,
}

impl LogConsumer {
    /// Create a new LogConsumer with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Consumer for LogConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn test(&self) -> bool {
        true
    }

    fn identify(&self, user_id: &str, properties: &Properties) -> Result<(), ContractError> {
        info!(
            consumer = %self.name,
            user_id = %user_id,
            properties = properties.len(),
            "User identified"
        );
        Ok(())
    }

    fn track(&self, event_name: &str, properties: &Properties) -> Result<(), ContractError> {
        let keys: Vec<&str> = properties.keys().map(String::as_str).collect();
        info!(
            consumer = %self.name,
            event = %event_name,
            properties = ?keys,
            "Event tracked"
        );
        Ok(())
    }
}
