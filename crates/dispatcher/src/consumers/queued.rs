//! QueuedConsumer - adapts an async `Transport` to the non-blocking `Consumer` contract

use tokio::task::JoinHandle;
use tracing::{info, warn};

use contracts::{Consumer, ContractError, Delivery, DeliveryStats, Properties, Transport};

use crate::handle::TransportHandle;

/// Consumer whose calls are queued and delivered by a background worker
///
/// `identify`/`track` return as soon as the call is queued. A transport
/// lacking configuration gets no worker and reports itself as not live.
pub struct QueuedConsumer {
    name: String,
    handle: Option<TransportHandle>,
}

impl QueuedConsumer {
    /// Wrap `transport`, spawning its worker if it is configured
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T: Transport + Send + 'static>(transport: T, queue_capacity: usize) -> Self {
        let name = transport.name().to_string();

        let handle = if transport.is_configured() {
            info!(consumer = %name, queue_capacity, "Queued consumer started");
            Some(TransportHandle::spawn(transport, queue_capacity))
        } else {
            warn!(consumer = %name, "Consumer not configured, it will stay disabled");
            None
        };

        Self { name, handle }
    }

    fn send(&self, delivery: Delivery) -> Result<(), ContractError> {
        match &self.handle {
            Some(handle) => handle.try_send(delivery),
            None => Err(ContractError::ConsumerClosed {
                consumer: self.name.clone(),
            }),
        }
    }
}

impl Consumer for QueuedConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn test(&self) -> bool {
        self.handle.as_ref().is_some_and(TransportHandle::is_open)
    }

    fn identify(&self, user_id: &str, properties: &Properties) -> Result<(), ContractError> {
        self.send(Delivery::identify(user_id, properties.clone()))
    }

    fn track(&self, event_name: &str, properties: &Properties) -> Result<(), ContractError> {
        self.send(Delivery::track(event_name, properties.clone()))
    }

    fn close(&self) -> Option<JoinHandle<()>> {
        self.handle.as_ref().and_then(TransportHandle::close)
    }

    fn delivery_stats(&self) -> Option<DeliveryStats> {
        self.handle.as_ref().map(|h| h.metrics().stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingTransport {
        configured: bool,
        seen: Arc<Mutex<Vec<Delivery>>>,
    }

    impl Transport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn open(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn deliver(&mut self, delivery: &Delivery) -> Result<(), ContractError> {
            self.seen.lock().unwrap().push(delivery.clone());
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_calls_reach_transport_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let consumer = QueuedConsumer::spawn(
            RecordingTransport {
                configured: true,
                seen: Arc::clone(&seen),
            },
            8,
        );

        assert!(consumer.test());
        consumer.identify("u1", &Properties::new()).unwrap();
        consumer.track("app.login", &Properties::new()).unwrap();

        consumer.close().unwrap().await.unwrap();
        assert_eq!(
            consumer.delivery_stats(),
            Some(DeliveryStats {
                delivered: 2,
                ..Default::default()
            })
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind(), "identify");
        assert_eq!(seen[1].kind(), "track");
        assert!(!consumer.test());
    }

    #[tokio::test]
    async fn test_unconfigured_transport_is_not_live() {
        let consumer = QueuedConsumer::spawn(
            RecordingTransport {
                configured: false,
                seen: Arc::new(Mutex::new(Vec::new())),
            },
            8,
        );

        assert!(!consumer.test());
        assert!(consumer.delivery_stats().is_none());
        assert!(consumer.track("app.login", &Properties::new()).is_err());
        assert!(consumer.close().is_none());
    }
}
