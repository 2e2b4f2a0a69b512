//! TransportHandle - runs a transport behind an isolated queue and worker task

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{ContractError, Delivery, Transport};

use crate::metrics::{DeliveryResult, TransportMetrics};

/// Handle to a running transport worker
pub struct TransportHandle {
    /// Transport name
    name: String,
    /// Channel to send deliveries to worker (`None` once closed)
    tx: Mutex<Option<mpsc::Sender<Delivery>>>,
    /// Delivery counters shared with the worker
    metrics: Arc<TransportMetrics>,
    /// Worker task handle (`None` once handed out)
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TransportHandle {
    /// Create a new TransportHandle and spawn the worker task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T: Transport + Send + 'static>(transport: T, queue_capacity: usize) -> Self {
        let name = transport.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(TransportMetrics::new(&name));

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker = tokio::spawn(async move {
            transport_worker(transport, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx: Mutex::new(Some(tx)),
            metrics,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Get transport name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delivery counters for this transport
    pub fn metrics(&self) -> &Arc<TransportMetrics> {
        &self.metrics
    }

    /// Whether the worker still accepts deliveries
    pub fn is_open(&self) -> bool {
        lock(&self.tx).as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Queue a delivery (non-blocking)
    ///
    /// # Errors
    /// `QueueFull` when the delivery was dropped, `ConsumerClosed` when the
    /// worker is gone.
    pub fn try_send(&self, delivery: Delivery) -> Result<(), ContractError> {
        let guard = lock(&self.tx);
        let Some(tx) = guard.as_ref() else {
            return Err(ContractError::ConsumerClosed {
                consumer: self.name.clone(),
            });
        };

        match tx.try_send(delivery) {
            Ok(()) => {
                self.metrics
                    .set_pending(tx.max_capacity() - tx.capacity());
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(d)) => {
                self.metrics.record(DeliveryResult::Dropped);
                warn!(
                    transport = %self.name,
                    kind = d.kind(),
                    "Queue full, delivery dropped"
                );
                Err(ContractError::QueueFull {
                    consumer: self.name.clone(),
                    operation: d.kind(),
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(transport = %self.name, "Transport worker closed unexpectedly");
                Err(ContractError::ConsumerClosed {
                    consumer: self.name.clone(),
                })
            }
        }
    }

    /// Stop accepting deliveries and hand back the worker
    ///
    /// The worker drains what is already queued, then flushes and closes the
    /// transport. Returns `None` if already closed.
    pub fn close(&self) -> Option<JoinHandle<()>> {
        lock(&self.tx).take();
        lock(&self.worker).take()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Worker task that consumes deliveries and hands them to the transport
#[instrument(
    name = "transport_worker_loop",
    skip(transport, rx, metrics),
    fields(transport = %name)
)]
async fn transport_worker<T: Transport>(
    mut transport: T,
    mut rx: mpsc::Receiver<Delivery>,
    metrics: Arc<TransportMetrics>,
    name: String,
) {
    debug!(transport = %name, "Transport worker started");

    if let Err(e) = transport.open().await {
        // Not fatal: transports retry their setup on the next delivery
        error!(transport = %name, error = %e, "Open failed");
    }

    while let Some(delivery) = rx.recv().await {
        metrics.set_pending(rx.len());

        match transport.deliver(&delivery).await {
            Ok(()) => {
                metrics.record(DeliveryResult::Delivered);
            }
            Err(e) => {
                metrics.record(DeliveryResult::Failed);
                error!(
                    transport = %name,
                    kind = delivery.kind(),
                    error = %e,
                    "Delivery failed"
                );
            }
        }
    }

    if let Err(e) = transport.flush().await {
        error!(transport = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = transport.close().await {
        error!(transport = %name, error = %e, "Close failed on shutdown");
    }

    debug!(transport = %name, "Transport worker stopped");
}
