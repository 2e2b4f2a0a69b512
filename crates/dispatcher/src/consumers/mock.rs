//! MockConsumer - in-memory consumer for tests and demos
//!
//! Records every call and lets the caller flip liveness and failure at will.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use contracts::{Consumer, ContractError, Properties};

/// A call observed by [`MockConsumer`]
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Init,
    Test,
    Identify {
        user_id: String,
        properties: Properties,
    },
    Track {
        event: String,
        properties: Properties,
    },
}

/// Consumer that records calls instead of sending them anywhere
pub struct MockConsumer {
    name: String,
    live: AtomicBool,
    failing: AtomicBool,
    calls: Mutex<Vec<MockCall>>,
}

impl MockConsumer {
    /// Create a live mock consumer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            live: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock consumer whose probe fails
    pub fn offline(name: impl Into<String>) -> Self {
        let mock = Self::new(name);
        mock.set_live(false);
        mock
    }

    /// Set the value returned by `test`
    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::SeqCst);
    }

    /// Make `identify` and `track` return errors
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All recorded calls, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().clone()
    }

    pub fn test_count(&self) -> usize {
        self.count(|c| matches!(c, MockCall::Test))
    }

    pub fn init_count(&self) -> usize {
        self.count(|c| matches!(c, MockCall::Init))
    }

    /// Recorded identify calls as `(user_id, properties)`
    pub fn identified(&self) -> Vec<(String, Properties)> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                MockCall::Identify {
                    user_id,
                    properties,
                } => Some((user_id.clone(), properties.clone())),
                _ => None,
            })
            .collect()
    }

    /// Recorded track calls as `(event, properties)`
    pub fn tracked(&self) -> Vec<(String, Properties)> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                MockCall::Track { event, properties } => Some((event.clone(), properties.clone())),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.lock().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: MockCall) {
        self.lock().push(call);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<MockCall>> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check_failing(&self, operation: &'static str) -> Result<(), ContractError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ContractError::consumer_call(
                &self.name,
                operation,
                "mock failure",
            ));
        }
        Ok(())
    }
}

impl Consumer for MockConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self) -> Result<(), ContractError> {
        self.record(MockCall::Init);
        Ok(())
    }

    fn test(&self) -> bool {
        self.record(MockCall::Test);
        self.live.load(Ordering::SeqCst)
    }

    fn identify(&self, user_id: &str, properties: &Properties) -> Result<(), ContractError> {
        self.check_failing("identify")?;
        self.record(MockCall::Identify {
            user_id: user_id.to_string(),
            properties: properties.clone(),
        });
        Ok(())
    }

    fn track(&self, event_name: &str, properties: &Properties) -> Result<(), ContractError> {
        self.check_failing("track")?;
        self.record(MockCall::Track {
            event: event_name.to_string(),
            properties: properties.clone(),
        });
        Ok(())
    }
}
