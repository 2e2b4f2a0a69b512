//! SiddiBuilder - assembles a `Siddi` from an `EventBlueprint`

use std::sync::Arc;
use tracing::{info, instrument, warn};

use contracts::{
    Consumer, ConsumerConfig, ConsumerRule, ConsumerType, EventBlueprint, ReidentifyPolicy,
};

use crate::consumers::{
    AmplitudeTransport, FileTransport, LogConsumer, MatomoTransport, PostgresTransport,
    QueuedConsumer,
};
use crate::error::DispatcherError;
use crate::registry::ConsumerRegistry;
use crate::siddi::Siddi;

/// Builder for creating a Siddi
#[derive(Default)]
pub struct SiddiBuilder {
    rules: Vec<ConsumerRule>,
    configs: Vec<ConsumerConfig>,
    consumers: Vec<Arc<dyn Consumer>>,
    policy: ReidentifyPolicy,
}

impl SiddiBuilder {
    /// Create an empty SiddiBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded blueprint
    pub fn from_blueprint(blueprint: &EventBlueprint) -> Self {
        Self {
            rules: blueprint.rules.clone(),
            configs: blueprint.consumers.clone(),
            consumers: Vec::new(),
            policy: blueprint.dispatch.reidentify,
        }
    }

    pub fn rule(mut self, rule: ConsumerRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = ConsumerRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Add a consumer to be created from configuration
    pub fn consumer_config(mut self, config: ConsumerConfig) -> Self {
        self.configs.push(config);
        self
    }

    /// Add an already constructed consumer
    ///
    /// Registered after configured consumers, replacing any with the same name.
    pub fn consumer(mut self, consumer: Arc<dyn Consumer>) -> Self {
        self.consumers.push(consumer);
        self
    }

    pub fn policy(mut self, policy: ReidentifyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Create every consumer and start the engine
    ///
    /// # Errors
    /// Fails if a consumer's params are malformed, or if a queued consumer is
    /// configured outside a tokio runtime.
    #[instrument(
        name = "siddi_builder_build",
        skip(self),
        fields(consumers = self.configs.len() + self.consumers.len(), rules = self.rules.len())
    )]
    pub fn build(self) -> Result<Siddi, DispatcherError> {
        let mut registry = ConsumerRegistry::new();
        for config in &self.configs {
            registry.register(create_consumer(config)?);
        }
        for consumer in self.consumers {
            registry.register(consumer);
        }

        for rule in &self.rules {
            if !registry.contains(&rule.name) {
                warn!(rule = %rule.name, "Rule names an unregistered consumer, it will be skipped");
            }
        }

        Ok(Siddi::with_policy(self.rules, registry, self.policy))
    }
}

/// Create a consumer from configuration
#[instrument(
    name = "siddi_create_consumer",
    skip(config),
    fields(consumer = %config.name, consumer_type = ?config.consumer_type)
)]
pub fn create_consumer(config: &ConsumerConfig) -> Result<Arc<dyn Consumer>, DispatcherError> {
    if config.consumer_type.is_queued() && tokio::runtime::Handle::try_current().is_err() {
        return Err(DispatcherError::NoRuntime {
            name: config.name.clone(),
        });
    }

    let consumer: Arc<dyn Consumer> = match config.consumer_type {
        ConsumerType::Log => Arc::new(LogConsumer::new(&config.name)),
        ConsumerType::File => {
            let transport = FileTransport::from_params(&config.name, &config.params);
            Arc::new(QueuedConsumer::spawn(transport, config.queue_capacity))
        }
        ConsumerType::Amplitude => {
            let transport = AmplitudeTransport::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::consumer_creation(&config.name, e.to_string()))?;
            Arc::new(QueuedConsumer::spawn(transport, config.queue_capacity))
        }
        ConsumerType::Matomo => {
            let transport = MatomoTransport::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::consumer_creation(&config.name, e.to_string()))?;
            Arc::new(QueuedConsumer::spawn(transport, config.queue_capacity))
        }
        ConsumerType::Postgres => {
            let transport = PostgresTransport::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::consumer_creation(&config.name, e.to_string()))?;
            Arc::new(QueuedConsumer::spawn(transport, config.queue_capacity))
        }
    };

    info!(consumer = %config.name, "Consumer created");
    Ok(consumer)
}

/// Convenience function to create a Siddi from a blueprint
pub fn create_siddi(blueprint: &EventBlueprint) -> Result<Siddi, DispatcherError> {
    SiddiBuilder::from_blueprint(blueprint).build()
}
