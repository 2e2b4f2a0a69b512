//! Siddi - the dispatch engine
//!
//! Forwards `identify`/`track` calls to every consumer a rule lets through,
//! probing liveness lazily and pushing the current user to each consumer the
//! first time it is about to receive an event.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{
    Consumer, ConsumerRule, CurrentUser, DeliveryStats, Properties, ReidentifyPolicy,
};
use observability::{
    record_consumer_outcome, record_consumer_probe, record_event_tracked, record_identify_pushed,
};
use tracing::{debug, error, info, instrument, warn};

use crate::filter::{should_track, strip_denied_parameters};
use crate::registry::ConsumerRegistry;

/// What happened to one event for one configured rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Rule names a consumer missing from the registry
    Unregistered,
    /// Rule filtered the event out
    Filtered,
    /// Consumer failed its liveness probe
    Disabled,
    /// Handed to the consumer
    Sent,
    /// Consumer rejected the event
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::Filtered => "filtered",
            Self::Disabled => "disabled",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-rule outcomes of one `track` call, in rule order
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<(String, Outcome)>,
}

impl DispatchReport {
    /// Consumers that were handed the event
    pub fn sent_to(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == Outcome::Sent)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }

    pub fn outcome_of(&self, consumer: &str) -> Option<Outcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == consumer)
            .map(|(_, o)| *o)
    }
}

/// Liveness / identification status of one consumer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ConsumerStatus {
    enabled: bool,
    /// User id this consumer was identified with
    identified_as: Option<String>,
}

impl ConsumerStatus {
    fn needs_identify(&self, user: &CurrentUser, policy: ReidentifyPolicy) -> bool {
        if !self.enabled || !user.is_identified() {
            return false;
        }
        match policy {
            ReidentifyPolicy::Never => self.identified_as.is_none(),
            ReidentifyPolicy::OnUserChange => self.identified_as.as_deref() != Some(&user.id),
        }
    }
}

#[derive(Debug, Default)]
struct DispatchState {
    user: CurrentUser,
    status: HashMap<String, ConsumerStatus>,
}

/// Event dispatch engine
///
/// Safe to share between tasks: all mutable state sits behind one mutex held
/// for the duration of a single `identify`/`track` call. Consumer calls are
/// non-blocking hand-offs, so `track` returns before any delivery completes.
pub struct Siddi {
    rules: Vec<ConsumerRule>,
    registry: ConsumerRegistry,
    policy: ReidentifyPolicy,
    state: Mutex<DispatchState>,
}

impl Siddi {
    /// Create the engine and run every consumer's `init` in registry order
    pub fn new(rules: Vec<ConsumerRule>, registry: ConsumerRegistry) -> Self {
        Self::with_policy(rules, registry, ReidentifyPolicy::default())
    }

    /// Create the engine with an explicit re-identification policy
    pub fn with_policy(
        rules: Vec<ConsumerRule>,
        registry: ConsumerRegistry,
        policy: ReidentifyPolicy,
    ) -> Self {
        for consumer in registry.iter() {
            if let Err(e) = consumer.init() {
                error!(consumer = %consumer.name(), error = %e, "Consumer init failed");
            }
        }

        info!(
            rules = rules.len(),
            consumers = registry.len(),
            policy = ?policy,
            "Siddi initialized"
        );

        Self {
            rules,
            registry,
            policy,
            state: Mutex::new(DispatchState::default()),
        }
    }

    pub fn rules(&self) -> &[ConsumerRule] {
        &self.rules
    }

    pub fn registry(&self) -> &ConsumerRegistry {
        &self.registry
    }

    pub fn policy(&self) -> ReidentifyPolicy {
        self.policy
    }

    /// Snapshot of the current user
    pub fn current_user(&self) -> CurrentUser {
        self.state().user.clone()
    }

    /// Replace the current user
    ///
    /// Consumers learn about the user lazily, on their next event.
    pub fn identify(&self, user_id: impl Into<String>, properties: Option<Properties>) {
        let user = CurrentUser::new(user_id, properties);
        debug!(user_id = %user.id, "User recorded");
        self.state().user = user;
    }

    /// Forward an event to every consumer whose rule lets it through
    ///
    /// Never fails: per-consumer problems are logged and reported in the
    /// returned [`DispatchReport`].
    pub fn track(&self, event_name: &str, properties: &Properties) -> DispatchReport {
        record_event_tracked();

        let mut state = self.state();
        let mut report = DispatchReport {
            outcomes: Vec::with_capacity(self.rules.len()),
        };

        for rule in &self.rules {
            let outcome = match self.registry.get(&rule.name) {
                Some(consumer) => {
                    self.dispatch_to(&mut state, rule, consumer.as_ref(), event_name, properties)
                }
                None => {
                    debug!(consumer = %rule.name, "No such consumer registered, skipping");
                    Outcome::Unregistered
                }
            };

            record_consumer_outcome(&rule.name, outcome.as_str());
            report.outcomes.push((rule.name.clone(), outcome));
        }

        report
    }

    fn dispatch_to(
        &self,
        state: &mut DispatchState,
        rule: &ConsumerRule,
        consumer: &dyn Consumer,
        event_name: &str,
        properties: &Properties,
    ) -> Outcome {
        if !should_track(rule, event_name) {
            debug!(consumer = %rule.name, event = %event_name, "Event filtered");
            return Outcome::Filtered;
        }

        let DispatchState { user, status } = state;
        let status = Self::refresh_status(status, &rule.name, consumer);

        if !status.enabled {
            debug!(consumer = %rule.name, event = %event_name, "Consumer disabled, event dropped");
            return Outcome::Disabled;
        }

        let properties = strip_denied_parameters(rule, event_name, properties);

        if status.needs_identify(user, self.policy) {
            match consumer.identify(&user.id, &user.properties) {
                Ok(()) => {
                    debug!(consumer = %rule.name, user_id = %user.id, "User identified");
                    record_identify_pushed(&rule.name);
                    status.identified_as = Some(user.id.clone());
                }
                Err(e) => {
                    warn!(
                        consumer = %rule.name,
                        user_id = %user.id,
                        error = %e,
                        "Identify failed, will retry on next event"
                    );
                }
            }
        }

        match consumer.track(event_name, &properties) {
            Ok(()) => Outcome::Sent,
            Err(e) => {
                error!(consumer = %rule.name, event = %event_name, error = %e, "Track failed");
                Outcome::Failed
            }
        }
    }

    /// Create or update the status entry, probing liveness when needed
    ///
    /// New entries are probed once; disabled ones are re-probed on every
    /// relevant event; enabled ones are never probed again.
    fn refresh_status<'a>(
        status: &'a mut HashMap<String, ConsumerStatus>,
        name: &str,
        consumer: &dyn Consumer,
    ) -> &'a mut ConsumerStatus {
        match status.entry(name.to_string()) {
            Entry::Vacant(slot) => {
                let live = Self::probe(name, consumer);
                info!(consumer = %name, live, "Consumer status created");
                slot.insert(ConsumerStatus {
                    enabled: live,
                    identified_as: None,
                })
            }
            Entry::Occupied(slot) => {
                let entry = slot.into_mut();
                if !entry.enabled && Self::probe(name, consumer) {
                    info!(consumer = %name, "Consumer became live");
                    entry.enabled = true;
                }
                entry
            }
        }
    }

    fn probe(name: &str, consumer: &dyn Consumer) -> bool {
        let live = consumer.test();
        record_consumer_probe(name, live);
        live
    }

    /// Delivery counters of every queued consumer, in registry order
    pub fn delivery_stats(&self) -> Vec<(String, DeliveryStats)> {
        self.registry
            .iter()
            .filter_map(|c| c.delivery_stats().map(|stats| (c.name().to_string(), stats)))
            .collect()
    }

    /// Close every consumer and wait for queued deliveries to drain
    #[instrument(name = "siddi_shutdown", skip(self))]
    pub async fn shutdown(&self) {
        for consumer in self.registry.iter() {
            if let Some(worker) = consumer.close() {
                if let Err(e) = worker.await {
                    error!(consumer = %consumer.name(), error = ?e, "Consumer worker panicked");
                }
            }
        }
        info!("Siddi shutdown complete");
    }

    fn state(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Siddi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Siddi")
            .field("rules", &self.rules)
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumers::{MockCall, MockConsumer};
    use contracts::PropertyValue;
    use std::sync::Arc;

    fn props(pairs: &[(&str, PropertyValue)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn setup(rules: Vec<ConsumerRule>, mocks: &[Arc<MockConsumer>]) -> Siddi {
        let mut registry = ConsumerRegistry::new();
        for mock in mocks {
            registry.register(mock.clone());
        }
        Siddi::new(rules, registry)
    }

    #[test]
    fn test_identify_records_user() {
        let siddi = setup(vec![], &[]);
        let user_props = props(&[("name", "Upali".into())]);
        siddi.identify("user-id", Some(user_props.clone()));

        assert_eq!(
            siddi.current_user(),
            CurrentUser::new("user-id", Some(user_props))
        );
    }

    #[test]
    fn test_init_runs_once_per_consumer() {
        let a = Arc::new(MockConsumer::new("a"));
        let b = Arc::new(MockConsumer::new("b"));
        let siddi = setup(vec![ConsumerRule::new("a")], &[a.clone(), b.clone()]);

        siddi.track("app.x", &Properties::new());
        siddi.track("app.y", &Properties::new());

        assert_eq!(a.init_count(), 1);
        assert_eq!(b.init_count(), 1);
        assert_eq!(a.calls()[0], MockCall::Init);
    }

    #[test]
    fn test_missing_user_properties_reach_consumer_as_empty_map() {
        let mock = Arc::new(MockConsumer::new("mock"));
        let siddi = setup(vec![ConsumerRule::new("mock")], &[mock.clone()]);

        siddi.identify("u1", None);
        siddi.track("app.login", &Properties::new());

        assert!(siddi.current_user().properties.is_empty());
        assert_eq!(mock.identified(), vec![("u1".to_string(), Properties::new())]);
        assert!(siddi.delivery_stats().is_empty());
    }

    #[test]
    fn test_identify_then_track() {
        let mixpanel = Arc::new(MockConsumer::new("mixpanel"));
        let siddi = setup(vec![ConsumerRule::new("mixpanel")], &[mixpanel.clone()]);

        let user_props = props(&[("plan", "x".into())]);
        let event_props = props(&[("ok", true.into())]);
        siddi.identify("u1", Some(user_props.clone()));
        let report = siddi.track("app.login", &event_props);

        assert_eq!(report.sent_to(), vec!["mixpanel"]);
        assert_eq!(
            mixpanel.calls(),
            vec![
                MockCall::Init,
                MockCall::Test,
                MockCall::Identify {
                    user_id: "u1".into(),
                    properties: user_props,
                },
                MockCall::Track {
                    event: "app.login".into(),
                    properties: event_props,
                },
            ]
        );
    }

    #[test]
    fn test_no_identify_without_user() {
        let mock = Arc::new(MockConsumer::new("mock"));
        let siddi = setup(vec![ConsumerRule::new("mock")], &[mock.clone()]);

        siddi.track("app.open", &Properties::new());
        siddi.identify("", None);
        siddi.track("app.open", &Properties::new());

        assert!(mock.identified().is_empty());
        assert_eq!(mock.tracked().len(), 2);
    }

    #[test]
    fn test_last_identify_wins_before_first_track() {
        let mock = Arc::new(MockConsumer::new("mock"));
        let siddi = setup(vec![ConsumerRule::new("mock")], &[mock.clone()]);

        siddi.identify("u1", Some(props(&[("plan", "free".into())])));
        siddi.identify("u1", Some(props(&[("plan", "pro".into())])));
        siddi.track("app.login", &Properties::new());

        assert_eq!(
            mock.identified(),
            vec![("u1".to_string(), props(&[("plan", "pro".into())]))]
        );
    }

    #[test]
    fn test_identified_consumer_is_not_identified_again() {
        let mock = Arc::new(MockConsumer::new("mock"));
        let siddi = setup(vec![ConsumerRule::new("mock")], &[mock.clone()]);

        siddi.identify("u1", None);
        siddi.track("app.a", &Properties::new());
        siddi.identify("u2", None);
        siddi.track("app.b", &Properties::new());

        assert_eq!(mock.identified(), vec![("u1".to_string(), Properties::new())]);
        assert_eq!(mock.tracked().len(), 2);
    }

    #[test]
    fn test_on_user_change_reidentifies() {
        let mock = Arc::new(MockConsumer::new("mock"));
        let registry = ConsumerRegistry::new().with(mock.clone());
        let siddi = Siddi::with_policy(
            vec![ConsumerRule::new("mock")],
            registry,
            ReidentifyPolicy::OnUserChange,
        );

        siddi.identify("u1", None);
        siddi.track("app.a", &Properties::new());
        siddi.track("app.b", &Properties::new());
        siddi.identify("u2", None);
        siddi.track("app.c", &Properties::new());

        let ids: Vec<_> = mock.identified().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["u1", "u2"]);
    }

    #[test]
    fn test_enabled_consumer_is_not_probed_again() {
        let mock = Arc::new(MockConsumer::new("mock"));
        let siddi = setup(vec![ConsumerRule::new("mock")], &[mock.clone()]);

        for _ in 0..3 {
            siddi.track("app.tick", &Properties::new());
        }

        assert_eq!(mock.test_count(), 1);
        assert_eq!(mock.tracked().len(), 3);
    }

    #[test]
    fn test_disabled_consumer_is_probed_once_per_track() {
        let mock = Arc::new(MockConsumer::offline("mock"));
        let siddi = setup(vec![ConsumerRule::new("mock")], &[mock.clone()]);

        for _ in 0..3 {
            let report = siddi.track("app.tick", &Properties::new());
            assert_eq!(report.outcome_of("mock"), Some(Outcome::Disabled));
        }

        assert_eq!(mock.test_count(), 3);
        assert!(mock.tracked().is_empty());
    }

    #[test]
    fn test_consumer_coming_online_starts_receiving() {
        let mock = Arc::new(MockConsumer::offline("mock"));
        let siddi = setup(vec![ConsumerRule::new("mock")], &[mock.clone()]);
        siddi.identify("u1", None);

        siddi.track("app.first", &Properties::new());
        assert!(mock.tracked().is_empty());
        assert!(mock.identified().is_empty());

        mock.set_live(true);
        siddi.track("app.second", &Properties::new());

        assert_eq!(mock.identified(), vec![("u1".to_string(), Properties::new())]);
        let events: Vec<_> = mock.tracked().into_iter().map(|(e, _)| e).collect();
        assert_eq!(events, vec!["app.second"]);
    }

    #[test]
    fn test_denied_consumer_is_never_touched() {
        let mixpanel = Arc::new(MockConsumer::new("mixpanel"));
        let siddi = setup(
            vec![ConsumerRule::new("mixpanel").with_deny(["*"])],
            &[mixpanel.clone()],
        );

        siddi.identify("u1", None);
        let report = siddi.track("app.login", &Properties::new());

        assert_eq!(report.outcome_of("mixpanel"), Some(Outcome::Filtered));
        assert_eq!(mixpanel.calls(), vec![MockCall::Init]);
    }

    #[test]
    fn test_only_live_consumers_receive() {
        let a = Arc::new(MockConsumer::offline("a"));
        let b = Arc::new(MockConsumer::new("b"));
        let siddi = setup(
            vec![ConsumerRule::new("a"), ConsumerRule::new("b")],
            &[a.clone(), b.clone()],
        );

        let report = siddi.track("app.login", &Properties::new());

        assert_eq!(report.sent_to(), vec!["b"]);
        assert!(a.tracked().is_empty());
        assert_eq!(b.tracked().len(), 1);
    }

    #[test]
    fn test_nothing_sent_when_all_inactive() {
        let a = Arc::new(MockConsumer::offline("a"));
        let b = Arc::new(MockConsumer::offline("b"));
        let siddi = setup(
            vec![ConsumerRule::new("a"), ConsumerRule::new("b")],
            &[a.clone(), b.clone()],
        );

        let report = siddi.track("app.login", &Properties::new());

        assert!(report.sent_to().is_empty());
        assert_eq!(report.count(Outcome::Disabled), 2);
    }

    #[test]
    fn test_unknown_rule_is_skipped() {
        let b = Arc::new(MockConsumer::new("b"));
        let siddi = setup(
            vec![ConsumerRule::new("ghost"), ConsumerRule::new("b")],
            &[b.clone()],
        );

        let report = siddi.track("app.login", &Properties::new());

        assert_eq!(report.outcome_of("ghost"), Some(Outcome::Unregistered));
        assert_eq!(report.sent_to(), vec!["b"]);
    }

    #[test]
    fn test_unreferenced_consumer_gets_no_events() {
        let a = Arc::new(MockConsumer::new("a"));
        let b = Arc::new(MockConsumer::new("b"));
        let siddi = setup(vec![ConsumerRule::new("a")], &[a.clone(), b.clone()]);

        siddi.track("app.login", &Properties::new());

        assert_eq!(b.calls(), vec![MockCall::Init]);
    }

    #[test]
    fn test_deny_parameters_scoped_to_consumer_and_event() {
        let ga = Arc::new(MockConsumer::new("ga"));
        let heap = Arc::new(MockConsumer::new("heap"));
        let siddi = setup(
            vec![
                ConsumerRule::new("ga").with_deny_parameters("app.login", ["email"]),
                ConsumerRule::new("heap"),
            ],
            &[ga.clone(), heap.clone()],
        );

        let event_props = props(&[("email", "a@b.c".into()), ("ok", true.into())]);
        siddi.track("app.login", &event_props);
        siddi.track("app.logout", &event_props);

        let ga_events = ga.tracked();
        assert!(!ga_events[0].1.contains_key("email"));
        assert!(ga_events[0].1.contains_key("ok"));
        assert!(ga_events[1].1.contains_key("email"));

        for (_, received) in heap.tracked() {
            assert_eq!(received, event_props);
        }
        assert!(event_props.contains_key("email"));
    }

    #[test]
    fn test_failing_consumer_does_not_block_others() {
        let broken = Arc::new(MockConsumer::new("broken"));
        broken.set_failing(true);
        let healthy = Arc::new(MockConsumer::new("healthy"));
        let siddi = setup(
            vec![ConsumerRule::new("broken"), ConsumerRule::new("healthy")],
            &[broken.clone(), healthy.clone()],
        );
        siddi.identify("u1", None);

        let report = siddi.track("app.login", &Properties::new());

        assert_eq!(report.outcome_of("broken"), Some(Outcome::Failed));
        assert_eq!(report.outcome_of("healthy"), Some(Outcome::Sent));
        assert_eq!(healthy.identified().len(), 1);
    }

    #[test]
    fn test_failed_identify_is_retried() {
        let mock = Arc::new(MockConsumer::new("mock"));
        let siddi = setup(vec![ConsumerRule::new("mock")], &[mock.clone()]);
        siddi.identify("u1", None);

        mock.set_failing(true);
        siddi.track("app.a", &Properties::new());
        mock.set_failing(false);
        siddi.track("app.b", &Properties::new());
        siddi.track("app.c", &Properties::new());

        assert_eq!(mock.identified(), vec![("u1".to_string(), Properties::new())]);
    }

    #[test]
    fn test_filtered_event_creates_no_status() {
        let mock = Arc::new(MockConsumer::offline("mock"));
        let siddi = setup(
            vec![ConsumerRule::new("mock").with_allow(["app."])],
            &[mock.clone()],
        );

        siddi.track("site.visit", &Properties::new());
        assert_eq!(mock.test_count(), 0);
        assert!(siddi.state().status.is_empty());

        siddi.track("app.visit", &Properties::new());
        assert_eq!(mock.test_count(), 1);
        assert_eq!(
            siddi.state().status.get("mock"),
            Some(&ConsumerStatus {
                enabled: false,
                identified_as: None,
            })
        );
    }

    #[tokio::test]
    async fn test_shared_across_tasks() {
        let mock = Arc::new(MockConsumer::new("mock"));
        let siddi = Arc::new(setup(vec![ConsumerRule::new("mock")], &[mock.clone()]));
        siddi.identify("u1", None);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let siddi = Arc::clone(&siddi);
                tokio::spawn(async move {
                    siddi.track(&format!("app.event.{i}"), &Properties::new());
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(mock.test_count(), 1);
        assert_eq!(mock.identified().len(), 1);
        assert_eq!(mock.tracked().len(), 8);
    }
}
