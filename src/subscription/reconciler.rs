//! Set-diff reconciliation between the resolved topic set and the broker.
//!
//! Two states: `Idle` (no transport session, active set empty) and `Synced`
//! (connected, active set mirrors the calls issued so far). On every change of
//! the resolved set while `Synced`, the reconciler issues unsubscribes for
//! topics that fell out of the set before subscribes for topics that entered
//! it. The other way around would leave a window where a freshly-irrelevant
//! device's topic still delivers into a newly-relevant view.
//!
//! Bookkeeping is optimistic: a failed transport call is logged and the active
//! set is not rolled back. Worst case is a stale subscription indicator, never
//! a wedged pipeline.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::BrokerTransport;
use crate::topics::resolver::ResolvedTopicSet;
use crate::topics::QualityLevel;

/// Session state of the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcilerState {
    /// No transport session; nothing is subscribed.
    #[default]
    Idle,
    /// Transport connected; the active set mirrors the issued calls.
    Synced,
}

/// Owns the record of what this client believes is subscribed at the broker.
///
/// The active set is mutated only here, in lock-step with the calls issued
/// through the transport collaborator.
#[derive(Debug, Default)]
pub struct SubscriptionReconciler {
    state: ReconcilerState,
    active: BTreeMap<String, QualityLevel>,
}

impl SubscriptionReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReconcilerState {
        self.state
    }

    /// Snapshot of the active topic set, for "subscribed" indicators.
    pub fn active_topics(&self) -> BTreeSet<String> {
        self.active.keys().cloned().collect()
    }

    pub fn is_active(&self, topic: &str) -> bool {
        self.active.contains_key(topic)
    }

    /// Transport session established: start from a clean slate and subscribe
    /// to everything currently resolvable.
    pub fn on_connected(
        &mut self,
        desired: &ResolvedTopicSet,
        transport: &mut dyn BrokerTransport,
    ) {
        self.state = ReconcilerState::Synced;
        self.active.clear();
        self.reconcile(desired, transport);
    }

    /// Transport session lost: the broker already dropped the server-side
    /// subscription state, so clear bookkeeping without issuing unsubscribes.
    pub fn on_disconnected(&mut self) {
        self.state = ReconcilerState::Idle;
        self.active.clear();
    }

    /// Moves the active set to `desired` with the minimal call pair.
    ///
    /// Unsubscribes are issued before subscribes. Reconciling an unchanged set
    /// issues zero transport calls. While `Idle` this is a no-op; the pending
    /// set is picked up by [`Self::on_connected`].
    pub fn reconcile(&mut self, desired: &ResolvedTopicSet, transport: &mut dyn BrokerTransport) {
        if self.state == ReconcilerState::Idle {
            debug!("not connected, skipping reconciliation");
            return;
        }

        let to_unsubscribe: Vec<String> = self
            .active
            .keys()
            .filter(|topic| !desired.contains(topic))
            .cloned()
            .collect();
        let to_subscribe: Vec<_> = desired
            .entries()
            .filter(|resolved| !self.active.contains_key(&resolved.topic))
            .collect();

        if to_unsubscribe.is_empty() && to_subscribe.is_empty() {
            return;
        }

        for topic in &to_unsubscribe {
            if let Err(e) = transport.unsubscribe(topic) {
                warn!("{}", e);
            }
        }
        for resolved in &to_subscribe {
            if let Err(e) = transport.subscribe(&resolved.topic, resolved.qos) {
                warn!("{}", e);
            }
        }
        debug!(
            unsubscribed = to_unsubscribe.len(),
            subscribed = to_subscribe.len(),
            "reconciled subscriptions"
        );

        self.active = desired
            .entries()
            .map(|resolved| (resolved.topic.clone(), resolved.qos))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::TransportError;
    use crate::topics::resolver::{resolve_all, ResolutionContext};
    use crate::topics::store::TopicTemplate;
    use crate::topics::TopicCategory;

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Subscribe(String),
        Unsubscribe(String),
    }

    #[derive(Default)]
    struct RecordingTransport {
        calls: Vec<Call>,
        fail_all: bool,
    }

    impl BrokerTransport for RecordingTransport {
        fn subscribe(&mut self, topic: &str, _qos: QualityLevel) -> Result<(), TransportError> {
            self.calls.push(Call::Subscribe(topic.to_string()));
            if self.fail_all {
                return Err(TransportError::SubscribeFailed {
                    topic: topic.to_string(),
                    reason: "request queue full".to_string(),
                });
            }
            Ok(())
        }

        fn unsubscribe(&mut self, topic: &str) -> Result<(), TransportError> {
            self.calls.push(Call::Unsubscribe(topic.to_string()));
            if self.fail_all {
                return Err(TransportError::UnsubscribeFailed {
                    topic: topic.to_string(),
                    reason: "request queue full".to_string(),
                });
            }
            Ok(())
        }

        fn publish(
            &mut self,
            _topic: &str,
            _payload: &[u8],
            _qos: QualityLevel,
            _retain: bool,
        ) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn set_of(topics: &[&str]) -> ResolvedTopicSet {
        let templates: Vec<TopicTemplate> = topics
            .iter()
            .map(|topic| TopicTemplate::new(*topic, *topic, TopicCategory::General, ""))
            .collect();
        resolve_all(&templates, &ResolutionContext::default())
    }

    #[test]
    fn connect_subscribes_everything_resolvable() {
        let mut reconciler = SubscriptionReconciler::new();
        let mut transport = RecordingTransport::default();
        reconciler.on_connected(&set_of(&["A", "B"]), &mut transport);

        assert_eq!(reconciler.state(), ReconcilerState::Synced);
        assert_eq!(
            transport.calls,
            vec![Call::Subscribe("A".into()), Call::Subscribe("B".into())]
        );
    }

    #[test]
    fn reconcile_same_set_is_a_strict_noop() {
        let mut reconciler = SubscriptionReconciler::new();
        let mut transport = RecordingTransport::default();
        let set = set_of(&["A", "B"]);
        reconciler.on_connected(&set, &mut transport);
        transport.calls.clear();

        reconciler.reconcile(&set, &mut transport);
        assert!(transport.calls.is_empty());
    }

    #[test]
    fn diff_unsubscribes_before_subscribing() {
        let mut reconciler = SubscriptionReconciler::new();
        let mut transport = RecordingTransport::default();
        reconciler.on_connected(&set_of(&["A", "B"]), &mut transport);
        transport.calls.clear();

        reconciler.reconcile(&set_of(&["B", "C"]), &mut transport);
        assert_eq!(
            transport.calls,
            vec![Call::Unsubscribe("A".into()), Call::Subscribe("C".into())]
        );
        assert_eq!(
            reconciler.active_topics().into_iter().collect::<Vec<_>>(),
            vec!["B".to_string(), "C".to_string()]
        );
    }

    #[test]
    fn disconnect_clears_without_unsubscribe_calls() {
        let mut reconciler = SubscriptionReconciler::new();
        let mut transport = RecordingTransport::default();
        reconciler.on_connected(&set_of(&["A", "B"]), &mut transport);
        transport.calls.clear();

        reconciler.on_disconnected();
        assert_eq!(reconciler.state(), ReconcilerState::Idle);
        assert!(reconciler.active_topics().is_empty());
        assert!(transport.calls.is_empty());
    }

    #[test]
    fn reconcile_while_idle_issues_nothing() {
        let mut reconciler = SubscriptionReconciler::new();
        let mut transport = RecordingTransport::default();
        reconciler.reconcile(&set_of(&["A"]), &mut transport);
        assert!(transport.calls.is_empty());
        assert!(reconciler.active_topics().is_empty());
    }

    #[test]
    fn transport_failure_does_not_roll_back_bookkeeping() {
        let mut reconciler = SubscriptionReconciler::new();
        let mut transport = RecordingTransport {
            fail_all: true,
            ..Default::default()
        };
        reconciler.on_connected(&set_of(&["A"]), &mut transport);
        // Optimistic update: the topic counts as active even though the
        // subscribe was rejected.
        assert!(reconciler.is_active("A"));
    }

    #[test]
    fn reconnect_after_disconnect_resubscribes_from_scratch() {
        let mut reconciler = SubscriptionReconciler::new();
        let mut transport = RecordingTransport::default();
        let set = set_of(&["A"]);
        reconciler.on_connected(&set, &mut transport);
        reconciler.on_disconnected();
        transport.calls.clear();

        reconciler.on_connected(&set, &mut transport);
        assert_eq!(transport.calls, vec![Call::Subscribe("A".into())]);
    }
}
