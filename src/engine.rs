//! # Subscription Engine - Central Reconciliation Pipeline
//!
//! Single thread of control tying the topic layer to the transport: every
//! external trigger (a context change, a template edit, a transport event)
//! lands in one event loop, which recomputes the resolved topic set, applies
//! the minimal subscription diff, and routes inbound messages to presentation.
//!
//! ## Why This Module Exists
//!
//! The same derived-set-plus-diff pipeline could be expressed through several
//! competing reactive mechanisms, with duplicated and diverging logic as a
//! result. Fleetdeck instead funnels everything through this one engine:
//! resolution and diffing are pure functions over snapshots, the engine owns
//! the only mutable state (template catalog, context, reconciler bookkeeping),
//! and events are processed to completion one at a time, so reconciliations
//! never overlap. Multiple engine instances (e.g. multi-window) can coexist
//! because nothing here is ambient module state.
//!
//! ## Data Flow
//!
//! ```text
//! EngineCommand ─┐
//!                ├─► Engine ─► resolve_all ─► reconcile ─► BrokerTransport
//! TransportEvent ┘      │
//!                       └─► MessageRouter ─► RoutedMessage ─► presentation
//! ```

use std::collections::BTreeSet;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::mqtt::client::{ConnectionState, TransportEvent};
use crate::subscription::reconciler::SubscriptionReconciler;
use crate::subscription::router::{Interest, MessageRouter, RoutedMessage};
use crate::subscription::BrokerTransport;
use crate::topics::resolver::{resolve_all, ResolutionContext, ResolvedTopicSet};
use crate::topics::store::{TemplateStore, TopicTemplate};
use crate::topics::QualityLevel;

/// Everything the outside world may ask of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Tenant changed (login/logout).
    SetTenant(Option<String>),
    /// Device selection changed; `None` deselects.
    SelectDevice(Option<String>),
    AddTemplate(TopicTemplate),
    UpdateTemplate(TopicTemplate),
    RemoveTemplate(String),
    ReplaceTemplates(Vec<TopicTemplate>),
    /// Pass-through publish to the broker.
    Publish {
        topic: String,
        payload: String,
        qos: QualityLevel,
        retain: bool,
    },
}

/// Read-only state snapshots exposed to presentation.
#[derive(Debug, Clone)]
pub struct EngineSnapshots {
    /// What should currently be subscribed, for display and selection.
    pub resolved: watch::Receiver<ResolvedTopicSet>,
    /// What the reconciler believes is subscribed, for indicators.
    pub active: watch::Receiver<BTreeSet<String>>,
}

pub struct Engine<T: BrokerTransport> {
    store: TemplateStore,
    context: ResolutionContext,
    resolved: ResolvedTopicSet,
    reconciler: SubscriptionReconciler,
    router: MessageRouter,
    transport: T,
    resolved_tx: watch::Sender<ResolvedTopicSet>,
    active_tx: watch::Sender<BTreeSet<String>>,
    routed_tx: mpsc::Sender<RoutedMessage>,
}

impl<T: BrokerTransport> Engine<T> {
    pub fn new(
        store: TemplateStore,
        transport: T,
        routed_tx: mpsc::Sender<RoutedMessage>,
    ) -> (Self, EngineSnapshots) {
        let (resolved_tx, resolved_rx) = watch::channel(ResolvedTopicSet::default());
        let (active_tx, active_rx) = watch::channel(BTreeSet::new());

        let mut engine = Self {
            store,
            context: ResolutionContext::default(),
            resolved: ResolvedTopicSet::default(),
            reconciler: SubscriptionReconciler::new(),
            router: MessageRouter::new(),
            transport,
            resolved_tx,
            active_tx,
            routed_tx,
        };
        // Publish the initial resolved set; the reconciler is still Idle so no
        // transport calls are issued yet.
        engine.recompute();

        (
            engine,
            EngineSnapshots {
                resolved: resolved_rx,
                active: active_rx,
            },
        )
    }

    pub fn context(&self) -> &ResolutionContext {
        &self.context
    }

    pub fn resolved(&self) -> &ResolvedTopicSet {
        &self.resolved
    }

    pub fn active_topics(&self) -> BTreeSet<String> {
        self.reconciler.active_topics()
    }

    /// Re-derives the resolved set from the catalog and context, then brings
    /// router interests and broker subscriptions in line with it.
    fn recompute(&mut self) {
        self.resolved = resolve_all(self.store.templates(), &self.context);
        self.router.set_interests(
            self.resolved
                .entries()
                .map(|resolved| Interest::new(resolved.template_id.clone(), resolved.topic.clone()))
                .collect(),
        );
        self.reconciler.reconcile(&self.resolved, &mut self.transport);
        self.publish_snapshots();
    }

    fn publish_snapshots(&self) {
        let _ = self.resolved_tx.send(self.resolved.clone());
        let _ = self.active_tx.send(self.reconciler.active_topics());
    }

    pub fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::SetTenant(tenant) => {
                if self.context.tenant != tenant {
                    info!(?tenant, "tenant changed");
                    self.context.tenant = tenant;
                    self.recompute();
                }
            }
            EngineCommand::SelectDevice(serial) => {
                if self.context.device_serial != serial {
                    info!(?serial, "device selection changed");
                    self.context.device_serial = serial;
                    self.recompute();
                }
            }
            EngineCommand::AddTemplate(template) => match self.store.add(template) {
                Ok(()) => self.recompute(),
                Err(e) => warn!("rejected template: {}", e),
            },
            EngineCommand::UpdateTemplate(template) => match self.store.update(template) {
                Ok(()) => self.recompute(),
                Err(e) => warn!("rejected template update: {}", e),
            },
            EngineCommand::RemoveTemplate(id) => match self.store.remove(&id) {
                Ok(_) => self.recompute(),
                Err(e) => warn!("cannot remove template: {}", e),
            },
            EngineCommand::ReplaceTemplates(templates) => {
                match self.store.replace_all(templates) {
                    Ok(()) => self.recompute(),
                    Err(e) => warn!("rejected template list: {}", e),
                }
            }
            EngineCommand::Publish {
                topic,
                payload,
                qos,
                retain,
            } => {
                if let Err(e) = self
                    .transport
                    .publish(&topic, payload.as_bytes(), qos, retain)
                {
                    warn!("{}", e);
                }
            }
        }
    }

    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::StateChanged(ConnectionState::Connected) => {
                info!("transport connected, syncing subscriptions");
                self.reconciler
                    .on_connected(&self.resolved, &mut self.transport);
                self.publish_snapshots();
            }
            TransportEvent::StateChanged(ConnectionState::Disconnected)
            | TransportEvent::StateChanged(ConnectionState::Failed) => {
                info!("transport session lost, clearing subscription bookkeeping");
                self.reconciler.on_disconnected();
                self.publish_snapshots();
            }
            TransportEvent::StateChanged(ConnectionState::Connecting) => {
                debug!("transport connecting");
            }
            TransportEvent::Message { topic, payload } => {
                let matched: Vec<String> =
                    self.router.route(&topic).into_iter().map(String::from).collect();
                if matched.is_empty() {
                    debug!(%topic, "no view interested, message dropped");
                    return;
                }
                let message = RoutedMessage::new(topic, payload, matched);
                if let Err(e) = self.routed_tx.try_send(message) {
                    warn!("presentation channel backed up, dropping message: {}", e);
                }
            }
        }
    }

    /// Event loop: one trigger at a time, each processed to completion before
    /// the next diff is computed.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<EngineCommand>,
        mut transport_events: mpsc::Receiver<TransportEvent>,
    ) {
        info!("engine event loop started");
        loop {
            tokio::select! {
                Some(command) = commands.recv() => self.handle_command(command),
                Some(event) = transport_events.recv() => self.handle_transport_event(event),
                else => break,
            }
        }
        info!("engine event loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::TransportError;
    use crate::topics::store::default_fleet_templates;
    use crate::topics::TopicCategory;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Subscribe(String),
        Unsubscribe(String),
        Publish(String, String, bool),
    }

    /// Records transport calls into a log shared with the test body.
    #[derive(Default, Clone)]
    struct RecordingTransport {
        calls: Rc<RefCell<Vec<Call>>>,
    }

    impl RecordingTransport {
        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        fn clear(&self) {
            self.calls.borrow_mut().clear();
        }
    }

    impl BrokerTransport for RecordingTransport {
        fn subscribe(&mut self, topic: &str, _qos: QualityLevel) -> Result<(), TransportError> {
            self.calls.borrow_mut().push(Call::Subscribe(topic.to_string()));
            Ok(())
        }

        fn unsubscribe(&mut self, topic: &str) -> Result<(), TransportError> {
            self.calls.borrow_mut().push(Call::Unsubscribe(topic.to_string()));
            Ok(())
        }

        fn publish(
            &mut self,
            topic: &str,
            payload: &[u8],
            _qos: QualityLevel,
            retain: bool,
        ) -> Result<(), TransportError> {
            self.calls.borrow_mut().push(Call::Publish(
                topic.to_string(),
                String::from_utf8_lossy(payload).into_owned(),
                retain,
            ));
            Ok(())
        }
    }

    fn scenario_store() -> TemplateStore {
        TemplateStore::from_templates(vec![
            TopicTemplate::new("catch-all", "#", TopicCategory::General, ""),
            TopicTemplate::new(
                "device-log",
                "{tenant}_{serialNo}.Log",
                TopicCategory::DeviceSpecific,
                "",
            ),
            TopicTemplate::new(
                "qr-state",
                "{tenant}.QrStateChanged",
                TopicCategory::General,
                "",
            ),
        ])
        .unwrap()
    }

    fn engine_with(
        store: TemplateStore,
    ) -> (
        Engine<RecordingTransport>,
        RecordingTransport,
        EngineSnapshots,
        mpsc::Receiver<RoutedMessage>,
    ) {
        let transport = RecordingTransport::default();
        let (routed_tx, routed_rx) = mpsc::channel(16);
        let (engine, snapshots) = Engine::new(store, transport.clone(), routed_tx);
        (engine, transport, snapshots, routed_rx)
    }

    #[test]
    fn device_switch_reconciles_only_the_device_topics() {
        let (mut engine, transport, _snapshots, _routed) = engine_with(scenario_store());

        engine.handle_command(EngineCommand::SetTenant(Some("CCTR".into())));
        engine.handle_transport_event(TransportEvent::StateChanged(ConnectionState::Connected));
        engine.handle_command(EngineCommand::SelectDevice(Some("SN-100".into())));

        let resolved: Vec<&str> = engine.resolved().topics().collect();
        assert_eq!(resolved, vec!["#", "CCTR.QrStateChanged", "CCTR_SN-100.Log"]);

        transport.clear();
        engine.handle_command(EngineCommand::SelectDevice(Some("SN-200".into())));
        assert_eq!(
            transport.calls(),
            vec![
                Call::Unsubscribe("CCTR_SN-100.Log".into()),
                Call::Subscribe("CCTR_SN-200.Log".into()),
            ]
        );
        assert!(engine.active_topics().contains("CCTR_SN-200.Log"));
        assert!(engine.active_topics().contains("#"));
        assert!(engine.active_topics().contains("CCTR.QrStateChanged"));
    }

    #[test]
    fn connect_subscribes_current_resolved_set() {
        let (mut engine, _transport, snapshots, _routed) = engine_with(scenario_store());

        engine.handle_command(EngineCommand::SetTenant(Some("CCTR".into())));
        engine.handle_transport_event(TransportEvent::StateChanged(ConnectionState::Connected));

        let active = snapshots.active.borrow().clone();
        assert!(active.contains("#"));
        assert!(active.contains("CCTR.QrStateChanged"));
        // Device topic stays out until a device is selected.
        assert_eq!(active.len(), 2);
    }

    #[test]
    fn disconnect_clears_active_set_without_calls() {
        let (mut engine, transport, snapshots, _routed) = engine_with(scenario_store());
        engine.handle_command(EngineCommand::SetTenant(Some("CCTR".into())));
        engine.handle_transport_event(TransportEvent::StateChanged(ConnectionState::Connected));
        transport.clear();

        engine.handle_transport_event(TransportEvent::StateChanged(
            ConnectionState::Disconnected,
        ));
        assert!(snapshots.active.borrow().is_empty());
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn inbound_messages_route_to_matching_views() {
        let (mut engine, _transport, _snapshots, mut routed) = engine_with(scenario_store());
        engine.handle_command(EngineCommand::SetTenant(Some("CCTR".into())));
        engine.handle_command(EngineCommand::SelectDevice(Some("SN-100".into())));

        engine.handle_transport_event(TransportEvent::Message {
            topic: "CCTR_SN-100.Log".into(),
            payload: "boot ok".into(),
        });
        let message = routed.try_recv().unwrap();
        assert_eq!(message.topic, "CCTR_SN-100.Log");
        assert_eq!(message.payload, "boot ok");
        assert_eq!(message.matched, vec!["catch-all", "device-log"]);
    }

    #[test]
    fn uninteresting_messages_are_dropped() {
        let (mut engine, _transport, _snapshots, mut routed) = engine_with(
            TemplateStore::from_templates(vec![TopicTemplate::new(
                "qr-state",
                "{tenant}.QrStateChanged",
                TopicCategory::General,
                "",
            )])
            .unwrap(),
        );
        engine.handle_command(EngineCommand::SetTenant(Some("CCTR".into())));
        engine.handle_transport_event(TransportEvent::Message {
            topic: "OTHER.QrStateChanged".into(),
            payload: "x".into(),
        });
        assert!(routed.try_recv().is_err());
    }

    #[test]
    fn invalid_template_is_rejected_without_recompute() {
        let (mut engine, _transport, _snapshots, _routed) = engine_with(scenario_store());
        let before = engine.resolved().clone();

        engine.handle_command(EngineCommand::AddTemplate(TopicTemplate::new(
            "bad",
            "a/#/c",
            TopicCategory::General,
            "",
        )));
        assert_eq!(engine.resolved(), &before);
    }

    #[test]
    fn publish_passes_through_to_transport() {
        let (mut engine, transport, _snapshots, _routed) = engine_with(scenario_store());

        engine.handle_command(EngineCommand::Publish {
            topic: "CCTR_SN-100.StartGame".into(),
            payload: "{}".into(),
            qos: QualityLevel::AtLeastOnce,
            retain: false,
        });
        assert_eq!(
            transport.calls(),
            vec![Call::Publish(
                "CCTR_SN-100.StartGame".into(),
                "{}".into(),
                false
            )]
        );
    }

    #[test]
    fn default_catalog_resolves_device_wide() {
        let (mut engine, _transport, _snapshots, _routed) = engine_with(
            TemplateStore::from_templates(default_fleet_templates()).unwrap(),
        );
        engine.handle_command(EngineCommand::SetTenant(Some("CCTR".into())));
        engine.handle_command(EngineCommand::SelectDevice(Some("SN1".into())));

        assert!(engine.resolved().contains("CCTR_SN1.Log"));
        assert!(engine
            .resolved()
            .contains("MQTTnet.RPC/+/CCTR_SN1.StartGame"));
        assert!(engine.resolved().contains("#"));
    }
}
