//! rumqttc wrapper: the concrete [`BrokerTransport`] and the connection task.
//!
//! [`MqttLink`] hands subscribe/unsubscribe/publish requests to rumqttc's
//! request queue without awaiting acknowledgements (fire-and-forget, matching
//! the engine's optimistic bookkeeping). [`MqttHandle::spawn`] drives the
//! rumqttc event loop in its own tokio task and forwards connection state
//! changes and inbound publishes to the engine as [`TransportEvent`]s.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::config::MqttConfig;
use crate::subscription::{BrokerTransport, TransportError};
use crate::topics::QualityLevel;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// What the transport reports upward to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    StateChanged(ConnectionState),
    Message { topic: String, payload: String },
}

fn to_qos(qos: QualityLevel) -> QoS {
    match qos {
        QualityLevel::AtMostOnce => QoS::AtMostOnce,
        QualityLevel::AtLeastOnce => QoS::AtLeastOnce,
        QualityLevel::ExactlyOnce => QoS::ExactlyOnce,
    }
}

/// Request-queue side of the connection, cheap to hand to the engine.
#[derive(Debug, Clone)]
pub struct MqttLink {
    client: AsyncClient,
}

impl BrokerTransport for MqttLink {
    fn subscribe(&mut self, topic: &str, qos: QualityLevel) -> Result<(), TransportError> {
        self.client
            .try_subscribe(topic, to_qos(qos))
            .map_err(|e| TransportError::SubscribeFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.client
            .try_unsubscribe(topic)
            .map_err(|e| TransportError::UnsubscribeFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QualityLevel,
        retain: bool,
    ) -> Result<(), TransportError> {
        self.client
            .try_publish(topic, to_qos(qos), retain, payload)
            .map_err(|e| TransportError::PublishFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Handle to the background connection task.
#[derive(Debug)]
pub struct MqttHandle {
    task: JoinHandle<()>,
}

impl MqttHandle {
    /// Builds the client and spawns the event loop task.
    ///
    /// The task runs until the event receiver is dropped; rumqttc reconnects
    /// on its own whenever polling resumes after an error.
    pub fn spawn(
        config: &MqttConfig,
        events: mpsc::Sender<TransportEvent>,
    ) -> (MqttLink, MqttHandle) {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        if !config.username.is_empty() {
            options.set_credentials(config.username.clone(), config.password.clone());
        }

        let (client, event_loop) = AsyncClient::new(options, 100);
        let task = tokio::spawn(run_event_loop(event_loop, events));

        (MqttLink { client }, MqttHandle { task })
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

async fn run_event_loop(mut event_loop: EventLoop, events: mpsc::Sender<TransportEvent>) {
    if events
        .send(TransportEvent::StateChanged(ConnectionState::Connecting))
        .await
        .is_err()
    {
        return;
    }
    let mut state = ConnectionState::Connecting;

    loop {
        let event = match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("broker session established");
                state = ConnectionState::Connected;
                TransportEvent::StateChanged(ConnectionState::Connected)
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => TransportEvent::Message {
                topic: publish.topic.clone(),
                payload: String::from_utf8_lossy(&publish.payload).into_owned(),
            },
            Ok(Event::Incoming(Packet::Disconnect)) => {
                info!("broker closed the session");
                state = ConnectionState::Disconnected;
                TransportEvent::StateChanged(ConnectionState::Disconnected)
            }
            Ok(other) => {
                debug!(?other, "mqtt event");
                continue;
            }
            Err(e) => {
                error!("mqtt connection error: {}", e);
                let was_up = state == ConnectionState::Connected;
                state = ConnectionState::Failed;
                // rumqttc re-dials on the next poll
                tokio::time::sleep(Duration::from_secs(1)).await;
                if !was_up {
                    continue;
                }
                TransportEvent::StateChanged(ConnectionState::Failed)
            }
        };

        if events.send(event).await.is_err() {
            debug!("engine gone, stopping mqtt event loop");
            return;
        }
    }
}
