//! # MQTT Transport Module
//!
//! Connects Fleetdeck to the broker via `rumqttc` and adapts its event stream
//! to the engine's transport events. This module owns everything on the wire
//! side of the [`crate::subscription::BrokerTransport`] boundary:
//!
//! ```text
//! mqtt/
//! ├── config.rs - broker connection settings
//! └── client.rs - rumqttc wrapper and connection event loop
//! ```
//!
//! Connection lifecycle (reconnect, keep-alive, credentials) is handled here
//! and by `rumqttc` itself; the engine only learns about state transitions and
//! inbound messages.

pub mod client;
pub mod config;
