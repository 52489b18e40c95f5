use serde::{Deserialize, Serialize};

use crate::topics::QualityLevel;

/// Broker connection settings, persisted as part of the application config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Client id announced to the broker.
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// Quality level applied to templates that do not set their own.
    pub default_qos: QualityLevel,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: String::new(),
            password: String::new(),
            client_id: "fleetdeck".to_string(),
            keep_alive_secs: 5,
            default_qos: QualityLevel::AtMostOnce,
        }
    }
}
