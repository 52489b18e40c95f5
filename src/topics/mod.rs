//! # Topic Templating Module
//!
//! Provides the topic layer of Fleetdeck: reusable topic templates, placeholder
//! resolution against the current tenant/device context, and MQTT-style wildcard
//! matching for inbound traffic.
//!
//! ## Why This Module Exists
//!
//! Fleet devices publish on topics that embed the tenant identifier and the device
//! serial number (e.g. `CCTR_SN-100.Log`). Hardcoding those topics per device does
//! not scale; instead the operator maintains a catalog of parameterized templates
//! and the application derives the concrete topic set for whichever device is
//! currently selected. This module owns:
//! - **Templates**: the catalog of parameterized topic patterns ([`store`])
//! - **Resolution**: substituting `{tenant}` / `{serialNo}` into templates ([`resolver`])
//! - **Matching**: deciding whether an inbound topic falls under a wildcard
//!   subscription pattern ([`matcher`])
//!
//! ## Design Philosophy
//!
//! Resolution and matching are pure functions over immutable snapshots. All
//! recoverable conditions (a template that cannot be resolved because no device is
//! selected yet) are ordinary return values, not errors; only malformed patterns
//! are rejected, and that happens once at authoring time in the store.

pub mod error;
pub mod matcher;
pub mod resolver;
pub mod store;

use serde::{Deserialize, Serialize};

/// Placeholder token substituted with the tenant identifier.
pub const TENANT_TOKEN: &str = "{tenant}";
/// Placeholder token substituted with the selected device's serial number.
pub const SERIAL_TOKEN: &str = "{serialNo}";
/// The global catch-all pattern; resolvable independent of any context.
pub const CATCH_ALL: &str = "#";

/// Grouping of a template, used by the UI for coloring and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopicCategory {
    /// Request/response topics routed through the RPC prefix.
    Rpc,
    /// Topics scoped to a single device serial.
    DeviceSpecific,
    /// Tenant-wide topics not tied to one device.
    General,
    /// Periodic sensor and status streams.
    Telemetry,
}

/// MQTT delivery quality level for a subscription or publish.
///
/// Stored per template rather than as one global constant so that chatty
/// telemetry topics and critical RPC topics can carry different levels.
/// Serialized as the protocol-level integer (0, 1, 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QualityLevel {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl TryFrom<u8> for QualityLevel {
    type Error = error::TopicError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QualityLevel::AtMostOnce),
            1 => Ok(QualityLevel::AtLeastOnce),
            2 => Ok(QualityLevel::ExactlyOnce),
            other => Err(error::TopicError::InvalidQualityLevel(other)),
        }
    }
}

impl From<QualityLevel> for u8 {
    fn from(value: QualityLevel) -> u8 {
        match value {
            QualityLevel::AtMostOnce => 0,
            QualityLevel::AtLeastOnce => 1,
            QualityLevel::ExactlyOnce => 2,
        }
    }
}
