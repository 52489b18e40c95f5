//! Template catalog: the ordered list of topic templates and their validation.
//!
//! The store is the source of truth for what *could* be subscribed. It is
//! edited by the UI and persisted as a flat list; the resolver and the
//! reconciler only ever read it. Malformed patterns are rejected here, at
//! authoring time, so the matcher never has to cope with a misplaced `#`.

use serde::{Deserialize, Serialize};

use super::error::TopicError;
use super::{QualityLevel, TopicCategory, SERIAL_TOKEN, TENANT_TOKEN};

/// A reusable, parameterized topic pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicTemplate {
    /// Unique, stable identifier within the catalog.
    pub id: String,
    /// Topic pattern, optionally containing `{tenant}` / `{serialNo}` tokens.
    pub pattern: String,
    /// UI grouping of the template.
    pub category: TopicCategory,
    /// Free-text explanation shown to the operator.
    pub description: String,
    /// Delivery quality requested when subscribing to the resolved topic.
    #[serde(default)]
    pub qos: QualityLevel,
}

impl TopicTemplate {
    pub fn new(
        id: impl Into<String>,
        pattern: impl Into<String>,
        category: TopicCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            pattern: pattern.into(),
            category,
            description: description.into(),
            qos: QualityLevel::default(),
        }
    }

    pub fn with_qos(mut self, qos: QualityLevel) -> Self {
        self.qos = qos;
        self
    }
}

/// Validates a template pattern at authoring time.
///
/// Rules:
/// - the pattern is non-empty
/// - every `{...}` token is exactly `{tenant}` or `{serialNo}`
/// - a level containing `#` is exactly `#` and is the final level
/// - a level containing `+` is exactly `+`
pub fn validate_pattern(pattern: &str) -> Result<(), TopicError> {
    if pattern.is_empty() {
        return Err(TopicError::EmptyPattern);
    }

    let mut rest = pattern;
    while let Some(open) = rest.find('{') {
        if rest[..open].contains('}') {
            return Err(TopicError::MalformedPlaceholder(pattern.to_string()));
        }
        let tail = &rest[open + 1..];
        let close = tail
            .find('}')
            .ok_or_else(|| TopicError::MalformedPlaceholder(pattern.to_string()))?;
        if tail[..close].contains('{') {
            return Err(TopicError::MalformedPlaceholder(pattern.to_string()));
        }
        let token = &rest[open..open + close + 2];
        if token != TENANT_TOKEN && token != SERIAL_TOKEN {
            return Err(TopicError::UnknownPlaceholder {
                pattern: pattern.to_string(),
                token: token.to_string(),
            });
        }
        rest = &rest[open + close + 2..];
    }
    if rest.contains('}') {
        return Err(TopicError::MalformedPlaceholder(pattern.to_string()));
    }

    let levels: Vec<&str> = pattern.split('/').collect();
    for (index, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || index + 1 != levels.len()) {
            return Err(TopicError::MultiLevelMisplaced(pattern.to_string()));
        }
        if level.contains('+') && *level != "+" {
            return Err(TopicError::SingleLevelMisplaced(pattern.to_string()));
        }
    }
    Ok(())
}

/// Ordered catalog of topic templates.
///
/// Order matters: on duplicate resolved topics the first template wins, so the
/// catalog keeps insertion order instead of sorting.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: Vec<TopicTemplate>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a persisted flat list, validating every entry.
    pub fn from_templates(templates: Vec<TopicTemplate>) -> Result<Self, TopicError> {
        let mut store = Self::new();
        for template in templates {
            store.add(template)?;
        }
        Ok(store)
    }

    /// Appends a template; rejects malformed patterns and duplicate ids.
    pub fn add(&mut self, template: TopicTemplate) -> Result<(), TopicError> {
        validate_pattern(&template.pattern)?;
        if self.get(&template.id).is_some() {
            return Err(TopicError::DuplicateId(template.id));
        }
        self.templates.push(template);
        Ok(())
    }

    /// Replaces the template with the same id, keeping its catalog position.
    pub fn update(&mut self, template: TopicTemplate) -> Result<(), TopicError> {
        validate_pattern(&template.pattern)?;
        let slot = self
            .templates
            .iter_mut()
            .find(|existing| existing.id == template.id)
            .ok_or_else(|| TopicError::UnknownId(template.id.clone()))?;
        *slot = template;
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<TopicTemplate, TopicError> {
        let index = self
            .templates
            .iter()
            .position(|template| template.id == id)
            .ok_or_else(|| TopicError::UnknownId(id.to_string()))?;
        Ok(self.templates.remove(index))
    }

    /// Swaps the whole catalog, e.g. after a session import.
    pub fn replace_all(&mut self, templates: Vec<TopicTemplate>) -> Result<(), TopicError> {
        *self = Self::from_templates(templates)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&TopicTemplate> {
        self.templates.iter().find(|template| template.id == id)
    }

    pub fn templates(&self) -> &[TopicTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// The standard fleet catalog seeded on first start.
///
/// Mirrors the topic families the devices actually publish on: RPC topics
/// behind the `MQTTnet.RPC` prefix, per-device status and log topics, and
/// tenant-wide broadcast topics, plus the catch-all for raw monitoring.
pub fn default_fleet_templates() -> Vec<TopicTemplate> {
    use TopicCategory::{DeviceSpecific, General, Rpc};

    vec![
        TopicTemplate::new("catch-all", "#", General, "Raw monitor of all broker traffic."),
        TopicTemplate::new(
            "rpc-price-change",
            "MQTTnet.RPC/+/{tenant}_{serialNo}.PriceChange",
            Rpc,
            "Request a price change for the device.",
        ),
        TopicTemplate::new(
            "rpc-start-game",
            "MQTTnet.RPC/+/{tenant}_{serialNo}.StartGame",
            Rpc,
            "Request to start a game on the device.",
        ),
        TopicTemplate::new(
            "rpc-start-game-error",
            "MQTTnet.RPC/+/{tenant}_{serialNo}.StartGameError",
            Rpc,
            "Listens for errors during game start.",
        ),
        TopicTemplate::new(
            "rpc-ticket-loaded",
            "MQTTnet.RPC/+/{tenant}_{serialNo}.TicketLoaded",
            Rpc,
            "Indicates a ticket has been loaded.",
        ),
        TopicTemplate::new(
            "functional-status",
            "{tenant}_{serialNo}.FunctionalStatusChanged",
            DeviceSpecific,
            "Fires when the device's functional status changes.",
        ),
        TopicTemplate::new(
            "parameters-changed",
            "{tenant}_{serialNo}.ParametersChanged",
            DeviceSpecific,
            "Fires when device parameters are updated.",
        ),
        TopicTemplate::new(
            "module-deleted",
            "{tenant}_{serialNo}.ModuleDeleted",
            DeviceSpecific,
            "Fires when the module is marked as deleted.",
        ),
        TopicTemplate::new(
            "device-log",
            "{tenant}_{serialNo}.Log",
            DeviceSpecific,
            "Topic for device logs.",
        ),
        TopicTemplate::new(
            "module-reset",
            "{tenant}_{serialNo}.ModuleReset",
            DeviceSpecific,
            "Fires when the module is reset.",
        ),
        TopicTemplate::new(
            "start-game",
            "{tenant}_{serialNo}.StartGame",
            DeviceSpecific,
            "Control topic to start game.",
        ),
        TopicTemplate::new(
            "start-game-error",
            "{tenant}_{serialNo}.StartGameError",
            DeviceSpecific,
            "Control topic for game start errors.",
        ),
        TopicTemplate::new(
            "ticket-loaded",
            "{tenant}_{serialNo}.TicketLoaded",
            DeviceSpecific,
            "Control topic for loaded tickets.",
        ),
        TopicTemplate::new(
            "new-module-version",
            "{tenant}.NewModuleVersionCreated",
            General,
            "Fires when a new firmware version is available for any module.",
        ),
        TopicTemplate::new(
            "qr-state-changed",
            "{tenant}.QrStateChanged",
            General,
            "Fires when the QR payment state changes for the tenant.",
        ),
    ]
}
