//! Resolution of topic templates against the current tenant/device context.
//!
//! Resolution is a pure function over an immutable [`ResolutionContext`]
//! snapshot. A template that cannot be fully substituted is simply
//! [`Resolution::Unresolved`]: no device being selected yet is an expected
//! state, not an error. The whole [`ResolvedTopicSet`] is recomputed from
//! scratch on every context or catalog change rather than patched
//! incrementally, which keeps the pipeline deterministic and directly
//! testable.

use std::collections::BTreeMap;

use super::store::TopicTemplate;
use super::{QualityLevel, CATCH_ALL, SERIAL_TOKEN, TENANT_TOKEN};

/// Snapshot of the runtime values templates are resolved against.
///
/// Recomputed whenever the tenant or the selected device changes; it has no
/// independent lifecycle and is never stored alongside resolved results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionContext {
    /// Tenant identifier scoping the device fleet, absent before login.
    pub tenant: Option<String>,
    /// Serial number of the currently selected device, absent when none is.
    pub device_serial: Option<String>,
}

impl ResolutionContext {
    pub fn new(tenant: Option<String>, device_serial: Option<String>) -> Self {
        Self {
            tenant,
            device_serial,
        }
    }
}

/// A concrete topic produced from a template, with no placeholder braces left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTopic {
    /// The concrete topic string handed to the broker.
    pub topic: String,
    /// Id of the template this topic was derived from.
    pub template_id: String,
    /// Delivery quality the subscription will be issued with.
    pub qos: QualityLevel,
}

/// Outcome of resolving a single template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedTopic),
    /// A required context value was absent; the template contributes nothing
    /// for this context.
    Unresolved,
}

/// Substitutes every `{tenant}` and `{serialNo}` occurrence in the template.
///
/// The literal catch-all template `#` resolves unconditionally. Any brace
/// remaining after substitution means a required value was absent and the
/// result is [`Resolution::Unresolved`].
pub fn resolve(template: &TopicTemplate, context: &ResolutionContext) -> Resolution {
    if template.pattern == CATCH_ALL {
        return Resolution::Resolved(ResolvedTopic {
            topic: CATCH_ALL.to_string(),
            template_id: template.id.clone(),
            qos: template.qos,
        });
    }

    let mut topic = template.pattern.clone();
    if let Some(tenant) = &context.tenant {
        topic = topic.replace(TENANT_TOKEN, tenant);
    }
    if let Some(serial) = &context.device_serial {
        topic = topic.replace(SERIAL_TOKEN, serial);
    }
    if topic.contains('{') || topic.contains('}') {
        return Resolution::Unresolved;
    }

    Resolution::Resolved(ResolvedTopic {
        topic,
        template_id: template.id.clone(),
        qos: template.qos,
    })
}

/// The authoritative "what should be subscribed" snapshot, keyed by topic.
///
/// Duplicate topic strings from different templates collapse to a single
/// entry; the first template in catalog order wins, which is a defined
/// tie-break rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTopicSet {
    entries: BTreeMap<String, ResolvedTopic>,
}

impl ResolvedTopicSet {
    pub fn contains(&self, topic: &str) -> bool {
        self.entries.contains_key(topic)
    }

    pub fn get(&self, topic: &str) -> Option<&ResolvedTopic> {
        self.entries.get(topic)
    }

    /// Topic strings in lexicographic order.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ResolvedTopic> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Applies [`resolve`] to the whole catalog, dropping unresolved templates and
/// deduplicating by topic string.
pub fn resolve_all(templates: &[TopicTemplate], context: &ResolutionContext) -> ResolvedTopicSet {
    let mut entries = BTreeMap::new();
    for template in templates {
        if let Resolution::Resolved(resolved) = resolve(template, context) {
            entries.entry(resolved.topic.clone()).or_insert(resolved);
        }
    }
    ResolvedTopicSet { entries }
}
