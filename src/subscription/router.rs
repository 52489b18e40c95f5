//! Dispatch of inbound messages to the views that are interested in them.
//!
//! Pure filtering: the router holds the currently interesting patterns and,
//! per inbound topic, returns the ids of every pattern that matches. Several
//! views may receive the same message (a device-specific topic and the
//! catch-all `#` both matching is the normal case, not a conflict). There is
//! no ordering guarantee among matched ids.

use chrono::{DateTime, Local};

use crate::topics::matcher::topic_matches;

/// A pattern a view currently cares about: a resolved topic or a raw wildcard
/// subscription, tagged with the id it is routed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub id: String,
    pub pattern: String,
}

impl Interest {
    pub fn new(id: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pattern: pattern.into(),
        }
    }
}

/// Matches inbound topics against the current interest list.
#[derive(Debug, Default)]
pub struct MessageRouter {
    interests: Vec<Interest>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the interest list wholesale, in lock-step with the resolved
    /// topic set.
    pub fn set_interests(&mut self, interests: Vec<Interest>) {
        self.interests = interests;
    }

    pub fn interests(&self) -> &[Interest] {
        &self.interests
    }

    /// Returns the ids of every interest whose pattern matches `topic`.
    pub fn route(&self, topic: &str) -> Vec<&str> {
        self.interests
            .iter()
            .filter(|interest| topic_matches(&interest.pattern, topic))
            .map(|interest| interest.id.as_str())
            .collect()
    }
}

/// An inbound message after routing, as handed to presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedMessage {
    pub topic: String,
    pub payload: String,
    /// Ids of the interests this message matched.
    pub matched: Vec<String>,
    pub received_at: DateTime<Local>,
}

impl RoutedMessage {
    pub fn new(topic: String, payload: String, matched: Vec<String>) -> Self {
        Self {
            topic,
            payload,
            matched,
            received_at: Local::now(),
        }
    }
}
