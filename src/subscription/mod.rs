//! # Subscription Management Module
//!
//! Keeps the broker's active subscription set synchronized with whatever the
//! topic layer currently resolves, and routes inbound messages to the views
//! that asked for them.
//!
//! ## Why This Module Exists
//!
//! The resolved topic set changes every time the operator logs into a
//! different tenant, selects another device, or edits the template catalog.
//! Tearing down every subscription and rebuilding from scratch on each change
//! would flood the broker and drop messages on topics that did not change, so
//! the [`reconciler`] computes the minimal unsubscribe/subscribe pair instead.
//! The [`router`] is the read side: it decides, via wildcard matching, which
//! of the currently interesting patterns an inbound message belongs to.
//!
//! ## Boundary
//!
//! The actual network calls live behind the [`BrokerTransport`] trait. The
//! reconciler only decides *which* topics to (un)subscribe; connect/reconnect,
//! keep-alive and the wire protocol belong to the transport implementation.

pub mod reconciler;
pub mod router;

use thiserror::Error;

use crate::topics::QualityLevel;

/// Errors surfaced by a transport implementation
#[derive(Debug, Error)]
pub enum TransportError {
    /// A subscribe request could not be handed to the transport
    #[error("subscribe request for '{topic}' failed: {reason}")]
    SubscribeFailed { topic: String, reason: String },

    /// An unsubscribe request could not be handed to the transport
    #[error("unsubscribe request for '{topic}' failed: {reason}")]
    UnsubscribeFailed { topic: String, reason: String },

    /// A publish could not be handed to the transport
    #[error("publish to '{topic}' failed: {reason}")]
    PublishFailed { topic: String, reason: String },
}

/// Fire-and-forget boundary to the pub/sub client.
///
/// Calls are issued optimistically; a failure is logged by the caller and does
/// not roll back any bookkeeping. Retry and reconnection are the transport's
/// own business.
pub trait BrokerTransport {
    fn subscribe(&mut self, topic: &str, qos: QualityLevel) -> Result<(), TransportError>;

    fn unsubscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QualityLevel,
        retain: bool,
    ) -> Result<(), TransportError>;
}
