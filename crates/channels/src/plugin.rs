use {
    async_trait::async_trait,
    botline_common::types::{AttachmentRef, EndpointId},
    chrono::{DateTime, Utc},
};

use crate::error::Result;

/// A raw inbound message from the chat network, before normalization.
///
/// Attachments have already been persisted by the transport (via an
/// [`crate::AttachmentStore`]); their semantic tags are refined later from the
/// message text.
#[derive(Debug, Clone)]
pub struct TransportEvent {
    /// Which configured endpoint the message came from.
    pub endpoint: EndpointId,
    /// Message text exactly as delivered (caption for media messages).
    pub raw_text: String,
    /// Transport delivery time.
    pub timestamp: DateTime<Utc>,
    pub attachments: Vec<AttachmentRef>,
}

/// Result of probing the transport connection.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransportHealth {
    pub connected: bool,
    pub details: Option<String>,
}

/// Outbound side of a chat transport.
///
/// Implementations deliver plain-text commands to an endpoint and surface a
/// typed [`crate::Error::Rejected`] when the network refuses the send — the
/// dispatcher treats that differently from a reply that never comes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport identifier (e.g. "telegram").
    fn name(&self) -> &str;

    /// Deliver `text` to the endpoint's chat. Resolves once the network has
    /// accepted the message; replies arrive later as [`TransportEvent`]s.
    async fn send(&self, endpoint: &EndpointId, text: &str) -> Result<()>;

    /// Probe connection health for the status surface.
    async fn probe(&self) -> TransportHealth {
        TransportHealth {
            connected: true,
            details: None,
        }
    }
}
