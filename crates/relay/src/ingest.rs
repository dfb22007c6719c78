use std::sync::Arc;

use {
    botline_channels::TransportEvent,
    botline_common::types::AttachmentRef,
    tokio::sync::mpsc,
    tracing::debug,
};

use crate::{normalize::MessageNormalizer, registry::CorrelationRegistry, types::InboundReply};

/// Pump between the transport's raw event stream and the correlation
/// registry: normalize, retag attachments, route. Runs as one task on the
/// receiving end of the transport's mpsc channel.
pub struct ReplyRouter {
    registry: CorrelationRegistry,
    normalizer: Arc<MessageNormalizer>,
}

impl ReplyRouter {
    pub fn new(registry: CorrelationRegistry, normalizer: Arc<MessageNormalizer>) -> Self {
        Self {
            registry,
            normalizer,
        }
    }

    /// Normalize one raw event into an immutable reply.
    ///
    /// Attachments keep the transport's coarse tag unless the message text
    /// yields a semantic one (every attachment of a message shares it).
    pub fn build_reply(&self, event: TransportEvent) -> InboundReply {
        let normalized = self.normalizer.normalize(&event.raw_text);
        let attachments = event
            .attachments
            .into_iter()
            .map(|attachment| AttachmentRef {
                tag: normalized
                    .attachment_tag
                    .clone()
                    .unwrap_or(attachment.tag),
                url: attachment.url,
            })
            .collect();

        InboundReply {
            endpoint: event.endpoint,
            subject: normalized.subject,
            text: normalized.text,
            fields: normalized.fields,
            attachments,
            received_at: event.timestamp,
        }
    }

    /// Drain the transport event stream until it closes, routing each reply.
    pub async fn run(self, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            let endpoint = event.endpoint.clone();
            let reply = self.build_reply(event);
            if !self.registry.route(reply) {
                debug!(endpoint = %endpoint, "unclaimed reply moved to inbox");
            }
        }
        debug!("transport event stream closed, reply router stopping");
    }
}
