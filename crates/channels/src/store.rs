use {async_trait::async_trait, botline_common::types::AttachmentRef};

use crate::error::Result;

/// Persistent storage for attachment bytes.
///
/// Transports hand every downloaded attachment to the store and forward only
/// the returned reference; `tag` is a coarse hint ("file") that the relay may
/// replace with a semantic tag extracted from the message text.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Persist `bytes` and return a public reference to them. `extension`
    /// includes the leading dot (".jpg", ".pdf").
    async fn store(&self, bytes: &[u8], extension: &str, tag: &str) -> Result<AttachmentRef>;
}
