use serde::{Deserialize, Serialize};

/// Identifier of a candidate responder in the chat network.
///
/// Endpoints are the ordered candidates a command may be sent to; the id is
/// the config-assigned name ("primary", "backup", …), not a chat-network
/// address. The transport owns that mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Reference to a stored attachment: a public URL plus a semantic type tag
/// ("rostro", "firma", "file", …). The core never touches attachment bytes —
/// only these two fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub url: String,
    pub tag: String,
}

impl AttachmentRef {
    pub fn new(url: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tag: tag.into(),
        }
    }
}
