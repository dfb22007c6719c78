use std::{collections::BTreeMap, num::NonZeroUsize};

use {
    botline_common::types::{AttachmentRef, EndpointId},
    chrono::{DateTime, Utc},
    serde::Serialize,
};

/// Identifier matching a pending call to future replies before their content
/// is known: the assigned endpoint plus an optional subject filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    pub endpoint: EndpointId,
    pub filter: Option<String>,
}

impl CorrelationKey {
    pub fn new(endpoint: EndpointId, filter: Option<String>) -> Self {
        Self { endpoint, filter }
    }

    /// Key matching any reply from the endpoint.
    pub fn open(endpoint: EndpointId) -> Self {
        Self::new(endpoint, None)
    }

    /// Key matching only replies carrying this subject id.
    pub fn filtered(endpoint: EndpointId, subject: impl Into<String>) -> Self {
        Self::new(endpoint, Some(subject.into()))
    }
}

impl std::fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.filter {
            Some(subject) => write!(f, "{}/{subject}", self.endpoint),
            None => write!(f, "{}", self.endpoint),
        }
    }
}

/// How many replies a pending call waits for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// First matching reply completes the call.
    Single,
    /// A fixed number of reply messages completes the call.
    Count(NonZeroUsize),
    /// Replies accumulate until a terminator-marker reply arrives.
    UntilTerminator,
}

/// A normalized reply message. Immutable once constructed.
#[derive(Debug, Clone, Serialize)]
pub struct InboundReply {
    pub endpoint: EndpointId,
    /// Subject id extracted from the text, when present.
    pub subject: Option<String>,
    /// Normalized text.
    pub text: String,
    /// Structured fields extracted from the text.
    pub fields: BTreeMap<String, String>,
    pub attachments: Vec<AttachmentRef>,
    pub received_at: DateTime<Utc>,
}

/// What a pending call resolved to. Exactly one of these is delivered per
/// call.
#[derive(Debug)]
pub enum CallResolution {
    /// The completion policy was satisfied.
    Complete(Vec<InboundReply>),
    /// Deadline reached with some, but not all, expected replies.
    Partial(Vec<InboundReply>),
    /// Deadline reached in total silence.
    NoReply,
    /// A rejection-sentinel reply arrived.
    Rejected(InboundReply),
}

/// A successfully resolved call, before aggregation.
#[derive(Debug, Clone)]
pub struct CallResult {
    /// Endpoint that actually answered.
    pub endpoint: EndpointId,
    /// Replies in transport arrival order.
    pub replies: Vec<InboundReply>,
    /// False when the deadline cut accumulation short.
    pub complete: bool,
}

/// One logical request as the dispatcher sees it.
#[derive(Debug, Clone)]
pub struct CallRequest {
    /// Full command text sent into the chat.
    pub command: String,
    /// Correlation subject filter, when the command is about one subject.
    pub subject: Option<String>,
    pub policy: CompletionPolicy,
    /// Ordered failover candidates.
    pub candidates: Vec<EndpointId>,
}

/// Substring markers classifying special replies.
#[derive(Debug, Clone, Default)]
pub struct MarkerSet {
    rejection: Vec<String>,
    terminator: Vec<String>,
}

impl MarkerSet {
    pub fn new(rejection: Vec<String>, terminator: Vec<String>) -> Self {
        Self {
            rejection,
            terminator,
        }
    }

    /// The remote refused the command itself (wrong format); waiting further
    /// is pointless.
    pub fn is_rejection(&self, text: &str) -> bool {
        self.rejection.iter().any(|marker| text.contains(marker.as_str()))
    }

    /// Final message of a terminator-delimited reply sequence.
    pub fn is_terminator(&self, text: &str) -> bool {
        self.terminator.iter().any(|marker| text.contains(marker.as_str()))
    }
}
