use std::time::Duration;

use botline_common::types::EndpointId;

/// Terminal dispatch failures surfaced to callers.
///
/// Per-attempt failures are absorbed by the failover loop; only these reach
/// the outside. A degraded (partial) resolution is NOT an error; it comes
/// back as a [`crate::types::CallResult`] with `complete = false`.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The transport refused the send outright; no waiting happened.
    #[error("endpoint {endpoint} unreachable: {reason}")]
    EndpointUnreachable {
        endpoint: EndpointId,
        reason: String,
    },

    /// The deadline elapsed without a single reply. The endpoint is now in
    /// cooldown.
    #[error("no response from {endpoint} within {}s", waited.as_secs())]
    NoResponseTimeout {
        endpoint: EndpointId,
        waited: Duration,
    },

    /// The remote rejected the command format. Terminal: retrying another
    /// endpoint would fail the same way.
    #[error("remote rejected the command format: {message}")]
    RemoteFormatError {
        endpoint: EndpointId,
        message: String,
    },

    /// Every candidate was blocked or failed.
    #[error("all candidate endpoints are blocked or failed")]
    AllEndpointsExhausted,
}
