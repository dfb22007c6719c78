use std::error::Error as StdError;

/// Crate-wide result type for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed transport errors shared across transport traits.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The chat network refused the send outright (peer blocked the sender,
    /// chat unknown, payload refused). The message never left.
    #[error("send rejected: {message}")]
    Rejected { message: String },

    /// A requested endpoint id has no transport address.
    #[error("unknown endpoint: {endpoint}")]
    UnknownEndpoint { endpoint: String },

    /// Operation is currently unavailable (not configured/connected).
    #[error("transport unavailable: {message}")]
    Unavailable { message: String },

    /// Wrapped source error from an external dependency.
    #[error("transport operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn rejected(message: impl std::fmt::Display) -> Self {
        Self::Rejected {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_endpoint(endpoint: impl std::fmt::Display) -> Self {
        Self::UnknownEndpoint {
            endpoint: endpoint.to_string(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
