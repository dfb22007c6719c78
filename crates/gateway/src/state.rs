use std::{path::PathBuf, sync::Arc, time::Instant};

use {
    botline_channels::Transport,
    botline_common::types::EndpointId,
    botline_relay::{
        AggregatedResult, Aggregator, CallRequest, CorrelationRegistry, DispatchError, Dispatcher,
        EndpointHealthTracker,
    },
};

use crate::{archive::ArchiveSink, catalog::CommandCatalog};

/// Failures of one HTTP-level query, before status mapping.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Shared gateway state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub registry: CorrelationRegistry,
    pub health: EndpointHealthTracker,
    pub transport: Arc<dyn Transport>,
    pub catalog: Arc<CommandCatalog>,
    pub aggregator: Arc<Aggregator>,
    pub archive: Option<ArchiveSink>,
    /// All configured endpoints, in config order.
    pub endpoints: Arc<Vec<EndpointId>>,
    /// Directory served under `/files`.
    pub files_dir: PathBuf,
    pub started_at: Instant,
}

impl AppState {
    /// Run one catalog command end to end: validate, dispatch with failover,
    /// aggregate, archive (fire-and-forget).
    pub async fn run_command(
        &self,
        name: &str,
        argument: Option<&str>,
    ) -> Result<AggregatedResult, QueryError> {
        let Some(spec) = self.catalog.get(name) else {
            return Err(QueryError::UnknownCommand(name.to_string()));
        };
        spec.validate(argument).map_err(QueryError::BadRequest)?;

        let request = CallRequest {
            command: spec.command_text(argument),
            subject: spec.correlation_filter(argument),
            policy: spec.policy.clone(),
            candidates: spec.candidates.clone(),
        };
        let call = self.dispatcher.dispatch(&request).await?;
        let result = self.aggregator.aggregate(call);

        if let Some(archive) = &self.archive {
            archive.record(name, &spec.kind, &result);
        }
        Ok(result)
    }
}
