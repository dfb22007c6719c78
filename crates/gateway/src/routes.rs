use {
    axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        response::{IntoResponse, Json, Response},
    },
    serde::Deserialize,
    tracing::info,
};

use {
    botline_common::types::EndpointId,
    botline_relay::{AggregatedResult, DispatchError},
};

use crate::state::{AppState, QueryError};

/// Service banner.
pub async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "botline",
        "commands": state.catalog.names(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    /// Subject id the command is about (validated per catalog entry).
    pub subject: Option<String>,
    /// Free-form argument for commands that are not subject-bound.
    pub query: Option<String>,
}

/// `GET /api/query/{command}`: run one catalog command.
pub async fn query_handler(
    Path(command): Path<String>,
    Query(params): Query<QueryParams>,
    State(state): State<AppState>,
) -> Result<Json<AggregatedResult>, QueryError> {
    let argument = params.subject.as_deref().or(params.query.as_deref());
    info!(command = %command, argument = ?argument, "query received");
    state.run_command(&command, argument).await.map(Json)
}

/// `GET /api/status`: endpoint health, transport probe, queue depths.
pub async fn status_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let transport = state.transport.probe().await;
    Json(serde_json::json!({
        "status": "ok",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "transport": {
            "name": state.transport.name(),
            "health": transport,
        },
        "endpoints": state.health.snapshot(&state.endpoints),
        "pending_calls": state.registry.pending_count(),
        "inbox": state.registry.inbox_snapshot().len(),
    }))
}

/// `GET /api/inbox`: replies no pending call claimed, most recent first.
pub async fn inbox_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let replies = state.registry.inbox_snapshot();
    Json(serde_json::json!({
        "quantity": replies.len(),
        "replies": replies,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub endpoint: String,
    pub text: String,
}

/// `POST /api/send`: raw passthrough send, outside the correlation engine.
pub async fn send_handler(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> Response {
    let endpoint = EndpointId::from(request.endpoint.as_str());
    match state.transport.send(&endpoint, &request.text).await {
        Ok(()) => Json(serde_json::json!({
            "status": "sent",
            "endpoint": endpoint,
        }))
        .into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, &e.to_string()),
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = match &self {
            QueryError::UnknownCommand(_) => StatusCode::NOT_FOUND,
            QueryError::BadRequest(_) => StatusCode::BAD_REQUEST,
            QueryError::Dispatch(e) => match e {
                DispatchError::NoResponseTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                DispatchError::EndpointUnreachable { .. }
                | DispatchError::AllEndpointsExhausted => StatusCode::BAD_GATEWAY,
                DispatchError::RemoteFormatError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            },
        };
        error_response(status, &self.to_string())
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "status": "error",
            "message": message,
        })),
    )
        .into_response()
}
