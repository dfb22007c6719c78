use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use {
    axum::{
        Router,
        routing::{get, post},
    },
    tokio_util::sync::CancellationToken,
    tower_http::services::ServeDir,
    tracing::{info, warn},
};

use {
    botline_channels::Transport,
    botline_common::types::EndpointId,
    botline_config::schema::{BotlineConfig, NormalizerConfig},
    botline_relay::{
        Aggregator, CorrelationRegistry, DispatchTiming, Dispatcher, EndpointHealthTracker,
        MarkerSet, MessageNormalizer, NormalizerSpec, ReplyRouter,
    },
    botline_telegram::TelegramTransport,
};

use crate::{
    archive::ArchiveSink, attachments::FsAttachmentStore, catalog::CommandCatalog, routes,
    state::AppState,
};

/// A fully wired gateway: transport listening, replies routing, dispatcher
/// ready. Dropping the token stops the transport listener.
pub struct GatewayRuntime {
    pub state: AppState,
    pub cancel: CancellationToken,
}

/// Wire the whole stack from config: telegram transport, attachment store,
/// reply router, relay core, command catalog.
pub async fn build_runtime(config: &BotlineConfig) -> anyhow::Result<GatewayRuntime> {
    anyhow::ensure!(
        !config.endpoints.is_empty(),
        "at least one endpoint must be configured"
    );
    let endpoints: Vec<EndpointId> = config
        .endpoints
        .iter()
        .map(|endpoint| EndpointId::new(&endpoint.id))
        .collect();

    let catalog = Arc::new(CommandCatalog::from_config(&config.commands, &endpoints)?);
    if catalog.is_empty() {
        warn!("no commands configured; only /api/send and /api/status will be useful");
    }

    let health = EndpointHealthTracker::new(Duration::from_secs(
        config.relay.cooldown_hours * 3600,
    ));
    let markers = MarkerSet::new(
        config.normalizer.rejection_markers.clone(),
        config.normalizer.terminator_markers.clone(),
    );
    let registry = CorrelationRegistry::new(markers, config.relay.inbox_capacity, health.clone());
    let normalizer = Arc::new(MessageNormalizer::compile(&normalizer_spec(
        &config.normalizer,
    ))?);

    let public_url = config.server.resolved_public_url();
    let files_dir = std::path::PathBuf::from(&config.server.downloads_dir);
    let store = Arc::new(FsAttachmentStore::new(files_dir.clone(), public_url)?);

    let chats: HashMap<i64, EndpointId> = config
        .endpoints
        .iter()
        .map(|endpoint| (endpoint.chat_id, EndpointId::new(&endpoint.id)))
        .collect();
    let (events_tx, events_rx) = tokio::sync::mpsc::channel(256);
    let (bot, cancel) =
        botline_telegram::start_listener(&config.telegram, chats, store, events_tx).await?;
    let transport: Arc<dyn Transport> = Arc::new(TelegramTransport::new(
        bot,
        config
            .endpoints
            .iter()
            .map(|endpoint| (EndpointId::new(&endpoint.id), endpoint.chat_id)),
    ));

    tokio::spawn(ReplyRouter::new(registry.clone(), normalizer).run(events_rx));

    let timing = DispatchTiming {
        short_timeout: Duration::from_secs(config.relay.short_timeout_secs),
        total_timeout: Duration::from_secs(config.relay.total_timeout_secs),
    };
    let dispatcher = Arc::new(Dispatcher::new(
        transport.clone(),
        registry.clone(),
        health.clone(),
        timing,
    ));
    let aggregator = Arc::new(Aggregator::new(
        config.relay.separator.clone(),
        config.relay.promote_fields.clone(),
    ));
    let archive = if config.archive.enabled {
        Some(ArchiveSink::new(&config.archive)?)
    } else {
        None
    };

    Ok(GatewayRuntime {
        state: AppState {
            dispatcher,
            registry,
            health,
            transport,
            catalog,
            aggregator,
            archive,
            endpoints: Arc::new(endpoints),
            files_dir,
            started_at: Instant::now(),
        },
        cancel,
    })
}

/// Assemble the HTTP router over prepared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/api/query/{command}", get(routes::query_handler))
        .route("/api/status", get(routes::status_handler))
        .route("/api/inbox", get(routes::inbox_handler))
        .route("/api/send", post(routes::send_handler))
        .nest_service("/files", ServeDir::new(state.files_dir.clone()))
        .with_state(state)
}

/// Build the runtime and serve until shutdown.
pub async fn start_gateway(config: BotlineConfig) -> anyhow::Result<()> {
    let bind = config.server.bind.clone();
    let port = config.server.port;

    let runtime = build_runtime(&config).await?;
    let app = build_router(runtime.state);

    let listener = tokio::net::TcpListener::bind((bind.as_str(), port)).await?;
    info!(addr = %listener.local_addr()?, "botline gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Bridge the serde config section into the relay's plain rule struct.
fn normalizer_spec(config: &NormalizerConfig) -> NormalizerSpec {
    NormalizerSpec {
        rewrite_pattern: config.rewrite_pattern.clone(),
        rewrite_with: config.rewrite_with.clone(),
        strip_patterns: config.strip_patterns.clone(),
        field_rules: config
            .fields
            .iter()
            .map(|rule| (rule.name.clone(), rule.pattern.clone()))
            .collect(),
        subject_field: config.subject_field.clone(),
        tag_field: config.tag_field.clone(),
    }
}
