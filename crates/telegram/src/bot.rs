use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    secrecy::ExposeSecret,
    teloxide::{
        prelude::*,
        types::{AllowedUpdate, Message, UpdateKind},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {
    botline_channels::{AttachmentStore, TransportEvent},
    botline_common::types::EndpointId,
    botline_config::schema::TelegramConfig,
};

/// Connect the bot and start the long-polling listener.
///
/// Only messages from chats in `endpoints` are forwarded; everything else in
/// the update stream is ignored. Attachments are downloaded and persisted
/// through `store` before the event is pushed, so consumers never block on
/// media I/O. Returns the connected [`Bot`] (for the outbound side) and a
/// token that stops the listener.
pub async fn start_listener(
    config: &TelegramConfig,
    endpoints: HashMap<i64, EndpointId>,
    store: Arc<dyn AttachmentStore>,
    events: tokio::sync::mpsc::Sender<TransportEvent>,
) -> anyhow::Result<(Bot, CancellationToken)> {
    anyhow::ensure!(
        !config.token.expose_secret().is_empty(),
        "telegram bot token is required"
    );

    // Client timeout must exceed the long-polling timeout so the HTTP client
    // doesn't abort the request before Telegram responds.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(config.client_timeout_secs))
        .build()?;
    let bot = Bot::with_client(config.token.expose_secret(), client);

    let me = bot.get_me().await?;
    bot.delete_webhook().send().await?;
    info!(
        username = ?me.username,
        responder_chats = endpoints.len(),
        "telegram transport connected (webhook cleared)"
    );

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let poll_bot = bot.clone();
    let poll_timeout = u32::try_from(config.poll_timeout_secs).unwrap_or(30);

    tokio::spawn(async move {
        let mut offset: i32 = 0;

        loop {
            if cancel_clone.is_cancelled() {
                info!("telegram polling stopped");
                break;
            }

            let result = poll_bot
                .get_updates()
                .offset(offset)
                .timeout(poll_timeout)
                .allowed_updates(vec![AllowedUpdate::Message])
                .await;

            match result {
                Ok(updates) => {
                    for update in updates {
                        offset = update.id.as_offset();
                        let UpdateKind::Message(msg) = update.kind else {
                            continue;
                        };
                        let Some(endpoint) = endpoints.get(&msg.chat.id.0) else {
                            debug!(chat_id = msg.chat.id.0, "ignoring message from unknown chat");
                            continue;
                        };

                        match build_event(&poll_bot, endpoint, &msg, store.as_ref()).await {
                            Ok(event) => {
                                if events.send(event).await.is_err() {
                                    warn!("event channel closed, stopping telegram polling");
                                    return;
                                }
                            },
                            Err(e) => {
                                warn!(endpoint = %endpoint, error = %e, "failed to build transport event");
                            },
                        }
                    }
                },
                Err(e) => {
                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                },
            }
        }
    });

    Ok((bot, cancel))
}

/// Turn one responder message into a transport event, persisting any media.
async fn build_event(
    bot: &Bot,
    endpoint: &EndpointId,
    msg: &Message,
    store: &dyn AttachmentStore,
) -> anyhow::Result<TransportEvent> {
    let raw_text = msg
        .text()
        .or_else(|| msg.caption())
        .unwrap_or_default()
        .to_string();

    let mut attachments = Vec::new();

    // Telegram photos come in several sizes; keep the largest.
    if let Some(sizes) = msg.photo()
        && let Some(photo) = sizes.last()
    {
        let bytes = download_file(bot, &photo.file.id).await?;
        attachments.push(store.store(&bytes, ".jpg", "file").await?);
    }

    if let Some(document) = msg.document() {
        let extension = document
            .file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| format!(".{ext}"))
            .unwrap_or_else(|| ".bin".to_string());
        let bytes = download_file(bot, &document.file.id).await?;
        attachments.push(store.store(&bytes, &extension, "file").await?);
    }

    Ok(TransportEvent {
        endpoint: endpoint.clone(),
        raw_text,
        timestamp: chrono::Utc::now(),
        attachments,
    })
}

async fn download_file(bot: &Bot, file_id: &str) -> anyhow::Result<Vec<u8>> {
    let file = bot.get_file(file_id).await?;

    // Telegram file URL format: https://api.telegram.org/file/bot<token>/<file_path>
    let url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    );
    let response = reqwest::get(&url).await?;
    if !response.status().is_success() {
        anyhow::bail!("failed to download file: HTTP {}", response.status());
    }
    Ok(response.bytes().await?.to_vec())
}
