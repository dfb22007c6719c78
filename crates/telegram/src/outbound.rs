use std::collections::HashMap;

use {
    async_trait::async_trait,
    teloxide::{RequestError, prelude::*, types::ChatId},
    tracing::debug,
};

use {
    botline_channels::{Error, Result, Transport, TransportHealth},
    botline_common::types::EndpointId,
};

/// Outbound command sender over the Telegram Bot API.
pub struct TelegramTransport {
    bot: Bot,
    chats: HashMap<EndpointId, ChatId>,
}

impl TelegramTransport {
    pub fn new(bot: Bot, endpoints: impl IntoIterator<Item = (EndpointId, i64)>) -> Self {
        Self {
            bot,
            chats: endpoints
                .into_iter()
                .map(|(id, chat_id)| (id, ChatId(chat_id)))
                .collect(),
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, endpoint: &EndpointId, text: &str) -> Result<()> {
        let chat = self
            .chats
            .get(endpoint)
            .ok_or_else(|| Error::unknown_endpoint(endpoint))?;

        debug!(endpoint = %endpoint, chat_id = chat.0, "sending telegram message");
        self.bot
            .send_message(*chat, text)
            .await
            .map_err(map_send_error)?;
        Ok(())
    }

    async fn probe(&self) -> TransportHealth {
        match self.bot.get_me().await {
            Ok(me) => TransportHealth {
                connected: true,
                details: Some(format!(
                    "Bot: @{}",
                    me.username.as_deref().unwrap_or("unknown")
                )),
            },
            Err(e) => TransportHealth {
                connected: false,
                details: Some(format!("API error: {e}")),
            },
        }
    }
}

/// An API-level refusal means the message never left; everything else is an
/// infrastructure error.
fn map_send_error(error: RequestError) -> Error {
    match error {
        // BotBlocked, ChatNotFound, flood limits — the API answered "no".
        RequestError::Api(api) => Error::rejected(api),
        other => Error::external("telegram send", other),
    }
}
