//! Telegram transport adapter.
//!
//! Thin teloxide-backed implementation of the transport seam: [`bot`] runs
//! the long-polling listener that turns responder messages into transport
//! events, [`outbound`] delivers command text to responder chats. Wire
//! protocol details stay inside teloxide.

pub mod bot;
pub mod outbound;

pub use {bot::start_listener, outbound::TelegramTransport};
