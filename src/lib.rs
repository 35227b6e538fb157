//! Webhook chat bot: decodes XML callbacks into typed messages, dispatches
//! them to handlers, and pushes replies back through the bot's webhook.

pub mod bot;
pub mod crypt;
pub mod dedup;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod inbound;
pub mod outbound;
pub mod registry;
pub mod server;
pub mod types;

#[cfg(test)]
mod testing;

pub use bot::Bot;
pub use crypt::{MsgCrypt, PassthroughCrypt};
pub use delivery::{HttpTransport, SendResponse, Transport, UploadResponse};
pub use dispatch::Handler;
pub use error::{CryptError, DecodeError, Error, Result};
pub use inbound::{
    AttachmentMessage, Envelope, EventMessage, ImageMessage, InboundMessage, MixedItem,
    MixedMessage, Sender, TextMessage,
};
pub use outbound::{
    FileMsg, ImageMsg, MarkdownMsg, NewsMsg, OutboundBody, OutboundMessage, Reply, TextMsg,
};
pub use registry::BotRegistry;
pub use types::{ChatType, EventType, MsgAction, MsgAttachment, MsgType, NewsArticle};
