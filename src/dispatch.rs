//! Routing of decoded callbacks to handlers.
//!
//! Every message type has one optional handler slot. An empty slot falls
//! back to the built-in default for that type.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::bot::Bot;
use crate::delivery::SendResponse;
use crate::error::Result;
use crate::inbound::{
    AttachmentMessage, EventMessage, ImageMessage, InboundMessage, MixedItem, MixedMessage,
    TextMessage,
};
use crate::types::EventType;

/// A registered callback handler.
pub type Handler<M> = Arc<dyn Fn(Arc<Bot>, M) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct Handlers {
    pub(crate) text: Option<Handler<TextMessage>>,
    pub(crate) image: Option<Handler<ImageMessage>>,
    pub(crate) event: Option<Handler<EventMessage>>,
    pub(crate) attachment: Option<Handler<AttachmentMessage>>,
    pub(crate) mixed: Option<Handler<MixedMessage>>,
}

pub(crate) fn handler<M, F, Fut>(f: F) -> Handler<M>
where
    M: 'static,
    F: Fn(Arc<Bot>, M) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |bot, msg| f(bot, msg).boxed())
}

/// Run the dispatch on its own task and return immediately.
///
/// Dispatches are independent: nothing orders two messages from the same
/// chat, and a slow or failing handler does not hold up the caller.
pub fn spawn(bot: Arc<Bot>, message: InboundMessage) -> JoinHandle<()> {
    tokio::spawn(dispatch(bot, message))
}

/// Hand `message` to the handler registered for its type, or to the default.
pub async fn dispatch(bot: Arc<Bot>, message: InboundMessage) {
    let handlers = bot.handlers();

    match message {
        InboundMessage::Text(msg) => match handlers.text {
            Some(handler) => handler(bot, msg).await,
            None => default_text(bot, msg).await,
        },
        InboundMessage::Image(msg) => match handlers.image {
            Some(handler) => handler(bot, msg).await,
            None => default_image(bot, msg).await,
        },
        InboundMessage::Event(msg) => match handlers.event {
            Some(handler) => handler(bot, msg).await,
            None => default_event(&bot, &msg),
        },
        InboundMessage::Attachment(msg) => match handlers.attachment {
            Some(handler) => handler(bot, msg).await,
            None => default_attachment(bot, msg).await,
        },
        InboundMessage::Mixed(msg) => match handlers.mixed {
            Some(handler) => handler(bot, msg).await,
            None => default_mixed(bot, msg).await,
        },
    }
}

// ── Defaults ────────────────────────────────────────────────────────────────

fn default_event(bot: &Bot, msg: &EventMessage) {
    let from = &msg.envelope.sender;
    match &msg.event {
        EventType::EnterChat => info!(
            "User [{}][{}] entered a single chat with bot [{}]",
            from.user_id,
            from.name,
            bot.name()
        ),
        EventType::AddToChat => info!(
            "User [{}][{}] added bot [{}] to chat {}",
            from.user_id,
            from.name,
            bot.name(),
            msg.envelope.chat_id
        ),
        EventType::DeleteFromChat => info!(
            "User [{}][{}] removed bot [{}] from chat {}",
            from.user_id,
            from.name,
            bot.name(),
            msg.envelope.chat_id
        ),
        EventType::Other(tag) => info!("Bot [{}] ignoring event '{}'", bot.name(), tag),
    }
}

async fn default_text(bot: Arc<Bot>, msg: TextMessage) {
    let result = bot.reply(&msg.envelope).text(msg.content).send().await;
    log_failed_reply(&bot, "text", result);
}

async fn default_image(bot: Arc<Bot>, msg: ImageMessage) {
    let result = bot.reply(&msg.envelope).text(msg.image_url).send().await;
    log_failed_reply(&bot, "image", result);
}

async fn default_attachment(bot: Arc<Bot>, msg: AttachmentMessage) {
    let result = bot
        .reply(&msg.envelope)
        .text(attachment_summary(&msg))
        .send()
        .await;
    log_failed_reply(&bot, "attachment", result);
}

async fn default_mixed(bot: Arc<Bot>, msg: MixedMessage) {
    let result = bot
        .reply(&msg.envelope)
        .text(mixed_summary(&msg.items))
        .send()
        .await;
    log_failed_reply(&bot, "mixed", result);
}

fn log_failed_reply(bot: &Bot, kind: &str, result: Result<SendResponse>) {
    if let Err(e) = result {
        error!("Bot [{}] default {} reply failed: {}", bot.name(), kind, e);
    }
}

/// `[name]选择了选项[a]-(value:1)选项[b]-(value:2)`
fn attachment_summary(msg: &AttachmentMessage) -> String {
    let mut content = format!("[{}]选择了", msg.envelope.sender.name);
    for action in &msg.attachment.actions {
        content.push_str(&format!("选项[{}]-(value:{})", action.name, action.value));
    }
    content
}

/// One line per item, each preceded by a newline.
fn mixed_summary(items: &[MixedItem]) -> String {
    let mut content = String::new();
    for item in items {
        match item {
            MixedItem::Text(text) => content.push_str(&format!("\n收到:{}", text)),
            MixedItem::Image(url) => content.push_str(&format!("\n收到图片:{}", url)),
        }
    }
    content
}
