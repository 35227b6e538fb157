use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqwest::Url;
use tracing::{debug, info};

use crate::crypt::MsgCrypt;
use crate::dedup::MsgIdCache;
use crate::delivery::{self, SendResponse, Transport, UploadResponse};
use crate::dispatch::{self, Handlers};
use crate::error::{Error, Result};
use crate::inbound::{
    AttachmentMessage, Envelope, EventMessage, ImageMessage, MixedMessage, TextMessage,
};
use crate::outbound::{FileMsg, ImageMsg, MarkdownMsg, NewsMsg, OutboundMessage, Reply, TextMsg};

#[derive(Default)]
struct Settings {
    webhook_url: Option<Url>,
    upload_url: Option<Url>,
    debug: bool,
    crypt: Option<Arc<dyn MsgCrypt>>,
}

/// One webhook bot: where it pushes messages, how it reads callbacks, and
/// what it does with them.
///
/// Obtained from [`BotRegistry::get_or_create`](crate::BotRegistry::get_or_create).
/// Configure it fully before the callback server starts taking traffic.
pub struct Bot {
    name: String,
    settings: RwLock<Settings>,
    handlers: RwLock<Handlers>,
    transport: Arc<dyn Transport>,
    seen: MsgIdCache,
}

impl Bot {
    pub(crate) fn new(name: &str, transport: Arc<dyn Transport>, dedup_capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            settings: RwLock::new(Settings::default()),
            handlers: RwLock::new(Handlers::default()),
            transport,
            seen: MsgIdCache::with_capacity(dedup_capacity),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Configuration ───────────────────────────────────────────────────────

    /// Set the webhook messages are pushed to. The media upload endpoint is
    /// derived from it.
    pub fn set_webhook_url(&self, url: &str) -> Result<&Self> {
        let webhook = delivery::parse_url(url)?;
        let upload = delivery::upload_url(&webhook)?;

        let mut settings = self.settings_mut();
        settings.webhook_url = Some(webhook);
        settings.upload_url = Some(upload);
        info!("Bot '{}' webhook configured", self.name);
        Ok(self)
    }

    pub fn webhook_url(&self) -> Option<String> {
        self.settings().webhook_url.as_ref().map(Url::to_string)
    }

    pub fn upload_url(&self) -> Option<String> {
        self.settings().upload_url.as_ref().map(Url::to_string)
    }

    /// In debug mode every push carries `debug=1`, which makes the webhook
    /// report problems in more detail.
    pub fn set_debug(&self, on: bool) -> &Self {
        self.settings_mut().debug = on;
        self
    }

    pub fn is_debug(&self) -> bool {
        self.settings().debug
    }

    /// Install the crypto gateway used to read callbacks. Required before
    /// [`Bot::router`].
    pub fn serve(&self, crypt: impl MsgCrypt + 'static) -> &Self {
        self.settings_mut().crypt = Some(Arc::new(crypt));
        self
    }

    pub(crate) fn crypt(&self) -> Option<Arc<dyn MsgCrypt>> {
        self.settings().crypt.clone()
    }

    // ── Handlers ────────────────────────────────────────────────────────────

    pub fn on_text<F, Fut>(&self, handler: F) -> &Self
    where
        F: Fn(Arc<Bot>, TextMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handlers_mut().text = Some(dispatch::handler(handler));
        self
    }

    /// Image callbacks only arrive from single chats.
    pub fn on_image<F, Fut>(&self, handler: F) -> &Self
    where
        F: Fn(Arc<Bot>, ImageMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handlers_mut().image = Some(dispatch::handler(handler));
        self
    }

    pub fn on_event<F, Fut>(&self, handler: F) -> &Self
    where
        F: Fn(Arc<Bot>, EventMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handlers_mut().event = Some(dispatch::handler(handler));
        self
    }

    /// Button clicks on markdown messages sent with attachments.
    pub fn on_attachment<F, Fut>(&self, handler: F) -> &Self
    where
        F: Fn(Arc<Bot>, AttachmentMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handlers_mut().attachment = Some(dispatch::handler(handler));
        self
    }

    pub fn on_mixed<F, Fut>(&self, handler: F) -> &Self
    where
        F: Fn(Arc<Bot>, MixedMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handlers_mut().mixed = Some(dispatch::handler(handler));
        self
    }

    pub(crate) fn handlers(&self) -> Handlers {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn first_seen(&self, msg_id: &str) -> bool {
        self.seen.first_seen(msg_id)
    }

    // ── Outbound messages ───────────────────────────────────────────────────

    pub fn text_msg(self: &Arc<Self>, content: impl Into<String>) -> TextMsg {
        TextMsg::new(Arc::clone(self), content.into())
    }

    pub fn markdown_msg(self: &Arc<Self>, content: impl Into<String>) -> MarkdownMsg {
        MarkdownMsg::new(Arc::clone(self), content.into())
    }

    pub fn image_msg(self: &Arc<Self>) -> ImageMsg {
        ImageMsg::new(Arc::clone(self))
    }

    pub fn news_msg(self: &Arc<Self>) -> NewsMsg {
        NewsMsg::new(Arc::clone(self))
    }

    pub fn file_msg(self: &Arc<Self>) -> FileMsg {
        FileMsg::new(Arc::clone(self))
    }

    /// Message builders addressed to the chat `envelope` came from.
    pub fn reply(self: &Arc<Self>, envelope: &Envelope) -> Reply {
        Reply::new(Arc::clone(self), envelope.chat_id.clone())
    }

    // ── Delivery ────────────────────────────────────────────────────────────

    /// Push a finished message to the webhook.
    pub async fn deliver(&self, message: &OutboundMessage) -> Result<SendResponse> {
        let url = {
            let settings = self.settings();
            let webhook = settings.webhook_url.as_ref().ok_or_else(|| {
                Error::usage(format!("bot '{}' has no webhook url", self.name))
            })?;
            if settings.debug {
                delivery::with_debug(webhook)
            } else {
                webhook.clone()
            }
        };

        let body = serde_json::to_vec(message).map_err(Error::Encode)?;
        debug!(
            "Bot '{}' sending {}: {}",
            self.name,
            message.msg_type(),
            String::from_utf8_lossy(&body)
        );

        let response = self.transport.post_json(url.as_str(), body).await?;
        SendResponse::parse(&response)
    }

    /// Upload a file and return the media reference a file message points at.
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadResponse> {
        let url = self
            .settings()
            .upload_url
            .clone()
            .ok_or_else(|| Error::usage(format!("bot '{}' has no webhook url", self.name)))?;

        debug!(
            "Bot '{}' uploading '{}' ({} bytes)",
            self.name,
            filename,
            bytes.len()
        );
        let response = self
            .transport
            .post_file(url.as_str(), filename, bytes)
            .await?;
        UploadResponse::parse(&response)
    }

    fn settings(&self) -> RwLockReadGuard<'_, Settings> {
        self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn settings_mut(&self) -> RwLockWriteGuard<'_, Settings> {
        self.settings.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn handlers_mut(&self) -> RwLockWriteGuard<'_, Handlers> {
        self.handlers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let settings = self.settings();
        f.debug_struct("Bot")
            .field("name", &self.name)
            .field("webhook_url", &settings.webhook_url.as_ref().map(Url::as_str))
            .field("debug", &settings.debug)
            .field("serving", &settings.crypt.is_some())
            .finish()
    }
}
