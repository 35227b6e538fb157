//! Builders for messages pushed through a bot's webhook.
//!
//! Each builder accumulates its fields and is consumed by `send`, which
//! freezes it into an [`OutboundMessage`] before anything goes on the wire.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use md5::{Digest, Md5};
use serde::Serialize;
use tracing::error;

use crate::bot::Bot;
use crate::delivery::SendResponse;
use crate::error::{Error, Result};
use crate::types::{MsgAttachment, NewsArticle};

/// Most chat ids a single push may address.
pub const MAX_CHAT_IDS: usize = 100;
/// Most articles a news message may carry.
pub const MAX_ARTICLES: usize = 8;

/// A frozen message, ready to be serialized and pushed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    #[serde(rename = "msgtype")]
    msg_type: &'static str,
    #[serde(rename = "chatid", skip_serializing_if = "String::is_empty")]
    chat_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_id: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    visible_to_user: String,
    #[serde(flatten)]
    body: OutboundBody,
}

impl OutboundMessage {
    pub fn msg_type(&self) -> &'static str {
        self.msg_type
    }

    /// Target chat ids joined by `|`.
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn post_id(&self) -> Option<&str> {
        self.post_id.as_deref()
    }

    /// Users allowed to see the message, joined by `|`.
    pub fn visible_to_user(&self) -> &str {
        &self.visible_to_user
    }

    pub fn body(&self) -> &OutboundBody {
        &self.body
    }
}

/// The variant payload; serialized under its own key (`"text": {...}`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundBody {
    Text(TextBody),
    Markdown(MarkdownBody),
    Image(ImageBody),
    News(NewsBody),
    File(FileBody),
}

impl OutboundBody {
    fn msg_type(&self) -> &'static str {
        match self {
            OutboundBody::Text(_) => "text",
            OutboundBody::Markdown(_) => "markdown",
            OutboundBody::Image(_) => "image",
            OutboundBody::News(_) => "news",
            OutboundBody::File(_) => "file",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TextBody {
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mentioned_list: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mentioned_mobile_list: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarkdownBody {
    pub content: String,
    pub at_short_name: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<MsgAttachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageBody {
    pub base64: String,
    pub md5: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewsBody {
    pub articles: Vec<NewsArticle>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileBody {
    pub media_id: String,
}

/// Addressing shared by every builder.
struct MsgBase {
    bot: Arc<Bot>,
    chat_ids: Vec<String>,
    visible_to: Vec<String>,
    post_id: Option<String>,
}

impl MsgBase {
    fn new(bot: Arc<Bot>) -> Self {
        Self {
            bot,
            chat_ids: Vec::new(),
            visible_to: Vec::new(),
            post_id: None,
        }
    }

    fn freeze(self, body: OutboundBody) -> Result<(Arc<Bot>, OutboundMessage)> {
        if self.chat_ids.len() > MAX_CHAT_IDS {
            return Err(Error::usage(format!(
                "at most {} chat ids per message, got {}",
                MAX_CHAT_IDS,
                self.chat_ids.len()
            )));
        }

        let message = OutboundMessage {
            msg_type: body.msg_type(),
            chat_id: self.chat_ids.join("|"),
            post_id: self.post_id,
            visible_to_user: self.visible_to.join("|"),
            body,
        };
        Ok((self.bot, message))
    }
}

/// Setters and terminal operations every builder shares.
macro_rules! common_builder_methods {
    ($builder:ident) => {
        impl $builder {
            /// Add a target chat: a group, single chat or blackboard id from a
            /// callback, a user id, or one of the broadcast tokens in
            /// [`crate::types`]. Calls accumulate in order.
            pub fn chat_id(mut self, chat_id: impl Into<String>) -> Self {
                self.base.chat_ids.push(chat_id.into());
                self
            }

            pub fn chat_ids<I, S>(mut self, chat_ids: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.base.chat_ids.extend(chat_ids.into_iter().map(Into::into));
                self
            }

            /// Only these members see the message. Honoured when exactly one
            /// group or blackboard is targeted.
            pub fn visible_to(mut self, user_id: impl Into<String>) -> Self {
                self.base.visible_to.push(user_id.into());
                self
            }

            /// Freeze the builder without sending.
            pub fn into_message(self) -> Result<OutboundMessage> {
                self.freeze().map(|(_, message)| message)
            }

            pub async fn send(self) -> Result<SendResponse> {
                let (bot, message) = self.freeze()?;
                bot.deliver(&message).await
            }
        }
    };
}

pub struct TextMsg {
    base: MsgBase,
    body: TextBody,
}

impl TextMsg {
    pub(crate) fn new(bot: Arc<Bot>, content: String) -> Self {
        Self {
            base: MsgBase::new(bot),
            body: TextBody {
                content,
                ..Default::default()
            },
        }
    }

    /// Mention users by user id; `@all` mentions everyone.
    pub fn mention_user(mut self, user_id: impl Into<String>) -> Self {
        self.body.mentioned_list.push(user_id.into());
        self
    }

    pub fn mention_mobile(mut self, mobile: impl Into<String>) -> Self {
        self.body.mentioned_mobile_list.push(mobile.into());
        self
    }

    /// Reply under a blackboard post. Only honoured when exactly one blackboard is targeted.
    pub fn post_id(mut self, post_id: impl Into<String>) -> Self {
        self.base.post_id = Some(post_id.into());
        self
    }

    fn freeze(self) -> Result<(Arc<Bot>, OutboundMessage)> {
        self.base.freeze(OutboundBody::Text(self.body))
    }
}

common_builder_methods!(TextMsg);

pub struct MarkdownMsg {
    base: MsgBase,
    body: MarkdownBody,
}

impl MarkdownMsg {
    pub(crate) fn new(bot: Arc<Bot>, content: String) -> Self {
        Self {
            base: MsgBase::new(bot),
            body: MarkdownBody {
                content,
                ..Default::default()
            },
        }
    }

    /// Render `@user` mentions in the content with the short name.
    pub fn at_short_name(mut self) -> Self {
        self.body.at_short_name = true;
        self
    }

    /// Attach buttons. Clicks come back as attachment callbacks.
    pub fn attachment(mut self, attachment: MsgAttachment) -> Self {
        self.body.attachments.push(attachment);
        self
    }

    pub fn post_id(mut self, post_id: impl Into<String>) -> Self {
        self.base.post_id = Some(post_id.into());
        self
    }

    fn freeze(self) -> Result<(Arc<Bot>, OutboundMessage)> {
        self.base.freeze(OutboundBody::Markdown(self.body))
    }
}

common_builder_methods!(MarkdownMsg);

pub struct ImageMsg {
    base: MsgBase,
    body: ImageBody,
}

impl ImageMsg {
    pub(crate) fn new(bot: Arc<Bot>) -> Self {
        Self {
            base: MsgBase::new(bot),
            body: ImageBody::default(),
        }
    }

    /// Set the picture. The webhook accepts JPG or PNG up to 2 MB; checking
    /// that is left to the caller.
    pub fn image(mut self, bytes: &[u8]) -> Self {
        self.body = ImageBody {
            base64: STANDARD.encode(bytes),
            md5: format!("{:x}", Md5::digest(bytes)),
        };
        self
    }

    fn freeze(self) -> Result<(Arc<Bot>, OutboundMessage)> {
        if self.body.base64.is_empty() {
            return Err(Error::usage("call image(...) before sending an image message"));
        }
        self.base.freeze(OutboundBody::Image(self.body))
    }
}

common_builder_methods!(ImageMsg);

pub struct NewsMsg {
    base: MsgBase,
    body: NewsBody,
}

impl NewsMsg {
    pub(crate) fn new(bot: Arc<Bot>) -> Self {
        Self {
            base: MsgBase::new(bot),
            body: NewsBody::default(),
        }
    }

    /// Add an article. Its `url` must not be empty or the webhook rejects the message.
    pub fn article(mut self, article: NewsArticle) -> Self {
        self.body.articles.push(article);
        self
    }

    pub fn articles(mut self, articles: impl IntoIterator<Item = NewsArticle>) -> Self {
        self.body.articles.extend(articles);
        self
    }

    fn freeze(self) -> Result<(Arc<Bot>, OutboundMessage)> {
        let count = self.body.articles.len();
        if count == 0 || count > MAX_ARTICLES {
            return Err(Error::usage(format!(
                "a news message needs 1 to {} articles, got {}",
                MAX_ARTICLES, count
            )));
        }
        self.base.freeze(OutboundBody::News(self.body))
    }
}

common_builder_methods!(NewsMsg);

/// File message. Sendable only once a media reference is set, either by a
/// successful [`FileMsg::file`] upload or by [`FileMsg::media_id`].
pub struct FileMsg {
    base: MsgBase,
    body: FileBody,
}

impl FileMsg {
    pub(crate) fn new(bot: Arc<Bot>) -> Self {
        Self {
            base: MsgBase::new(bot),
            body: FileBody::default(),
        }
    }

    /// Upload `bytes` (5 B to 20 MB) and keep the returned media reference.
    ///
    /// A failed upload is logged and leaves the builder without a reference,
    /// so a later `send` fails with a usage error.
    pub async fn file(mut self, filename: &str, bytes: impl Into<Vec<u8>>) -> Self {
        match self.base.bot.upload(filename, bytes.into()).await {
            Ok(uploaded) => self.body.media_id = uploaded.media_id,
            Err(e) => error!(
                "Bot '{}' failed to upload '{}': {}",
                self.base.bot.name(),
                filename,
                e
            ),
        }
        self
    }

    /// Use a media reference from an earlier upload.
    pub fn media_id(mut self, media_id: impl Into<String>) -> Self {
        self.body.media_id = media_id.into();
        self
    }

    pub fn has_media(&self) -> bool {
        !self.body.media_id.is_empty()
    }

    fn freeze(self) -> Result<(Arc<Bot>, OutboundMessage)> {
        if self.body.media_id.is_empty() {
            return Err(Error::usage(
                "no media reference: call file(...) first and check the log if the upload failed",
            ));
        }
        self.base.freeze(OutboundBody::File(self.body))
    }
}

common_builder_methods!(FileMsg);

/// Builders pre-addressed to the chat a callback came from.
pub struct Reply {
    bot: Arc<Bot>,
    chat_id: String,
}

impl Reply {
    pub(crate) fn new(bot: Arc<Bot>, chat_id: String) -> Self {
        Self { bot, chat_id }
    }

    pub fn text(&self, content: impl Into<String>) -> TextMsg {
        self.bot.text_msg(content).chat_id(self.chat_id.clone())
    }

    pub fn markdown(&self, content: impl Into<String>) -> MarkdownMsg {
        self.bot.markdown_msg(content).chat_id(self.chat_id.clone())
    }

    pub fn image(&self) -> ImageMsg {
        self.bot.image_msg().chat_id(self.chat_id.clone())
    }

    pub fn news(&self) -> NewsMsg {
        self.bot.news_msg().chat_id(self.chat_id.clone())
    }

    pub fn file(&self) -> FileMsg {
        self.bot.file_msg().chat_id(self.chat_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_bot, RecordingTransport};
    use crate::types::{MsgAction, ALL_GROUPS};
    use serde_json::json;

    fn article(n: usize) -> NewsArticle {
        NewsArticle {
            title: format!("title {n}"),
            description: "desc".to_string(),
            url: "https://www.qq.com/".to_string(),
            pic_url: "http://res.mail.qq.com/pic.png".to_string(),
        }
    }

    #[test]
    fn test_chat_ids_accumulate_in_call_order() {
        let bot = test_bot(RecordingTransport::ok());
        let message = bot
            .text_msg("hello")
            .chat_id("chat-a")
            .chat_id("chat-b")
            .visible_to("u1")
            .visible_to("u2")
            .into_message()
            .unwrap();

        assert_eq!(message.chat_id(), "chat-a|chat-b");
        assert_eq!(message.visible_to_user(), "u1|u2");
    }

    #[test]
    fn test_text_wire_shape() {
        let bot = test_bot(RecordingTransport::ok());
        let message = bot
            .text_msg("hello")
            .chat_id(ALL_GROUPS)
            .mention_user("zhangsan")
            .mention_mobile("13800001111")
            .post_id("post-1")
            .into_message()
            .unwrap();

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "msgtype": "text",
                "chatid": "@all_group",
                "post_id": "post-1",
                "text": {
                    "content": "hello",
                    "mentioned_list": ["zhangsan"],
                    "mentioned_mobile_list": ["13800001111"]
                }
            })
        );
    }

    #[test]
    fn test_unaddressed_message_omits_optional_fields() {
        let bot = test_bot(RecordingTransport::ok());
        let message = bot.text_msg("hi").into_message().unwrap();
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"msgtype": "text", "text": {"content": "hi"}})
        );
    }

    #[test]
    fn test_too_many_chat_ids_is_usage_error() {
        let bot = test_bot(RecordingTransport::ok());
        let ids = (0..=MAX_CHAT_IDS).map(|i| format!("chat-{i}"));
        let err = bot.text_msg("hi").chat_ids(ids).into_message().unwrap_err();
        assert!(matches!(err, Error::Usage(_)));

        let ids = (0..MAX_CHAT_IDS).map(|i| format!("chat-{i}"));
        assert!(bot.text_msg("hi").chat_ids(ids).into_message().is_ok());
    }

    #[test]
    fn test_image_encoding_is_deterministic() {
        let bot = test_bot(RecordingTransport::ok());
        let body = |bytes: &[u8]| match bot.image_msg().image(bytes).into_message().unwrap().body() {
            OutboundBody::Image(image) => image.clone(),
            other => panic!("expected image body, got {other:?}"),
        };

        let first = body(b"hello");
        let second = body(b"hello");
        assert_eq!(first, second);
        assert_eq!(first.base64, "aGVsbG8=");
        assert_eq!(first.md5, "5d41402abc4b2a76b9719d911017c592");

        let other = body(b"hello!");
        assert_ne!(first.md5, other.md5);
    }

    #[test]
    fn test_image_without_content_is_usage_error() {
        let bot = test_bot(RecordingTransport::ok());
        assert!(matches!(
            bot.image_msg().into_message(),
            Err(Error::Usage(_))
        ));
    }

    #[test]
    fn test_news_article_bounds() {
        let bot = test_bot(RecordingTransport::ok());
        assert!(matches!(
            bot.news_msg().into_message(),
            Err(Error::Usage(_))
        ));
        assert!(matches!(
            bot.news_msg().articles((0..9).map(article)).into_message(),
            Err(Error::Usage(_))
        ));

        let message = bot
            .news_msg()
            .article(article(1))
            .article(article(2))
            .into_message()
            .unwrap();
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["msgtype"], "news");
        assert_eq!(json["news"]["articles"][1]["title"], "title 2");
        assert_eq!(
            json["news"]["articles"][0]["picurl"],
            "http://res.mail.qq.com/pic.png"
        );
    }

    #[tokio::test]
    async fn test_file_send_without_upload_makes_no_calls() {
        let transport = RecordingTransport::ok();
        let bot = test_bot(transport.clone());

        let err = bot.file_msg().send().await.unwrap_err();

        assert!(matches!(err, Error::Usage(_)));
        assert_eq!(transport.json_calls(), 0);
        assert_eq!(transport.file_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_file_unsendable() {
        let transport = RecordingTransport::uploading(br#"{"errcode":40004,"errmsg":"invalid media type"}"#);
        let bot = test_bot(transport.clone());

        let file = bot.file_msg().file("report.exe", b"MZ\x90\x00\x03".to_vec()).await;
        assert!(!file.has_media());

        let err = file.send().await.unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
        assert_eq!(transport.file_calls(), 1);
        assert_eq!(transport.json_calls(), 0);
    }

    #[tokio::test]
    async fn test_file_upload_then_send() {
        let transport = RecordingTransport::uploading(
            br#"{"errcode":0,"errmsg":"ok","type":"file","media_id":"media-9","created_at":1380000000}"#,
        );
        let bot = test_bot(transport.clone());

        bot.file_msg()
            .chat_id("chat-a")
            .file("report.docx", b"quarterly numbers".to_vec())
            .await
            .send()
            .await
            .unwrap();

        let uploads = transport.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(
            uploads[0].0,
            "https://example.com/hook/upload_media?key=k&type=file"
        );
        assert_eq!(uploads[0].1, "report.docx");
        assert_eq!(uploads[0].2, b"quarterly numbers");

        assert_eq!(
            transport.sent(),
            vec![json!({
                "msgtype": "file",
                "chatid": "chat-a",
                "file": {"media_id": "media-9"}
            })]
        );
    }

    #[tokio::test]
    async fn test_markdown_actions_survive_the_wire() {
        let transport = RecordingTransport::ok();
        let bot = test_bot(transport.clone());
        let poll = MsgAttachment::new("size-poll")
            .action(MsgAction::button("name1", "111", "展示文本1").replace_text("已点击1"))
            .action(
                MsgAction::button("name2", "222", "展示文本2")
                    .replace_text("已点击2")
                    .colors("4A90E2", "FFFFFF"),
            );
        let follow_up = MsgAttachment::new("follow-up")
            .action(MsgAction::button("again", "yes", "Ask again"));

        bot.markdown_msg("**Pick a size**")
            .at_short_name()
            .attachment(poll.clone())
            .attachment(follow_up.clone())
            .send()
            .await
            .unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0]["msgtype"], "markdown");
        assert_eq!(sent[0]["markdown"]["at_short_name"], true);
        let echoed: Vec<MsgAttachment> =
            serde_json::from_value(sent[0]["markdown"]["attachments"].clone()).unwrap();
        assert_eq!(echoed, vec![poll, follow_up]);
    }

    #[tokio::test]
    async fn test_reply_targets_callback_chat() {
        let transport = RecordingTransport::ok();
        let bot = test_bot(transport.clone());
        let envelope = crate::inbound::peek_envelope(
            "<xml><ChatId>group-7</ChatId><MsgType>text</MsgType></xml>",
        )
        .unwrap();

        bot.reply(&envelope).text("got it").send().await.unwrap();

        assert_eq!(transport.sent()[0]["chatid"], "group-7");
    }
}
