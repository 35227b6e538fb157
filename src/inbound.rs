//! Decoding of (already decrypted) callback payloads.
//!
//! A payload is read twice: first for the envelope every callback shares,
//! including the `MsgType` tag, and then, once the tag is known, for the
//! fields of that one message type.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::DecodeError;
use crate::types::{ChatType, EventType, MsgAttachment, MsgType};

/// Who sent the message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Sender {
    #[serde(rename = "UserId")]
    pub user_id: String,
    /// Display name.
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Alias")]
    pub alias: String,
}

/// Fields common to every callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub sender: Sender,
    /// Unique per message; the callback server uses it to drop redeliveries.
    pub msg_id: String,
    pub chat_type: ChatType,
    pub chat_id: String,
    /// Webhook the message arrived through.
    pub webhook_url: String,
    /// One-shot URL for chat details, valid for five minutes. Never present for single chats.
    pub chat_info_url: Option<String>,
    pub msg_type: MsgType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    pub envelope: Envelope,
    /// Kept verbatim when wrapped in CDATA, as the vendor sends it. Bare
    /// element text has its surrounding whitespace trimmed by the XML reader.
    pub content: String,
    /// Set when the message is a reply to a blackboard post.
    pub post_id: Option<String>,
}

/// Image callbacks are only delivered for single chats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMessage {
    pub envelope: Envelope,
    /// Not embeddable in web pages.
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    pub envelope: Envelope,
    pub event: EventType,
    /// Client version; absent for blackboard chats.
    pub app_version: Option<String>,
}

/// A click on a button of a markdown message the bot sent earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMessage {
    pub envelope: Envelope,
    pub post_id: Option<String>,
    pub attachment: MsgAttachment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedMessage {
    pub envelope: Envelope,
    pub items: Vec<MixedItem>,
}

/// One part of a mixed text/image message, in the order it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MixedItem {
    Text(String),
    /// Image URL.
    Image(String),
}

/// A decoded callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Text(TextMessage),
    Image(ImageMessage),
    Event(EventMessage),
    Attachment(AttachmentMessage),
    Mixed(MixedMessage),
}

impl InboundMessage {
    pub fn envelope(&self) -> &Envelope {
        match self {
            InboundMessage::Text(m) => &m.envelope,
            InboundMessage::Image(m) => &m.envelope,
            InboundMessage::Event(m) => &m.envelope,
            InboundMessage::Attachment(m) => &m.envelope,
            InboundMessage::Mixed(m) => &m.envelope,
        }
    }

    pub fn msg_type(&self) -> MsgType {
        self.envelope().msg_type
    }
}

/// Decode a plaintext callback payload.
pub fn decode(plaintext: &[u8]) -> Result<InboundMessage, DecodeError> {
    let xml = std::str::from_utf8(plaintext)?;
    let envelope = peek_envelope(xml)?;

    let message = match envelope.msg_type {
        MsgType::Text => {
            let raw: RawText = parse(xml)?;
            InboundMessage::Text(TextMessage {
                envelope,
                content: raw.text.content,
                post_id: non_empty(raw.post_id),
            })
        }
        MsgType::Image => {
            let raw: RawImage = parse(xml)?;
            InboundMessage::Image(ImageMessage {
                envelope,
                image_url: raw.image.image_url,
            })
        }
        MsgType::Event => {
            let raw: RawEvent = parse(xml)?;
            InboundMessage::Event(EventMessage {
                envelope,
                event: EventType::from(raw.event.event_type),
                app_version: non_empty(raw.app_version),
            })
        }
        MsgType::Attachment => {
            let raw: RawAttachment = parse(xml)?;
            InboundMessage::Attachment(AttachmentMessage {
                envelope,
                post_id: non_empty(raw.post_id),
                attachment: raw.attachment,
            })
        }
        MsgType::Mixed => {
            let raw: RawMixed = parse(xml)?;
            let items = raw
                .mixed
                .items
                .into_iter()
                .filter_map(|item| match item.msg_type.as_str() {
                    "text" => Some(MixedItem::Text(item.text.content)),
                    "image" => Some(MixedItem::Image(item.image.image_url)),
                    _ => None,
                })
                .collect();
            InboundMessage::Mixed(MixedMessage { envelope, items })
        }
    };

    Ok(message)
}

/// First pass: the shared envelope and the message type tag.
pub fn peek_envelope(xml: &str) -> Result<Envelope, DecodeError> {
    let raw: RawEnvelope = parse(xml)?;
    let msg_type = MsgType::from_tag(&raw.msg_type)
        .ok_or_else(|| DecodeError::Unsupported(raw.msg_type.clone()))?;

    Ok(Envelope {
        sender: raw.from,
        msg_id: raw.msg_id,
        chat_type: ChatType::from(raw.chat_type),
        chat_id: raw.chat_id,
        webhook_url: raw.webhook_url,
        chat_info_url: non_empty(raw.chat_info_url),
        msg_type,
    })
}

fn parse<T: DeserializeOwned>(xml: &str) -> Result<T, DecodeError> {
    Ok(quick_xml::de::from_str(xml)?)
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEnvelope {
    #[serde(rename = "From")]
    from: Sender,
    #[serde(rename = "MsgId")]
    msg_id: String,
    #[serde(rename = "ChatType")]
    chat_type: String,
    #[serde(rename = "ChatId")]
    chat_id: String,
    #[serde(rename = "WebhookUrl")]
    webhook_url: String,
    #[serde(rename = "GetChatInfoUrl")]
    chat_info_url: String,
    #[serde(rename = "MsgType")]
    msg_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawContent {
    #[serde(rename = "Content")]
    content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawImageUrl {
    #[serde(rename = "ImageUrl")]
    image_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawText {
    #[serde(rename = "Text")]
    text: RawContent,
    #[serde(rename = "PostId")]
    post_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawImage {
    #[serde(rename = "Image")]
    image: RawImageUrl,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEventBody {
    #[serde(rename = "EventType")]
    event_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEvent {
    #[serde(rename = "Event")]
    event: RawEventBody,
    #[serde(rename = "AppVersion")]
    app_version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAttachment {
    #[serde(rename = "PostId")]
    post_id: String,
    #[serde(rename = "Attachment")]
    attachment: MsgAttachment,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMixed {
    #[serde(rename = "MixedMessage")]
    mixed: RawMixedList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMixedList {
    #[serde(rename = "MsgItem")]
    items: Vec<RawMsgItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMsgItem {
    #[serde(rename = "MsgType")]
    msg_type: String,
    #[serde(rename = "Text")]
    text: RawContent,
    #[serde(rename = "Image")]
    image: RawImageUrl,
}
