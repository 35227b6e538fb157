use serde::{Deserialize, Serialize};

/// Broadcast to every group the bot is in.
pub const ALL_GROUPS: &str = "@all_group";
/// Broadcast a single-chat message to every subscribed member.
pub const ALL_SUBSCRIBERS: &str = "@all_subscriber";
/// Broadcast to every blackboard.
pub const ALL_BLACKBOARDS: &str = "@all_blackboard";
/// Broadcast to every group and every subscriber.
pub const ALL: &str = "@all";

/// Inbound message type tag (`MsgType` element of a callback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    Text,
    Image,
    Event,
    Attachment,
    Mixed,
}

impl MsgType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "text" => Some(MsgType::Text),
            "image" => Some(MsgType::Image),
            "event" => Some(MsgType::Event),
            "attachment" => Some(MsgType::Attachment),
            "mixed" => Some(MsgType::Mixed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MsgType::Text => "text",
            MsgType::Image => "image",
            MsgType::Event => "event",
            MsgType::Attachment => "attachment",
            MsgType::Mixed => "mixed",
        }
    }
}

impl std::fmt::Display for MsgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of conversation a callback originated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatType {
    Single,
    Group,
    Blackboard,
    BlackboardReply,
    /// A tag this crate does not know, kept verbatim.
    Other(String),
}

impl ChatType {
    pub fn as_str(&self) -> &str {
        match self {
            ChatType::Single => "single",
            ChatType::Group => "group",
            ChatType::Blackboard => "blackboard",
            ChatType::BlackboardReply => "blackboard_reply",
            ChatType::Other(tag) => tag,
        }
    }
}

impl From<String> for ChatType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "single" => ChatType::Single,
            "group" => ChatType::Group,
            "blackboard" => ChatType::Blackboard,
            "blackboard_reply" => ChatType::BlackboardReply,
            _ => ChatType::Other(tag),
        }
    }
}

/// Event carried by an `event` callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    /// The bot was added to a chat.
    AddToChat,
    /// The bot was removed from a chat.
    DeleteFromChat,
    /// A user opened a single chat with the bot.
    EnterChat,
    Other(String),
}

impl From<String> for EventType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "add_to_chat" => EventType::AddToChat,
            "delete_from_chat" => EventType::DeleteFromChat,
            "enter_chat" => EventType::EnterChat,
            _ => EventType::Other(tag),
        }
    }
}

/// Interactive buttons attached to a markdown message.
///
/// The same value travels out as JSON (`callback_id`, `actions`) and comes
/// back inside the XML click callback (`CallbackId`, `Actions`), so the field
/// names accept both spellings on the way in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsgAttachment {
    #[serde(alias = "CallbackId")]
    pub callback_id: String,
    #[serde(alias = "Actions")]
    pub actions: Vec<MsgAction>,
}

impl MsgAttachment {
    pub fn new(callback_id: impl Into<String>) -> Self {
        Self {
            callback_id: callback_id.into(),
            actions: Vec::new(),
        }
    }

    pub fn action(mut self, action: MsgAction) -> Self {
        self.actions.push(action);
        self
    }
}

/// One button of a [`MsgAttachment`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsgAction {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Value")]
    pub value: String,
    /// Label shown on the button.
    #[serde(alias = "Text")]
    pub text: String,
    /// Only `button` is accepted by the webhook today.
    #[serde(rename = "type", alias = "Type")]
    pub kind: String,
    #[serde(alias = "BorderColor")]
    pub border_color: String,
    #[serde(alias = "TextColor")]
    pub text_color: String,
    /// Label that replaces the button once clicked.
    #[serde(alias = "ReplaceText")]
    pub replace_text: String,
}

impl MsgAction {
    pub fn button(name: impl Into<String>, value: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            text: text.into(),
            kind: "button".to_string(),
            ..Default::default()
        }
    }

    pub fn replace_text(mut self, text: impl Into<String>) -> Self {
        self.replace_text = text.into();
        self
    }

    pub fn colors(mut self, border: impl Into<String>, text: impl Into<String>) -> Self {
        self.border_color = border.into();
        self.text_color = text.into();
        self
    }
}

/// One entry of a news message. The webhook rejects articles with an empty `url`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: String,
    pub url: String,
    #[serde(rename = "picurl")]
    pub pic_url: String,
}
