//! Typed views over Telegram JSON.
//!
//! Every field defaults when missing, so a failed call (which yields
//! `Value::Null`) still parses into a value, just one with zero ids.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        if !self.first_name.is_empty() {
            &self.first_name
        } else if let Some(username) = &self.username {
            username
        } else {
            "Anonymous"
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: User,
    pub text: String,
    pub caption: String,
    pub reply_to_message: Option<Box<Message>>,
}

impl Message {
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// The platform id, or `None` when the call that produced this message
    /// failed.
    pub fn id(&self) -> Option<i64> {
        (self.message_id != 0).then_some(self.message_id)
    }

    pub fn content(&self) -> &str {
        if self.text.is_empty() {
            &self.caption
        } else {
            &self.text
        }
    }

    pub fn reply_to_message_id(&self) -> Option<i64> {
        self.reply_to_message.as_ref().and_then(|message| message.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateKind {
    Message,
    /// A keyboard press; carries the callback query id to acknowledge.
    CallbackQuery(String),
    /// A later edit of a message that was already handled.
    Edited,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub update_id: i64,
    pub message: Message,
    pub kind: UpdateKind,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawUpdate {
    message: Option<Message>,
    edited_message: Option<Message>,
    callback_query: Option<RawCallbackQuery>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCallbackQuery {
    id: String,
    from: User,
    message: Option<Message>,
    data: String,
}

impl Update {
    /// Builds an update from one `getUpdates` entry.
    ///
    /// A callback query becomes a message in the chat holding the keyboard,
    /// sent by whoever pressed the button, whose text is the callback data.
    /// The update id is read before the typed parse, so an entry whose body
    /// does not parse still advances the polling offset.
    pub fn from_value(value: Value) -> Self {
        let update_id = value
            .get("update_id")
            .and_then(Value::as_i64)
            .unwrap_or_default();
        let raw: RawUpdate = serde_json::from_value(value).unwrap_or_default();

        if let Some(message) = raw.message {
            return Update {
                update_id,
                message,
                kind: UpdateKind::Message,
            };
        }

        if let Some(message) = raw.edited_message {
            return Update {
                update_id,
                message,
                kind: UpdateKind::Edited,
            };
        }

        if let Some(query) = raw.callback_query {
            let mut message = query.message.unwrap_or_default();
            message.from = query.from;
            message.text = query.data;
            message.caption.clear();
            return Update {
                update_id,
                message,
                kind: UpdateKind::CallbackQuery(query.id),
            };
        }

        Update {
            update_id,
            message: Message::default(),
            kind: UpdateKind::Other,
        }
    }

    pub fn callback_query_id(&self) -> Option<&str> {
        match &self.kind {
            UpdateKind::CallbackQuery(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_callback(&self) -> bool {
        matches!(self.kind, UpdateKind::CallbackQuery(_))
    }
}
