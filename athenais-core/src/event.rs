// ABOUTME: Immutable protocol event records handed to route handlers
// ABOUTME: Namespaced event types plus typed access to message content

use serde::Deserialize;
use std::borrow::Cow;
use std::fmt;

/// Namespaced event kind, e.g. `m.room.message`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventType(Cow<'static, str>);

impl EventType {
    pub const ROOM_MESSAGE: EventType = EventType(Cow::Borrowed("m.room.message"));
    pub const ROOM_MEMBER: EventType = EventType(Cow::Borrowed("m.room.member"));
    pub const REACTION: EventType = EventType(Cow::Borrowed("m.reaction"));
    pub const ROOM_ENCRYPTED: EventType = EventType(Cow::Borrowed("m.room.encrypted"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

/// A single notification delivered by the transport.
///
/// `room_id` is empty for non-room events and `id` is empty for ephemeral
/// events. The core never mutates an event; handlers receive it behind an
/// `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_type: EventType,
    pub sender: String,
    pub room_id: String,
    pub id: String,
    pub content: serde_json::Value,
}

impl Event {
    pub fn new(
        event_type: impl Into<EventType>,
        sender: impl Into<String>,
        room_id: impl Into<String>,
        id: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            sender: sender.into(),
            room_id: room_id.into(),
            id: id.into(),
            content,
        }
    }

    /// Convenience constructor for a plain `m.text` room message.
    pub fn text_message(
        sender: impl Into<String>,
        room_id: impl Into<String>,
        id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::new(
            EventType::ROOM_MESSAGE,
            sender,
            room_id,
            id,
            serde_json::json!({ "msgtype": "m.text", "body": body.into() }),
        )
    }

    pub fn is_room_event(&self) -> bool {
        !self.room_id.is_empty()
    }

    /// Interpret the content as a room message. Returns `None` when the
    /// payload lacks a `msgtype`/`body` pair.
    pub fn as_message(&self) -> Option<MessageContent> {
        #[derive(Deserialize)]
        struct Raw {
            msgtype: String,
            body: String,
        }

        let raw = Raw::deserialize(&self.content).ok()?;
        Some(MessageContent {
            kind: MessageKind::from(raw.msgtype.as_str()),
            body: raw.body,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Notice,
    Emote,
    Other(String),
}

impl From<&str> for MessageKind {
    fn from(msgtype: &str) -> Self {
        match msgtype {
            "m.text" => Self::Text,
            "m.notice" => Self::Notice,
            "m.emote" => Self::Emote,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent {
    pub kind: MessageKind,
    pub body: String,
}

impl MessageContent {
    pub fn is_text(&self) -> bool {
        self.kind == MessageKind::Text
    }
}
