//! Data model: inbound events, saved pages and per-user schedule records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NaraslaError, Result};

/// Kind of an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A text message from a user.
    Message,
    /// Anything the gateway delivered that we don't understand.
    Unknown,
}

/// Where a chat message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatKind {
    Private,
    Group,
}

/// Addressing for a chat message: who sent it and where to reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMeta {
    pub chat_id: i64,
    pub user_id: i64,
    pub username: String,
    pub chat_kind: ChatKind,
}

/// Gateway-specific payload carried alongside an event.
/// The consumer never looks inside; the processor extracts what it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventMeta {
    Chat(ChatMeta),
}

/// One inbound event produced by a [`crate::Fetcher`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub text: String,
    pub meta: Option<EventMeta>,
}

impl Event {
    /// A chat message event.
    pub fn message(text: impl Into<String>, meta: ChatMeta) -> Self {
        Self {
            kind: EventKind::Message,
            text: text.into(),
            meta: Some(EventMeta::Chat(meta)),
        }
    }

    /// An event with no usable payload.
    pub fn unknown() -> Self {
        Self {
            kind: EventKind::Unknown,
            text: String::new(),
            meta: None,
        }
    }

    /// Chat addressing, or [`NaraslaError::UnknownMeta`] if the event carries
    /// anything else.
    pub fn chat_meta(&self) -> Result<&ChatMeta> {
        match &self.meta {
            Some(EventMeta::Chat(meta)) => Ok(meta),
            _ => Err(NaraslaError::UnknownMeta),
        }
    }
}

/// A saved link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Storage-assigned ID (0 until saved).
    pub id: i64,
    pub url: String,
    /// Telegram user ID of the owner.
    pub owner_id: i64,
    /// Chat the link was saved from.
    pub chat_id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl Page {
    /// A page that has not been stored yet.
    pub fn new(url: impl Into<String>, owner_id: i64, chat_id: i64, username: impl Into<String>) -> Self {
        Self {
            id: 0,
            url: url.into(),
            owner_id,
            chat_id,
            username: username.into(),
            created_at: Utc::now(),
        }
    }
}

/// Per-user schedule record read and advanced by the digest scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub owner_id: i64,
    /// Chat the digest is delivered to.
    pub chat_id: i64,
    pub username: String,
    /// IANA timezone name; empty or unknown means UTC.
    pub timezone: String,
    pub send_hour: u32,
    pub send_minute: u32,
    /// Absent until the first scheduled send succeeds.
    pub last_send_at: Option<DateTime<Utc>>,
    pub enabled: bool,
}

impl User {
    /// Defaults for a user seen for the first time.
    pub fn new(owner_id: i64, chat_id: i64, username: impl Into<String>) -> Self {
        Self {
            owner_id,
            chat_id,
            username: username.into(),
            timezone: "UTC".into(),
            send_hour: 10,
            send_minute: 0,
            last_send_at: None,
            enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ChatMeta {
        ChatMeta {
            chat_id: 7,
            user_id: 42,
            username: "ann".into(),
            chat_kind: ChatKind::Private,
        }
    }

    #[test]
    fn test_chat_meta_extraction() {
        let ev = Event::message("/rnd", meta());
        assert_eq!(ev.kind, EventKind::Message);
        assert_eq!(ev.chat_meta().unwrap().user_id, 42);
    }

    #[test]
    fn test_missing_meta_is_unrecognized() {
        let ev = Event {
            kind: EventKind::Message,
            text: "hello".into(),
            meta: None,
        };
        assert!(matches!(ev.chat_meta(), Err(NaraslaError::UnknownMeta)));
        assert!(matches!(Event::unknown().chat_meta(), Err(NaraslaError::UnknownMeta)));
    }

    #[test]
    fn test_new_user_defaults() {
        let u = User::new(1, 2, "bob");
        assert!(u.enabled);
        assert!(u.last_send_at.is_none());
        assert_eq!(u.timezone, "UTC");
    }
}
