//! Telegram updates as core events.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use narasla_core::error::Result;
use narasla_core::traits::Fetcher;
use narasla_core::types::{ChatKind, ChatMeta, Event};

use crate::telegram::{TelegramClient, TelegramUpdate};

/// [`Fetcher`] over `getUpdates`. Remembers the next offset so every update
/// is delivered once.
pub struct TelegramEvents {
    client: Arc<TelegramClient>,
    offset: AtomicI64,
}

impl TelegramEvents {
    pub fn new(client: Arc<TelegramClient>) -> Self {
        Self {
            client,
            offset: AtomicI64::new(0),
        }
    }

    /// Offset the next fetch will request.
    pub fn offset(&self) -> i64 {
        self.offset.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Fetcher for TelegramEvents {
    async fn fetch(&self, limit: usize) -> Result<Vec<Event>> {
        let updates = self.client.get_updates(self.offset(), limit).await?;

        if let Some(last) = updates.last() {
            self.offset.store(last.update_id + 1, Ordering::Release);
        }

        Ok(updates.iter().map(TelegramUpdate::to_event).collect())
    }
}

impl TelegramUpdate {
    /// Text messages from humans become `Message` events; everything else is `Unknown`.
    pub fn to_event(&self) -> Event {
        let Some(msg) = self.message.as_ref() else {
            return Event::unknown();
        };
        let (Some(text), Some(from)) = (msg.text.as_ref(), msg.from.as_ref()) else {
            return Event::unknown();
        };
        if from.is_bot {
            return Event::unknown();
        }

        let chat_kind = match msg.chat.chat_type.as_str() {
            "private" => ChatKind::Private,
            _ => ChatKind::Group,
        };

        Event::message(
            text.clone(),
            ChatMeta {
                chat_id: msg.chat.id,
                user_id: from.id,
                username: from.username.clone().unwrap_or_else(|| from.first_name.clone()),
                chat_kind,
            },
        )
    }
}
