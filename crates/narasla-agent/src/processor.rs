//! Chat event processor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use narasla_core::error::{NaraslaError, Result};
use narasla_core::traits::{Processor, Sender, Storage};
use narasla_core::types::{ChatMeta, Event, EventKind};

/// Interprets chat messages as commands against storage and replies through
/// the sender. Each event gets at most `deadline` of command handling.
pub struct CommandProcessor {
    pub(crate) sender: Arc<dyn Sender>,
    pub(crate) storage: Arc<dyn Storage>,
    deadline: Duration,
}

impl CommandProcessor {
    pub fn new(sender: Arc<dyn Sender>, storage: Arc<dyn Storage>, deadline: Duration) -> Self {
        Self {
            sender,
            storage,
            deadline,
        }
    }

    pub(crate) async fn reply(&self, meta: &ChatMeta, text: &str) -> Result<()> {
        self.sender.send_message(meta.chat_id, text).await
    }

    async fn process_message(&self, event: &Event) -> Result<()> {
        let meta = event.chat_meta()?;
        self.storage
            .update_user_info(meta.user_id, meta.chat_id, &meta.username)
            .await?;

        tokio::time::timeout(self.deadline, self.do_cmd(&event.text, meta))
            .await
            .map_err(|_| NaraslaError::DeadlineExceeded)?
    }
}

#[async_trait]
impl Processor for CommandProcessor {
    async fn process(&self, event: &Event) -> Result<()> {
        match event.kind {
            EventKind::Message => self.process_message(event).await,
            EventKind::Unknown => Err(NaraslaError::UnknownEventKind),
        }
    }
}
