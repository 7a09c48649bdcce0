//! Command parsing and handlers.

use chrono_tz::Tz;
use narasla_core::error::{NaraslaError, Result};
use narasla_core::types::{ChatKind, ChatMeta, Page};

use crate::messages;
use crate::processor::CommandProcessor;

/// Pages shown by `/list` and addressable by `/del <n>`.
pub const LIST_LIMIT: usize = 20;

/// A slash command with its (trimmed, possibly empty) argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Save(&'a str),
    Random,
    Help,
    Start,
    List,
    Delete(&'a str),
    Daily(&'a str),
    Timezone(&'a str),
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    /// `None` when `text` is not a command. `/cmd@botname` is treated as `/cmd`.
    pub fn parse(text: &'a str) -> Option<Self> {
        let text = text.trim();
        if !text.starts_with('/') {
            return None;
        }

        let (head, arg) = match text.split_once(char::is_whitespace) {
            Some((head, arg)) => (head, arg.trim()),
            None => (text, ""),
        };
        let name = head.split_once('@').map_or(head, |(name, _)| name);

        Some(match name {
            "/save" => Self::Save(arg),
            "/rnd" => Self::Random,
            "/help" => Self::Help,
            "/start" => Self::Start,
            "/list" => Self::List,
            "/del" => Self::Delete(arg),
            "/daily" => Self::Daily(arg),
            "/tz" => Self::Timezone(arg),
            other => Self::Unknown(other),
        })
    }
}

/// Absolute URL with a host.
pub fn is_url(text: &str) -> bool {
    url::Url::parse(text).is_ok_and(|u| u.host_str().is_some_and(|h| !h.is_empty()))
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| NaraslaError::InvalidTimezone(name.to_string()))
}

impl CommandProcessor {
    pub(crate) async fn do_cmd(&self, text: &str, meta: &ChatMeta) -> Result<()> {
        let text = text.trim();
        tracing::debug!("command '{}' from '{}'", text, meta.username);

        let private = meta.chat_kind == ChatKind::Private;
        if is_url(text) {
            return if private { self.save_page(meta, text).await } else { Ok(()) };
        }

        let Some(cmd) = Command::parse(text) else {
            if private && !text.is_empty() {
                return self.reply(meta, messages::UNKNOWN_COMMAND).await;
            }
            return Ok(());
        };

        match cmd {
            Command::Save(arg) if is_url(arg) => self.save_page(meta, arg).await,
            Command::Save(_) => self.reply(meta, messages::USAGE_SAVE).await,
            Command::Random => self.send_random(meta).await,
            Command::Help => self.reply(meta, messages::HELP).await,
            Command::Start => self.reply(meta, &messages::hello()).await,
            Command::List => self.send_list(meta).await,
            Command::Delete(arg) => self.remove_page(meta, arg).await,
            Command::Daily(arg) => self.daily(meta, arg).await,
            Command::Timezone(arg) => self.set_timezone(meta, arg).await,
            Command::Unknown(name) => {
                tracing::debug!("unknown command '{name}'");
                self.reply(meta, messages::UNKNOWN_COMMAND).await
            }
        }
    }

    async fn save_page(&self, meta: &ChatMeta, url: &str) -> Result<()> {
        if self.storage.is_exists(meta.user_id, url).await? {
            return self.reply(meta, messages::ALREADY_EXISTS).await;
        }

        let page = Page::new(url, meta.user_id, meta.chat_id, meta.username.as_str());
        self.storage.save(&page).await?;
        tracing::info!("💾 Saved page for owner={}", meta.user_id);
        self.reply(meta, messages::SAVED).await
    }

    async fn send_random(&self, meta: &ChatMeta) -> Result<()> {
        let page = match self.storage.pick_random(meta.user_id).await {
            Ok(page) => page,
            Err(NaraslaError::NoSavedPages) => return self.reply(meta, messages::NO_SAVED_PAGES).await,
            Err(e) => return Err(e),
        };

        self.reply(meta, &page.url).await?;
        self.storage.remove(&page).await
    }

    async fn send_list(&self, meta: &ChatMeta) -> Result<()> {
        let pages = self.storage.list(meta.user_id, LIST_LIMIT, 0).await?;
        if pages.is_empty() {
            return self.reply(meta, messages::NO_SAVED_PAGES).await;
        }

        let total = self.storage.count(meta.user_id).await?;
        let mut text = messages::list_header(pages.len(), total);
        for (i, page) in pages.iter().enumerate() {
            text.push_str(&format!("{}. {}\n", i + 1, page.url));
        }
        text.push_str("\nDelete: /del <number> or /del <url>");

        self.reply(meta, &text).await
    }

    async fn remove_page(&self, meta: &ChatMeta, arg: &str) -> Result<()> {
        if arg.is_empty() {
            return self.send_list(meta).await;
        }

        if is_url(arg) {
            return match self.storage.remove_by_url(meta.user_id, arg).await {
                Ok(()) => self.reply(meta, messages::DELETED).await,
                Err(NaraslaError::PageNotFound) => self.reply(meta, messages::NOT_ON_LIST).await,
                Err(e) => Err(e),
            };
        }

        let Some(num) = arg.parse::<usize>().ok().filter(|n| *n > 0) else {
            return self.reply(meta, messages::USAGE_DELETE).await;
        };

        let pages = self.storage.list(meta.user_id, LIST_LIMIT, 0).await?;
        if pages.is_empty() {
            return self.reply(meta, messages::NO_SAVED_PAGES).await;
        }
        let Some(page) = pages.get(num - 1) else {
            return self.reply(meta, &messages::only_n_items(pages.len())).await;
        };

        self.storage.remove(page).await?;
        self.reply(meta, messages::DELETED).await
    }

    async fn daily(&self, meta: &ChatMeta, arg: &str) -> Result<()> {
        let enabled = match arg.to_ascii_lowercase().as_str() {
            "on" => true,
            "off" => false,
            "" => {
                let user = self.storage.get_user_info(meta.user_id).await?;
                let status = messages::daily_status(user.enabled, &user.timezone, user.send_hour, user.send_minute);
                return self.reply(meta, &status).await;
            }
            _ => return self.reply(meta, messages::USAGE_DAILY).await,
        };

        self.storage.switch_enable(meta.user_id, enabled).await?;
        tracing::info!("owner={} daily digest {}", meta.user_id, if enabled { "on" } else { "off" });
        self.reply(meta, if enabled { messages::DAILY_ON } else { messages::DAILY_OFF }).await
    }

    async fn set_timezone(&self, meta: &ChatMeta, arg: &str) -> Result<()> {
        let tz = match parse_timezone(arg) {
            Ok(tz) => tz,
            Err(e) => {
                tracing::debug!("{e}");
                return self.reply(meta, messages::USAGE_TZ).await;
            }
        };

        self.storage.set_timezone(meta.user_id, tz.name()).await?;
        self.reply(meta, &messages::timezone_set(tz.name())).await
    }
}
