//! Telegram Bot API client: long polling and message sending.

use async_trait::async_trait;
use narasla_core::config::TelegramConfig;
use narasla_core::error::{NaraslaError, Result};
use narasla_core::traits::Sender;
use serde::{Deserialize, Serialize};

/// Bot API caps `getUpdates` at 100 updates per call.
const MAX_UPDATES_PER_CALL: usize = 100;

/// Telegram Bot API client.
pub struct TelegramClient {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("narasla/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| NaraslaError::Channel(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    /// Get updates using long polling, starting at `offset`.
    pub async fn get_updates(&self, offset: i64, limit: usize) -> Result<Vec<TelegramUpdate>> {
        let limit = limit.clamp(1, MAX_UPDATES_PER_CALL);
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
                ("timeout", self.config.poll_timeout_secs.to_string()),
                ("allowed_updates", "[\"message\"]".into()),
            ])
            .send()
            .await
            // The request URL embeds the bot token; keep it out of error text.
            .map_err(|e| NaraslaError::Channel(format!("Telegram getUpdates failed: {}", e.without_url())))?;

        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| NaraslaError::Channel(format!("Invalid Telegram response: {}", e.without_url())))?;

        body.into_result("getUpdates").map(Option::unwrap_or_default)
    }

    /// Send a plain-text message.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| NaraslaError::Channel(format!("sendMessage failed: {}", e.without_url())))?;

        let result: TelegramApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| NaraslaError::Channel(format!("Invalid send response: {}", e.without_url())))?;

        result.into_result("sendMessage")?;
        Ok(())
    }

    /// Get bot info.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| NaraslaError::Channel(format!("getMe failed: {}", e.without_url())))?;
        let body: TelegramApiResponse<TelegramUser> = response
            .json()
            .await
            .map_err(|e| NaraslaError::Channel(format!("Invalid getMe response: {}", e.without_url())))?;
        body.into_result("getMe")?
            .ok_or_else(|| NaraslaError::Channel("No bot info".into()))
    }
}

#[async_trait]
impl Sender for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        TelegramClient::send_message(self, chat_id, text).await
    }
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

impl<T> TelegramApiResponse<T> {
    fn into_result(self, method: &str) -> Result<Option<T>> {
        if !self.ok {
            return Err(NaraslaError::Channel(format!(
                "Telegram {method} error: {}",
                self.description.unwrap_or_else(|| "unknown error".into())
            )));
        }
        Ok(self.result)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub date: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
}
