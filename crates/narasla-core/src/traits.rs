//! Contracts between the delivery loops and their collaborators.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Event, Page, User};

/// Source of inbound events (long-poll against the gateway).
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch up to `limit` pending events. An empty batch is not an error.
    async fn fetch(&self, limit: usize) -> Result<Vec<Event>>;
}

/// Handles one inbound event.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, event: &Event) -> Result<()>;
}

/// Outbound message delivery.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
}

/// The slice of storage the digest scheduler needs.
#[async_trait]
pub trait SchedulerStorage: Send + Sync {
    async fn list_enabled_users(&self) -> Result<Vec<User>>;

    /// A random page of `owner_id`, or `NoSavedPages`.
    async fn pick_random(&self, owner_id: i64) -> Result<Page>;

    /// Delete a page, or `PageNotFound`.
    async fn remove(&self, page: &Page) -> Result<()>;

    /// Record a successful digest send and tomorrow's target time.
    async fn update_last_send_at(
        &self,
        owner_id: i64,
        at: DateTime<Utc>,
        new_hour: u32,
        new_minute: u32,
    ) -> Result<()>;
}

/// Full storage used by command handlers.
#[async_trait]
pub trait Storage: SchedulerStorage {
    async fn save(&self, page: &Page) -> Result<()>;
    async fn is_exists(&self, owner_id: i64, url: &str) -> Result<bool>;
    async fn remove_by_url(&self, owner_id: i64, url: &str) -> Result<()>;
    /// Pages of `owner_id`, oldest first.
    async fn list(&self, owner_id: i64, limit: usize, offset: usize) -> Result<Vec<Page>>;
    async fn count(&self, owner_id: i64) -> Result<usize>;

    /// Upsert chat/username for `owner_id`, creating the user with defaults
    /// when first seen. Schedule fields of an existing user are untouched.
    async fn update_user_info(&self, owner_id: i64, chat_id: i64, username: &str) -> Result<()>;
    async fn switch_enable(&self, owner_id: i64, enabled: bool) -> Result<()>;
    async fn get_user_info(&self, owner_id: i64) -> Result<User>;
    async fn set_timezone(&self, owner_id: i64, timezone: &str) -> Result<()>;
}
