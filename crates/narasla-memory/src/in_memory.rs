//! Process-local storage. Same contract as SQLite, nothing persisted.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use narasla_core::error::{NaraslaError, Result};
use narasla_core::traits::{SchedulerStorage, Storage};
use narasla_core::types::{Page, User};
use rand::seq::SliceRandom;

#[derive(Default)]
struct State {
    pages: Vec<Page>,
    users: BTreeMap<i64, User>,
    next_id: i64,
}

#[derive(Default)]
pub struct InMemoryStorage {
    state: Mutex<State>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a full user record.
    pub fn put_user(&self, user: User) -> Result<()> {
        self.state()?.users.insert(user.owner_id, user);
        Ok(())
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| NaraslaError::Storage(format!("state lock poisoned: {e}")))
    }

    fn with_user<F>(&self, owner_id: i64, f: F) -> Result<()>
    where
        F: FnOnce(&mut User),
    {
        let mut state = self.state()?;
        let user = state.users.get_mut(&owner_id).ok_or(NaraslaError::UserNotFound)?;
        f(user);
        Ok(())
    }
}

#[async_trait]
impl SchedulerStorage for InMemoryStorage {
    async fn list_enabled_users(&self) -> Result<Vec<User>> {
        Ok(self.state()?.users.values().filter(|u| u.enabled).cloned().collect())
    }

    async fn pick_random(&self, owner_id: i64) -> Result<Page> {
        let state = self.state()?;
        let owned: Vec<&Page> = state.pages.iter().filter(|p| p.owner_id == owner_id).collect();
        owned
            .choose(&mut rand::thread_rng())
            .map(|p| (*p).clone())
            .ok_or(NaraslaError::NoSavedPages)
    }

    async fn remove(&self, page: &Page) -> Result<()> {
        let mut state = self.state()?;
        let before = state.pages.len();
        state.pages.retain(|p| !(p.owner_id == page.owner_id && p.id == page.id));
        if state.pages.len() == before {
            return Err(NaraslaError::PageNotFound);
        }
        Ok(())
    }

    async fn update_last_send_at(
        &self,
        owner_id: i64,
        at: DateTime<Utc>,
        new_hour: u32,
        new_minute: u32,
    ) -> Result<()> {
        self.with_user(owner_id, |u| {
            u.last_send_at = Some(at);
            u.send_hour = new_hour;
            u.send_minute = new_minute;
        })
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn save(&self, page: &Page) -> Result<()> {
        let mut state = self.state()?;
        if state.pages.iter().any(|p| p.owner_id == page.owner_id && p.url == page.url) {
            return Ok(());
        }
        state.next_id += 1;
        let mut stored = page.clone();
        stored.id = state.next_id;
        state.pages.push(stored);
        Ok(())
    }

    async fn is_exists(&self, owner_id: i64, url: &str) -> Result<bool> {
        Ok(self.state()?.pages.iter().any(|p| p.owner_id == owner_id && p.url == url))
    }

    async fn remove_by_url(&self, owner_id: i64, url: &str) -> Result<()> {
        let mut state = self.state()?;
        let before = state.pages.len();
        state.pages.retain(|p| !(p.owner_id == owner_id && p.url == url));
        if state.pages.len() == before {
            return Err(NaraslaError::PageNotFound);
        }
        Ok(())
    }

    async fn list(&self, owner_id: i64, limit: usize, offset: usize) -> Result<Vec<Page>> {
        Ok(self
            .state()?
            .pages
            .iter()
            .filter(|p| p.owner_id == owner_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, owner_id: i64) -> Result<usize> {
        Ok(self.state()?.pages.iter().filter(|p| p.owner_id == owner_id).count())
    }

    async fn update_user_info(&self, owner_id: i64, chat_id: i64, username: &str) -> Result<()> {
        let mut state = self.state()?;
        let user = state
            .users
            .entry(owner_id)
            .or_insert_with(|| User::new(owner_id, chat_id, username));
        user.chat_id = chat_id;
        user.username = username.to_string();
        Ok(())
    }

    async fn switch_enable(&self, owner_id: i64, enabled: bool) -> Result<()> {
        self.with_user(owner_id, |u| u.enabled = enabled)
    }

    async fn get_user_info(&self, owner_id: i64) -> Result<User> {
        self.state()?
            .users
            .get(&owner_id)
            .cloned()
            .ok_or(NaraslaError::UserNotFound)
    }

    async fn set_timezone(&self, owner_id: i64, timezone: &str) -> Result<()> {
        self.with_user(owner_id, |u| u.timezone = timezone.to_string())
    }
}
