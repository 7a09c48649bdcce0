//! SQLite storage for pages and user schedules.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use narasla_core::error::{NaraslaError, Result};
use narasla_core::traits::{SchedulerStorage, Storage};
use narasla_core::types::{Page, User};
use rusqlite::{Connection, OptionalExtension, Row, params};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS pages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL,
        chat_id INTEGER NOT NULL,
        url TEXT NOT NULL,
        username TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL,          -- unix seconds
        UNIQUE (owner_id, url)
    );
    CREATE INDEX IF NOT EXISTS idx_pages_owner ON pages (owner_id);

    CREATE TABLE IF NOT EXISTS users (
        owner_id INTEGER PRIMARY KEY,
        chat_id INTEGER NOT NULL,
        username TEXT NOT NULL DEFAULT '',
        timezone TEXT NOT NULL DEFAULT 'UTC',
        enabled INTEGER NOT NULL DEFAULT 1,
        send_hour INTEGER NOT NULL DEFAULT 10,
        send_minute INTEGER NOT NULL DEFAULT 0,
        last_send_at INTEGER                  -- unix seconds, NULL until first digest
    );
";

const USER_COLUMNS: &str =
    "owner_id, chat_id, username, timezone, enabled, send_hour, send_minute, last_send_at";

fn storage_err(e: rusqlite::Error) -> NaraslaError {
    NaraslaError::Storage(e.to_string())
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<Page> {
    Ok(Page {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        chat_id: row.get(2)?,
        url: row.get(3)?,
        username: row.get(4)?,
        created_at: from_unix(row.get(5)?),
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        owner_id: row.get(0)?,
        chat_id: row.get(1)?,
        username: row.get(2)?,
        timezone: row.get(3)?,
        enabled: row.get::<_, i64>(4)? != 0,
        send_hour: row.get(5)?,
        send_minute: row.get(6)?,
        last_send_at: row.get::<_, Option<i64>>(7)?.map(from_unix),
    })
}

/// SQLite-backed [`Storage`]. One connection, serialised by a mutex.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the database file, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| NaraslaError::Storage(format!("DB open: {e}")))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// A private database that lives as long as this value.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Create tables if they do not exist.
    pub fn init(&self) -> Result<()> {
        self.conn()?
            .execute_batch(SCHEMA)
            .map_err(|e| NaraslaError::Storage(format!("Migration: {e}")))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| NaraslaError::Storage(format!("connection lock poisoned: {e}")))
    }

    fn update_user(&self, sql: &str, params: impl rusqlite::Params) -> Result<()> {
        let affected = self.conn()?.execute(sql, params).map_err(storage_err)?;
        if affected == 0 {
            return Err(NaraslaError::UserNotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl SchedulerStorage for SqliteStorage {
    async fn list_enabled_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE enabled = 1 ORDER BY owner_id"
            ))
            .map_err(storage_err)?;
        let users = stmt
            .query_map([], user_from_row)
            .map_err(storage_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage_err)?;
        Ok(users)
    }

    async fn pick_random(&self, owner_id: i64) -> Result<Page> {
        self.conn()?
            .query_row(
                "SELECT id, owner_id, chat_id, url, username, created_at
                 FROM pages WHERE owner_id = ?1 ORDER BY RANDOM() LIMIT 1",
                params![owner_id],
                page_from_row,
            )
            .optional()
            .map_err(storage_err)?
            .ok_or(NaraslaError::NoSavedPages)
    }

    async fn remove(&self, page: &Page) -> Result<()> {
        let affected = self
            .conn()?
            .execute(
                "DELETE FROM pages WHERE owner_id = ?1 AND id = ?2",
                params![page.owner_id, page.id],
            )
            .map_err(storage_err)?;
        if affected == 0 {
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
        self.update_user(
            "UPDATE users SET last_send_at = ?2, send_hour = ?3, send_minute = ?4 WHERE owner_id = ?1",
            params![owner_id, at.timestamp(), new_hour, new_minute],
        )
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn save(&self, page: &Page) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR IGNORE INTO pages (owner_id, chat_id, url, username, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    page.owner_id,
                    page.chat_id,
                    page.url,
                    page.username,
                    page.created_at.timestamp()
                ],
            )
            .map_err(|e| NaraslaError::Storage(format!("can't save page: {e}")))?;
        Ok(())
    }

    async fn is_exists(&self, owner_id: i64, url: &str) -> Result<bool> {
        let count: i64 = self
            .conn()?
            .query_row(
                "SELECT COUNT(*) FROM pages WHERE owner_id = ?1 AND url = ?2",
                params![owner_id, url],
                |r| r.get(0),
            )
            .map_err(storage_err)?;
        Ok(count > 0)
    }

    async fn remove_by_url(&self, owner_id: i64, url: &str) -> Result<()> {
        let affected = self
            .conn()?
            .execute(
                "DELETE FROM pages WHERE owner_id = ?1 AND url = ?2",
                params![owner_id, url],
            )
            .map_err(storage_err)?;
        if affected == 0 {
            return Err(NaraslaError::PageNotFound);
        }
        Ok(())
    }

    async fn list(&self, owner_id: i64, limit: usize, offset: usize) -> Result<Vec<Page>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, owner_id, chat_id, url, username, created_at
                 FROM pages WHERE owner_id = ?1 ORDER BY created_at, id LIMIT ?2 OFFSET ?3",
            )
            .map_err(storage_err)?;
        let pages = stmt
            .query_map(params![owner_id, limit as i64, offset as i64], page_from_row)
            .map_err(storage_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage_err)?;
        Ok(pages)
    }

    async fn count(&self, owner_id: i64) -> Result<usize> {
        let count: i64 = self
            .conn()?
            .query_row(
                "SELECT COUNT(*) FROM pages WHERE owner_id = ?1",
                params![owner_id],
                |r| r.get(0),
            )
            .map_err(storage_err)?;
        Ok(count as usize)
    }

    async fn update_user_info(&self, owner_id: i64, chat_id: i64, username: &str) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO users (owner_id, chat_id, username) VALUES (?1, ?2, ?3)
                 ON CONFLICT (owner_id) DO UPDATE SET chat_id = excluded.chat_id, username = excluded.username",
                params![owner_id, chat_id, username],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    async fn switch_enable(&self, owner_id: i64, enabled: bool) -> Result<()> {
        self.update_user(
            "UPDATE users SET enabled = ?2 WHERE owner_id = ?1",
            params![owner_id, enabled as i64],
        )
    }

    async fn get_user_info(&self, owner_id: i64) -> Result<User> {
        self.conn()?
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE owner_id = ?1"),
                params![owner_id],
                user_from_row,
            )
            .optional()
            .map_err(storage_err)?
            .ok_or(NaraslaError::UserNotFound)
    }

    async fn set_timezone(&self, owner_id: i64, timezone: &str) -> Result<()> {
        self.update_user(
            "UPDATE users SET timezone = ?2 WHERE owner_id = ?1",
            params![owner_id, timezone],
        )
    }
}
