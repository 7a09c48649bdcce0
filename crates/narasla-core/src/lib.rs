//! # narasla core
//!
//! Shared building blocks for the save-now-read-later bot:
//! - **types**: events, saved pages, per-user schedule records
//! - **traits**: the contracts the delivery loops consume (fetch, process, send, store)
//! - **retry**: exponential backoff with cancellable waits
//! - **cancel**: helpers that race blocking work against the shutdown token
//! - **config**: TOML + environment configuration
//!
//! ```text
//! gateway ─► Fetcher ─► EventConsumer ─► Processor ─► Storage
//!                                                       ▲
//! gateway ◄─ Sender ◄── DigestScheduler ────────────────┘
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod retry;
pub mod traits;
pub mod types;

pub use error::{NaraslaError, Result};
pub use retry::{RetryPolicy, Verdict};
pub use traits::{Fetcher, Processor, SchedulerStorage, Sender, Storage};
pub use types::{ChatKind, ChatMeta, Event, EventKind, EventMeta, Page, User};
