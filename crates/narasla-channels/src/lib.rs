//! # narasla channels
//! Messaging gateway implementations.
//!
//! - [`telegram::TelegramClient`]: Bot API client, also the digest [`narasla_core::Sender`]
//! - [`events::TelegramEvents`]: turns `getUpdates` results into core events ([`narasla_core::Fetcher`])

pub mod events;
pub mod telegram;

pub use events::TelegramEvents;
pub use telegram::TelegramClient;
