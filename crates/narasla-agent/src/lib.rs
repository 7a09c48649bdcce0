//! # narasla agent
//! Inbound side of the bot: pulls event batches and turns chat messages
//! into storage operations and replies.
//!
//! - **consumer**: fetch ─► fan out one task per event ─► join barrier ─► repeat
//! - **processor**: `Processor` for chat events, with a per-event deadline
//! - **commands**: `/save`, `/rnd`, `/list`, `/del`, `/daily`, `/tz`, ...

pub mod commands;
pub mod consumer;
mod messages;
pub mod processor;

pub use commands::Command;
pub use consumer::EventConsumer;
pub use processor::CommandProcessor;
