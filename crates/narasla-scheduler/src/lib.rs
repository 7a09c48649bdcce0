//! # narasla scheduler
//!
//! Pushes one random saved page per user per local day.
//!
//! ```text
//! DigestScheduler (tokio interval)
//!   └── step(now)
//!         ├── list_enabled_users
//!         └── per user: should_send_now? ─► pick_random ─► send ─► remove
//!                                                                   └─► reschedule (jittered)
//! ```

pub mod eligibility;
pub mod engine;

pub use eligibility::{resolve_timezone, should_send_now};
pub use engine::{DigestScheduler, SendWindow};
