//! # narasla memory
//! Storage backends for saved pages and per-user digest schedules.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

use std::path::PathBuf;
use std::sync::Arc;

use narasla_core::config::StorageConfig;
use narasla_core::error::{NaraslaError, Result};
use narasla_core::traits::Storage;

/// Create a storage backend from config and prepare its schema.
pub fn create_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    match config.backend.as_str() {
        "sqlite" => {
            let path = PathBuf::from(shellexpand::tilde(&config.path).as_ref());
            let storage = SqliteStorage::open(&path)?;
            storage.init()?;
            tracing::info!("storage: sqlite at {}", path.display());
            Ok(Arc::new(storage))
        }
        "memory" => {
            tracing::warn!("storage: in-memory backend, nothing survives a restart");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        other => Err(NaraslaError::Config(format!("unknown storage backend '{other}'"))),
    }
}
