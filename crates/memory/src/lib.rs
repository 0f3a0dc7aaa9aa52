//! Conversation store implementations for Switchboard.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use std::sync::Arc;
use switchboard_config::StoreConfig;
use switchboard_core::error::StoreError;
use switchboard_core::store::ConversationStore;

/// Build the configured store backend.
pub async fn build_store(
    config: &StoreConfig,
) -> Result<Arc<dyn ConversationStore>, StoreError> {
    match config.backend.as_str() {
        "in_memory" => Ok(Arc::new(InMemoryStore::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Arc::new(SqliteStore::new(&config.path).await?)),
        other => Err(StoreError::Storage(format!(
            "unknown store backend '{other}'"
        ))),
    }
}
