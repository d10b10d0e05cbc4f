//! # WordNest Store
//!
//! Backends for [`ProfileStore`]. Every backend serializes writes behind one
//! lock, which trivially makes per-user read-modify-write linearizable, and
//! only acknowledges a write once it is durable.

pub mod file;
pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use wordnest_core::config::{StoreBackend, StoreConfig};
use wordnest_core::error::Result;
use wordnest_core::traits::ProfileStore;

pub use file::JsonProfileStore;
pub use memory::MemoryProfileStore;
pub use sqlite::SqliteProfileStore;

/// Open the backend selected in config.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn ProfileStore>> {
    let store: Arc<dyn ProfileStore> = match config.backend {
        StoreBackend::Json => Arc::new(JsonProfileStore::open(&config.resolved_path())?),
        StoreBackend::Sqlite => Arc::new(SqliteProfileStore::open(&config.resolved_path())?),
        StoreBackend::Memory => Arc::new(MemoryProfileStore::new()),
    };
    tracing::info!("Profile store: {}", store.name());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_store_by_backend() {
        let dir = tempfile::tempdir().unwrap();
        for (backend, file, name) in [
            (StoreBackend::Json, "p.json", "json"),
            (StoreBackend::Sqlite, "p.db", "sqlite"),
            (StoreBackend::Memory, "unused", "memory"),
        ] {
            let config = StoreConfig {
                backend,
                path: dir.path().join(file).to_string_lossy().into_owned(),
            };
            let store = create_store(&config).unwrap();
            assert_eq!(store.name(), name);
        }
    }
}
