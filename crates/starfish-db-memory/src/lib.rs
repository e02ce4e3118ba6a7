//! In-memory inventory storage backend for the Starfish sync.
//!
//! This crate provides an implementation of the `InventoryStore` trait from
//! `starfish-storage` on top of `dashmap`. It backs `storage.backend = "memory"`
//! and the sync engine's tests.
//!
//! # Example
//!
//! ```ignore
//! use starfish_db_memory::InMemoryInventoryStore;
//! use starfish_storage::{AuditStamp, InventoryStore, SystemKey};
//!
//! let store = InMemoryInventoryStore::new().with_phone_number_type("internal", 1);
//! store.upsert_system(&SystemKey::new("NYC", "CM1"), &AuditStamp::system_now()).await?;
//! assert_eq!(store.systems().len(), 1);
//! ```

pub mod storage;

pub use starfish_storage::{InventoryStore, StorageError};
pub use storage::InMemoryInventoryStore;

/// Creates a new, empty in-memory store behind the shared trait object.
pub fn create_inventory_store() -> starfish_storage::DynInventoryStore {
    std::sync::Arc::new(InMemoryInventoryStore::new())
}
