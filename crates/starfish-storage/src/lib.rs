//! # starfish-storage
//!
//! Storage abstraction layer for the Starfish inventory sync.
//!
//! This crate defines the [`InventoryStore`] trait and the row/key types that
//! storage backends work with. It does not contain any implementations; those
//! live in `starfish-db-memory` and `starfish-db-postgres`.
//!
//! ## Tables
//!
//! | table                   | natural key                                                |
//! |-------------------------|------------------------------------------------------------|
//! | `pbx_system`            | `(physical_pbx, remark)`                                   |
//! | `pbx_number_range`      | `(id_pbx_system, range_from, range_to, phone_number_type)` |
//! | `pbx_number_reserved`   | `(pbx_system_id, extensions)`                              |
//! | `pbx_phone_number_type` | `name` (lookup only)                                       |

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::InventoryStore;
pub use types::{
    AuditStamp, DEFAULT_CLUSTER_ID, DEFAULT_PHONE_NUMBER_TYPE_ID, NumberRangeKey, PbxNumberRange,
    PbxNumberReserved, PbxSystem, ReservationKey, SYSTEM_USER, SystemKey, UpsertOutcome,
};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared inventory store.
pub type DynInventoryStore = std::sync::Arc<dyn InventoryStore>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        AuditStamp, DynInventoryStore, InventoryStore, NumberRangeKey, ReservationKey,
        StorageError, StorageResult, SystemKey, UpsertOutcome,
    };
}
