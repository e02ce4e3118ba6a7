//! The storage contract every inventory backend implements.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::{AuditStamp, NumberRangeKey, ReservationKey, SystemKey, UpsertOutcome};

/// Persistence for PBX systems, number ranges and reserved extensions.
///
/// Every `upsert_*` method is a single check-then-write keyed by the table's
/// natural key. Implementations must make that step atomic with respect to
/// other writers of the same key so concurrent syncs never produce duplicate
/// rows. Implementations must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use starfish_storage::{AuditStamp, InventoryStore, SystemKey};
///
/// async fn touch(store: &dyn InventoryStore) -> Result<Option<i64>, StorageError> {
///     let key = SystemKey::new("NYC", "CM1");
///     store.upsert_system(&key, &AuditStamp::system_now()).await?;
///     store.find_system_id(&key).await
/// }
/// ```
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Inserts a `pbx_system` row for `(site, cm)` or refreshes `aem_pbx` and
    /// the updated-audit columns of the existing one.
    ///
    /// New rows get cluster id 1 and `aem_pbx` equal to the site name.
    async fn upsert_system(
        &self,
        key: &SystemKey,
        audit: &AuditStamp,
    ) -> Result<UpsertOutcome, StorageError>;

    /// Looks up the id of the system with this natural key.
    async fn find_system_id(&self, key: &SystemKey) -> Result<Option<i64>, StorageError>;

    /// Resolves a phone number type name to its id.
    ///
    /// Returns `None` for names that are not in the lookup table.
    async fn phone_number_type_id(&self, name: &str) -> Result<Option<i64>, StorageError>;

    /// Inserts a range or refreshes the audit columns of the existing one.
    async fn upsert_number_range(
        &self,
        key: &NumberRangeKey,
        audit: &AuditStamp,
    ) -> Result<UpsertOutcome, StorageError>;

    /// Inserts a reservation or renews its window to `[audit.at, audit.at]`.
    async fn upsert_reservation(
        &self,
        key: &ReservationKey,
        audit: &AuditStamp,
    ) -> Result<UpsertOutcome, StorageError>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<(), StorageError>;

    /// Returns the name of this storage backend for logging.
    fn backend_name(&self) -> &'static str;
}
