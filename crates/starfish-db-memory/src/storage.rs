use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use starfish_storage::{
    AuditStamp, DEFAULT_CLUSTER_ID, InventoryStore, NumberRangeKey, PbxNumberRange,
    PbxNumberReserved, PbxSystem, ReservationKey, StorageError, SystemKey, UpsertOutcome,
};

/// In-memory inventory backend.
///
/// Each table is a `DashMap` keyed by its natural key, so a check-then-write
/// runs under the shard lock of that key's entry.
#[derive(Debug)]
pub struct InMemoryInventoryStore {
    systems: DashMap<SystemKey, PbxSystem>,
    ranges: DashMap<NumberRangeKey, PbxNumberRange>,
    reservations: DashMap<ReservationKey, PbxNumberReserved>,
    phone_number_types: DashMap<String, i64>,
    id_sequence: AtomicI64,
}

impl Default for InMemoryInventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self {
            systems: DashMap::new(),
            ranges: DashMap::new(),
            reservations: DashMap::new(),
            phone_number_types: DashMap::new(),
            id_sequence: AtomicI64::new(1),
        }
    }

    /// Adds an entry to the phone number type lookup table.
    #[must_use]
    pub fn with_phone_number_type(self, name: impl Into<String>, id: i64) -> Self {
        self.phone_number_types.insert(name.into(), id);
        self
    }

    fn next_id(&self) -> i64 {
        self.id_sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// All systems ordered by id.
    pub fn systems(&self) -> Vec<PbxSystem> {
        let mut rows: Vec<_> = self.systems.iter().map(|e| e.value().clone()).collect();
        rows.sort_by_key(|r| r.id);
        rows
    }

    /// All number ranges ordered by id.
    pub fn number_ranges(&self) -> Vec<PbxNumberRange> {
        let mut rows: Vec<_> = self.ranges.iter().map(|e| e.value().clone()).collect();
        rows.sort_by_key(|r| r.id);
        rows
    }

    /// All reservations ordered by id.
    pub fn reservations(&self) -> Vec<PbxNumberReserved> {
        let mut rows: Vec<_> = self
            .reservations
            .iter()
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|r| r.id);
        rows
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn upsert_system(
        &self,
        key: &SystemKey,
        audit: &AuditStamp,
    ) -> Result<UpsertOutcome, StorageError> {
        match self.systems.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let row = entry.get_mut();
                row.aem_pbx = key.physical_pbx.clone();
                row.log_updated_by = audit.user.clone();
                row.log_updated_on = audit.at;
                Ok(UpsertOutcome::Updated)
            }
            Entry::Vacant(entry) => {
                entry.insert(PbxSystem {
                    id: self.next_id(),
                    physical_pbx: key.physical_pbx.clone(),
                    remark: key.remark.clone(),
                    aem_pbx: key.physical_pbx.clone(),
                    id_pbx_cluster: DEFAULT_CLUSTER_ID,
                    log_created_by: audit.user.clone(),
                    log_created_on: audit.at,
                    log_updated_by: audit.user.clone(),
                    log_updated_on: audit.at,
                });
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn find_system_id(&self, key: &SystemKey) -> Result<Option<i64>, StorageError> {
        Ok(self.systems.get(key).map(|row| row.id))
    }

    async fn phone_number_type_id(&self, name: &str) -> Result<Option<i64>, StorageError> {
        Ok(self.phone_number_types.get(name).map(|id| *id))
    }

    async fn upsert_number_range(
        &self,
        key: &NumberRangeKey,
        audit: &AuditStamp,
    ) -> Result<UpsertOutcome, StorageError> {
        match self.ranges.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let row = entry.get_mut();
                row.log_updated_by = audit.user.clone();
                row.log_updated_on = audit.at;
                Ok(UpsertOutcome::Updated)
            }
            Entry::Vacant(entry) => {
                entry.insert(PbxNumberRange {
                    id: self.next_id(),
                    id_pbx_system: key.system_id,
                    range_from: key.range_from.clone(),
                    range_to: key.range_to.clone(),
                    phone_number_type: key.phone_number_type,
                    id_pbx_cluster: DEFAULT_CLUSTER_ID,
                    log_created_by: audit.user.clone(),
                    log_created_on: audit.at,
                    log_updated_by: audit.user.clone(),
                    log_updated_on: audit.at,
                });
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn upsert_reservation(
        &self,
        key: &ReservationKey,
        audit: &AuditStamp,
    ) -> Result<UpsertOutcome, StorageError> {
        match self.reservations.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let row = entry.get_mut();
                row.reserve_start_time = audit.at;
                row.reserve_end_time = audit.at;
                Ok(UpsertOutcome::Updated)
            }
            Entry::Vacant(entry) => {
                entry.insert(PbxNumberReserved {
                    id: self.next_id(),
                    pbx_system_id: key.system_id,
                    extensions: key.extension.clone(),
                    reserve_start_time: audit.at,
                    reserve_end_time: audit.at,
                });
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn stamp(hour: u32) -> AuditStamp {
        let at = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        AuditStamp::new("system", at)
    }

    #[tokio::test]
    async fn test_system_insert_then_update() {
        let store = InMemoryInventoryStore::new();
        let key = SystemKey::new("NYC", "CM1");

        let first = store.upsert_system(&key, &stamp(8)).await.unwrap();
        let second = store.upsert_system(&key, &stamp(9)).await.unwrap();
        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(second, UpsertOutcome::Updated);

        let systems = store.systems();
        assert_eq!(systems.len(), 1);
        let row = &systems[0];
        assert_eq!(row.aem_pbx, "NYC");
        assert_eq!(row.id_pbx_cluster, 1);
        assert_eq!(row.log_created_on, stamp(8).at);
        assert_eq!(row.log_updated_on, stamp(9).at);

        let id = store.find_system_id(&key).await.unwrap();
        assert_eq!(id, Some(row.id));
        assert_eq!(
            store
                .find_system_id(&SystemKey::new("NYC", "CM2"))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_reservation_window_is_renewed() {
        let store = InMemoryInventoryStore::new();
        let key = ReservationKey::new(7, "1001");

        store.upsert_reservation(&key, &stamp(8)).await.unwrap();
        let outcome = store.upsert_reservation(&key, &stamp(10)).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);

        let rows = store.reservations();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reserve_start_time, stamp(10).at);
        assert_eq!(rows[0].reserve_end_time, stamp(10).at);
    }

    #[tokio::test]
    async fn test_range_key_includes_type() {
        let store = InMemoryInventoryStore::new();
        let mut key = NumberRangeKey {
            system_id: 1,
            range_from: "1000".into(),
            range_to: "1999".into(),
            phone_number_type: 1,
        };
        store.upsert_number_range(&key, &stamp(8)).await.unwrap();
        key.phone_number_type = 2;
        let outcome = store.upsert_number_range(&key, &stamp(8)).await.unwrap();

        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(store.number_ranges().len(), 2);
    }

    #[tokio::test]
    async fn test_phone_number_type_lookup() {
        let store = InMemoryInventoryStore::new().with_phone_number_type("external", 2);
        assert_eq!(store.phone_number_type_id("external").await.unwrap(), Some(2));
        assert_eq!(store.phone_number_type_id("internal").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_writers_do_not_duplicate() {
        let store = Arc::new(InMemoryInventoryStore::new());
        let key = SystemKey::new("NYC", "CM1");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let key = key.clone();
                tokio::spawn(async move { store.upsert_system(&key, &stamp(8)).await.unwrap() })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() == UpsertOutcome::Inserted {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.systems().len(), 1);
    }
}
