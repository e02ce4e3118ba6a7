#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use starfish_db_memory::InMemoryInventoryStore;
use starfish_storage::{
    AuditStamp, InventoryStore, NumberRangeKey, ReservationKey, StorageError, SystemKey,
    UpsertOutcome,
};
use starfish_sync::{HttpResourceGateway, RemoteApiConfig};
use wiremock::MockServer;

pub fn gateway_for(server: &MockServer) -> Arc<HttpResourceGateway> {
    let config = RemoteApiConfig {
        base_url: server.uri(),
        username: "admin".into(),
        password: "secret".into(),
        request_timeout_ms: 5_000,
    };
    Arc::new(HttpResourceGateway::new(&config).expect("gateway"))
}

pub fn memory_store() -> Arc<InMemoryInventoryStore> {
    Arc::new(
        InMemoryInventoryStore::new()
            .with_phone_number_type("internal", 1)
            .with_phone_number_type("external", 2),
    )
}

pub fn site_details(site: &str, cm: &str) -> Value {
    json!({
        "Results": [{
            "Site": site,
            "CM": cm,
            "Ranges": [{
                "Type": "internal",
                "LowerBound": "1000",
                "UpperBound": "1999",
                "AvailableExtensions": ["1001", "1002"]
            }]
        }]
    })
}

/// Which writes a [`FaultyStore`] should reject.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Reject ranges starting at this bound with a row-level error.
    pub range_from: Option<String>,
    /// Reject this extension with a row-level error.
    pub extension: Option<String>,
    /// Fail every reservation write as if the database went away.
    pub reservations_offline: bool,
    /// Report zero affected rows for system upserts without writing.
    pub system_untouched: bool,
    /// Never find the system after upserting it.
    pub system_missing: bool,
    /// Fail system lookups with a row-level error.
    pub system_lookup_error: bool,
}

/// Memory store wrapper that injects storage errors.
pub struct FaultyStore {
    pub inner: Arc<InMemoryInventoryStore>,
    pub faults: Faults,
}

impl FaultyStore {
    pub fn new(inner: Arc<InMemoryInventoryStore>, faults: Faults) -> Self {
        Self { inner, faults }
    }
}

#[async_trait]
impl InventoryStore for FaultyStore {
    async fn upsert_system(
        &self,
        key: &SystemKey,
        audit: &AuditStamp,
    ) -> Result<UpsertOutcome, StorageError> {
        if self.faults.system_untouched {
            return Ok(UpsertOutcome::Untouched);
        }
        self.inner.upsert_system(key, audit).await
    }

    async fn find_system_id(&self, key: &SystemKey) -> Result<Option<i64>, StorageError> {
        if self.faults.system_missing {
            return Ok(None);
        }
        if self.faults.system_lookup_error {
            return Err(StorageError::invalid_record("ambiguous pbx_system natural key"));
        }
        self.inner.find_system_id(key).await
    }

    async fn phone_number_type_id(&self, name: &str) -> Result<Option<i64>, StorageError> {
        self.inner.phone_number_type_id(name).await
    }

    async fn upsert_number_range(
        &self,
        key: &NumberRangeKey,
        audit: &AuditStamp,
    ) -> Result<UpsertOutcome, StorageError> {
        if self.faults.range_from.as_deref() == Some(key.range_from.as_str()) {
            return Err(StorageError::constraint("pbx_number_range", "value too long"));
        }
        self.inner.upsert_number_range(key, audit).await
    }

    async fn upsert_reservation(
        &self,
        key: &ReservationKey,
        audit: &AuditStamp,
    ) -> Result<UpsertOutcome, StorageError> {
        if self.faults.reservations_offline {
            return Err(StorageError::connection_error("connection reset"));
        }
        if self.faults.extension.as_deref() == Some(key.extension.as_str()) {
            return Err(StorageError::constraint("pbx_number_reserved", "bad extension"));
        }
        self.inner.upsert_reservation(key, audit).await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.inner.ping().await
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }
}
