//! `InventoryStore` implementation on PostgreSQL.
//!
//! Every upsert runs in its own transaction. The first statement takes a
//! transaction-scoped advisory lock on `(table namespace, hashtext(natural key))`,
//! so two processes reconciling the same site serialize on that key and the
//! select-then-write that follows cannot insert the same row twice. No unique
//! constraints are required on the tables.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::{PgConnection, PgPool, PgTransaction};
use starfish_storage::{
    AuditStamp, DEFAULT_CLUSTER_ID, InventoryStore, NumberRangeKey, ReservationKey, StorageError,
    SystemKey, UpsertOutcome,
};
use tracing::{debug, instrument};

use crate::config::PostgresConfig;
use crate::error::{Result, map_sqlx_error};
use crate::pool::create_pool;

const PBX_SYSTEM: &str = "pbx_system";
const PBX_NUMBER_RANGE: &str = "pbx_number_range";
const PBX_NUMBER_RESERVED: &str = "pbx_number_reserved";
const PBX_PHONE_NUMBER_TYPE: &str = "pbx_phone_number_type";

/// Advisory lock namespaces, one per table.
const LOCK_SYSTEM: i32 = 0x5346_0001;
const LOCK_NUMBER_RANGE: i32 = 0x5346_0002;
const LOCK_NUMBER_RESERVED: i32 = 0x5346_0003;

/// PostgreSQL inventory store backed by a connection pool.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool and wraps it.
    pub async fn from_config(config: &PostgresConfig) -> Result<Self> {
        Ok(Self::new(create_pool(config).await?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self, table: &str) -> std::result::Result<PgTransaction<'static>, StorageError> {
        self.pool.begin().await.map_err(|e| map_sqlx_error(table, e))
    }
}

/// Blocks until this transaction owns the advisory lock for `key`.
async fn lock_natural_key(
    conn: &mut PgConnection,
    table: &str,
    namespace: i32,
    key: &str,
) -> std::result::Result<(), StorageError> {
    query("SELECT pg_advisory_xact_lock($1, hashtext($2))")
        .bind(namespace)
        .bind(key)
        .execute(conn)
        .await
        .map_err(|e| map_sqlx_error(table, e))?;
    Ok(())
}

async fn commit(tx: PgTransaction<'static>, table: &str) -> std::result::Result<(), StorageError> {
    tx.commit().await.map_err(|e| map_sqlx_error(table, e))
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self, audit), fields(site = %key.physical_pbx, cm = %key.remark))]
    async fn upsert_system(
        &self,
        key: &SystemKey,
        audit: &AuditStamp,
    ) -> std::result::Result<UpsertOutcome, StorageError> {
        let mut tx = self.begin(PBX_SYSTEM).await?;
        let lock_key = format!("{}\u{1f}{}", key.physical_pbx, key.remark);
        lock_natural_key(&mut tx, PBX_SYSTEM, LOCK_SYSTEM, &lock_key).await?;

        let existing: Option<i64> = query_scalar(
            "SELECT id::BIGINT FROM pbx_system WHERE physical_pbx = $1 AND remark = $2 LIMIT 1",
        )
        .bind(&key.physical_pbx)
        .bind(&key.remark)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(PBX_SYSTEM, e))?;

        let outcome = match existing {
            Some(id) => {
                let affected = query(
                    "UPDATE pbx_system SET aem_pbx = $1, log_updated_by = $2, log_updated_on = $3 \
                     WHERE id = $4",
                )
                .bind(&key.physical_pbx)
                .bind(&audit.user)
                .bind(audit.at)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(PBX_SYSTEM, e))?
                .rows_affected();
                if affected == 0 {
                    UpsertOutcome::Untouched
                } else {
                    UpsertOutcome::Updated
                }
            }
            None => {
                query(
                    "INSERT INTO pbx_system (physical_pbx, remark, aem_pbx, id_pbx_cluster, \
                     log_created_by, log_created_on, log_updated_by, log_updated_on) \
                     VALUES ($1, $2, $1, $3, $4, $5, $4, $5)",
                )
                .bind(&key.physical_pbx)
                .bind(&key.remark)
                .bind(DEFAULT_CLUSTER_ID)
                .bind(&audit.user)
                .bind(audit.at)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(PBX_SYSTEM, e))?;
                UpsertOutcome::Inserted
            }
        };

        commit(tx, PBX_SYSTEM).await?;
        debug!(?outcome, "pbx_system upserted");
        Ok(outcome)
    }

    async fn find_system_id(
        &self,
        key: &SystemKey,
    ) -> std::result::Result<Option<i64>, StorageError> {
        query_scalar(
            "SELECT id::BIGINT FROM pbx_system WHERE physical_pbx = $1 AND remark = $2 \
             ORDER BY id LIMIT 1",
        )
        .bind(&key.physical_pbx)
        .bind(&key.remark)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(PBX_SYSTEM, e))
    }

    async fn phone_number_type_id(
        &self,
        name: &str,
    ) -> std::result::Result<Option<i64>, StorageError> {
        query_scalar("SELECT id::BIGINT FROM pbx_phone_number_type WHERE name = $1 LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(PBX_PHONE_NUMBER_TYPE, e))
    }

    async fn upsert_number_range(
        &self,
        key: &NumberRangeKey,
        audit: &AuditStamp,
    ) -> std::result::Result<UpsertOutcome, StorageError> {
        let mut tx = self.begin(PBX_NUMBER_RANGE).await?;
        let lock_key = format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}",
            key.system_id, key.range_from, key.range_to, key.phone_number_type
        );
        lock_natural_key(&mut tx, PBX_NUMBER_RANGE, LOCK_NUMBER_RANGE, &lock_key).await?;

        let existing: Option<i64> = query_scalar(
            "SELECT id::BIGINT FROM pbx_number_range \
             WHERE id_pbx_system = $1 AND range_from = $2 AND range_to = $3 \
             AND phone_number_type = $4 LIMIT 1",
        )
        .bind(key.system_id)
        .bind(&key.range_from)
        .bind(&key.range_to)
        .bind(key.phone_number_type)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(PBX_NUMBER_RANGE, e))?;

        let outcome = match existing {
            Some(id) => {
                let affected = query(
                    "UPDATE pbx_number_range SET log_updated_by = $1, log_updated_on = $2 \
                     WHERE id = $3",
                )
                .bind(&audit.user)
                .bind(audit.at)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(PBX_NUMBER_RANGE, e))?
                .rows_affected();
                if affected == 0 {
                    UpsertOutcome::Untouched
                } else {
                    UpsertOutcome::Updated
                }
            }
            None => {
                query(
                    "INSERT INTO pbx_number_range (id_pbx_system, range_from, range_to, \
                     phone_number_type, id_pbx_cluster, log_created_by, log_created_on, \
                     log_updated_by, log_updated_on) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $6, $7)",
                )
                .bind(key.system_id)
                .bind(&key.range_from)
                .bind(&key.range_to)
                .bind(key.phone_number_type)
                .bind(DEFAULT_CLUSTER_ID)
                .bind(&audit.user)
                .bind(audit.at)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(PBX_NUMBER_RANGE, e))?;
                UpsertOutcome::Inserted
            }
        };

        commit(tx, PBX_NUMBER_RANGE).await?;
        Ok(outcome)
    }

    async fn upsert_reservation(
        &self,
        key: &ReservationKey,
        audit: &AuditStamp,
    ) -> std::result::Result<UpsertOutcome, StorageError> {
        let mut tx = self.begin(PBX_NUMBER_RESERVED).await?;
        let lock_key = format!("{}\u{1f}{}", key.system_id, key.extension);
        lock_natural_key(&mut tx, PBX_NUMBER_RESERVED, LOCK_NUMBER_RESERVED, &lock_key).await?;

        let existing: Option<i64> = query_scalar(
            "SELECT id::BIGINT FROM pbx_number_reserved \
             WHERE pbx_system_id = $1 AND extensions = $2 LIMIT 1",
        )
        .bind(key.system_id)
        .bind(&key.extension)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(PBX_NUMBER_RESERVED, e))?;

        let outcome = match existing {
            Some(id) => {
                let affected = query(
                    "UPDATE pbx_number_reserved SET reserve_start_time = $1, reserve_end_time = $1 \
                     WHERE id = $2",
                )
                .bind(audit.at)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(PBX_NUMBER_RESERVED, e))?
                .rows_affected();
                if affected == 0 {
                    UpsertOutcome::Untouched
                } else {
                    UpsertOutcome::Updated
                }
            }
            None => {
                query(
                    "INSERT INTO pbx_number_reserved (pbx_system_id, extensions, \
                     reserve_start_time, reserve_end_time) VALUES ($1, $2, $3, $3)",
                )
                .bind(key.system_id)
                .bind(&key.extension)
                .bind(audit.at)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(PBX_NUMBER_RESERVED, e))?;
                UpsertOutcome::Inserted
            }
        };

        commit(tx, PBX_NUMBER_RESERVED).await?;
        Ok(outcome)
    }

    async fn ping(&self) -> std::result::Result<(), StorageError> {
        query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::connection_error(e.to_string()))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
