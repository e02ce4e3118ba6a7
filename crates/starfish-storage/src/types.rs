//! Row and key types shared by every inventory storage backend.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// User recorded in the `log_*_by` audit columns for rows written by the sync.
pub const SYSTEM_USER: &str = "system";

/// Cluster assigned to newly inserted systems and ranges.
pub const DEFAULT_CLUSTER_ID: i64 = 1;

/// Phone number type used when a range's `Type` is not in the lookup table.
pub const DEFAULT_PHONE_NUMBER_TYPE_ID: i64 = 1;

/// Who wrote a row and when. Captured once per reconciliation call so every
/// row touched by that call carries the same instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditStamp {
    pub user: String,
    pub at: NaiveDateTime,
}

impl AuditStamp {
    pub fn new(user: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            user: user.into(),
            at,
        }
    }

    /// `"system"` at the current local wall-clock time.
    pub fn system_now() -> Self {
        Self::new(SYSTEM_USER, Local::now().naive_local())
    }
}

/// Result of a check-then-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// The row was found but the update touched nothing.
    Untouched,
}

/// Natural key of `pbx_system`: `(physical_pbx, remark)` = `(site, cm)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemKey {
    pub physical_pbx: String,
    pub remark: String,
}

impl SystemKey {
    pub fn new(site: impl Into<String>, cm: impl Into<String>) -> Self {
        Self {
            physical_pbx: site.into(),
            remark: cm.into(),
        }
    }
}

/// Natural key of `pbx_number_range`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NumberRangeKey {
    pub system_id: i64,
    pub range_from: String,
    pub range_to: String,
    pub phone_number_type: i64,
}

/// Natural key of `pbx_number_reserved`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationKey {
    pub system_id: i64,
    pub extension: String,
}

impl ReservationKey {
    pub fn new(system_id: i64, extension: impl Into<String>) -> Self {
        Self {
            system_id,
            extension: extension.into(),
        }
    }
}

/// A `pbx_system` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PbxSystem {
    pub id: i64,
    pub physical_pbx: String,
    pub remark: String,
    pub aem_pbx: String,
    pub id_pbx_cluster: i64,
    pub log_created_by: String,
    pub log_created_on: NaiveDateTime,
    pub log_updated_by: String,
    pub log_updated_on: NaiveDateTime,
}

/// A `pbx_number_range` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PbxNumberRange {
    pub id: i64,
    pub id_pbx_system: i64,
    pub range_from: String,
    pub range_to: String,
    pub phone_number_type: i64,
    pub id_pbx_cluster: i64,
    pub log_created_by: String,
    pub log_created_on: NaiveDateTime,
    pub log_updated_by: String,
    pub log_updated_on: NaiveDateTime,
}

/// A `pbx_number_reserved` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PbxNumberReserved {
    pub id: i64,
    pub pbx_system_id: i64,
    pub extensions: String,
    pub reserve_start_time: NaiveDateTime,
    pub reserve_end_time: NaiveDateTime,
}
