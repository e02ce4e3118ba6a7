//! Maps site-details payloads onto `pbx_system`, `pbx_number_range` and
//! `pbx_number_reserved` rows.
//!
//! Per-row storage errors are logged and the batch moves on. Only systemic
//! errors (the backend is unreachable) end an `apply` call early.

use std::collections::HashSet;

use serde::Serialize;
use starfish_core::{RangeEntry, SiteDetailsPayload};
use starfish_storage::{
    AuditStamp, DEFAULT_PHONE_NUMBER_TYPE_ID, DynInventoryStore, NumberRangeKey, ReservationKey,
    StorageError, SystemKey, UpsertOutcome,
};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Storage unavailable: {0}")]
    Storage(#[from] StorageError),
}

/// Counters for one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertCounts {
    /// Rows that reached storage and came back without error.
    pub processed: u32,
    pub updated: u32,
    pub inserted: u32,
    /// Rows whose write failed.
    pub failed: u32,
    /// Entries rejected before reaching storage.
    pub skipped: u32,
}

impl UpsertCounts {
    fn record(&mut self, outcome: UpsertOutcome) {
        self.processed += 1;
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Untouched => {}
        }
    }

    fn merge(&mut self, other: &UpsertCounts) {
        self.processed += other.processed;
        self.updated += other.updated;
        self.inserted += other.inserted;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// Result of reconciling one `(site, cm)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    /// `None` when the system write failed.
    pub system: Option<UpsertOutcome>,
    /// `false` when the system id could not be resolved and children were skipped.
    pub system_resolved: bool,
    pub ranges: UpsertCounts,
    pub reservations: UpsertCounts,
    /// Extensions seen more than once in the call.
    pub duplicates: u32,
}

impl ReconciliationSummary {
    pub fn processed(&self) -> u32 {
        self.ranges.processed + self.reservations.processed
    }

    pub fn updated(&self) -> u32 {
        self.ranges.updated + self.reservations.updated
    }

    pub fn inserted(&self) -> u32 {
        self.ranges.inserted + self.reservations.inserted
    }
}

/// Aggregate over every result of one or more site-details payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SiteDetailsSummary {
    /// Results that were reconciled.
    pub results: u32,
    /// Results without a site or CM.
    pub skipped: u32,
    pub ranges: UpsertCounts,
    pub reservations: UpsertCounts,
    pub duplicates: u32,
}

impl SiteDetailsSummary {
    fn absorb(&mut self, summary: &ReconciliationSummary) {
        self.results += 1;
        self.ranges.merge(&summary.ranges);
        self.reservations.merge(&summary.reservations);
        self.duplicates += summary.duplicates;
    }

    pub fn merge(&mut self, other: &SiteDetailsSummary) {
        self.results += other.results;
        self.skipped += other.skipped;
        self.ranges.merge(&other.ranges);
        self.reservations.merge(&other.reservations);
        self.duplicates += other.duplicates;
    }
}

/// Stateless apart from its store handle; safe to share between tasks.
#[derive(Clone)]
pub struct ReconciliationEngine {
    store: DynInventoryStore,
}

impl ReconciliationEngine {
    pub fn new(store: DynInventoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &DynInventoryStore {
        &self.store
    }

    /// Reconciles every result of every payload.
    #[instrument(skip_all, fields(payloads = payloads.len()))]
    pub async fn apply_site_details(
        &self,
        payloads: &[SiteDetailsPayload],
    ) -> Result<SiteDetailsSummary, EngineError> {
        let mut total = SiteDetailsSummary::default();

        for payload in payloads {
            for result in &payload.results {
                let (Some(site), Some(cm)) = (result.site.as_deref(), result.cm.as_deref()) else {
                    warn!(
                        site = ?result.site,
                        cm = ?result.cm,
                        "Site result without site or CM, skipping"
                    );
                    total.skipped += 1;
                    continue;
                };
                let summary = self.apply(site, cm, &result.ranges).await?;
                total.absorb(&summary);
            }
        }

        info!(
            results = total.results,
            skipped = total.skipped,
            ranges_updated = total.ranges.updated,
            ranges_inserted = total.ranges.inserted,
            reservations_updated = total.reservations.updated,
            reservations_inserted = total.reservations.inserted,
            "Site details reconciled"
        );
        Ok(total)
    }

    /// Upserts the system for `(site, cm)`, then its ranges and reservations.
    #[instrument(skip(self, ranges), fields(ranges = ranges.len()))]
    pub async fn apply(
        &self,
        site: &str,
        cm: &str,
        ranges: &[RangeEntry],
    ) -> Result<ReconciliationSummary, EngineError> {
        let audit = AuditStamp::system_now();
        let key = SystemKey::new(site, cm);
        let mut summary = ReconciliationSummary::default();

        match self.store.upsert_system(&key, &audit).await {
            Ok(UpsertOutcome::Untouched) => {
                warn!(site, cm, "No pbx_system record was updated");
                summary.system = Some(UpsertOutcome::Untouched);
            }
            Ok(outcome) => {
                debug!(site, cm, ?outcome, "pbx_system upserted");
                summary.system = Some(outcome);
            }
            Err(e) if e.is_systemic() => return Err(e.into()),
            Err(e) => {
                error!(site, cm, error = %e, "Failed to upsert pbx_system");
            }
        }

        let system_id = match self.store.find_system_id(&key).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                warn!(site, cm, "No pbx_system record found, skipping ranges and reservations");
                return Ok(summary);
            }
            Err(e) if e.is_systemic() => return Err(e.into()),
            Err(e) => {
                error!(site, cm, error = %e, "Failed to resolve pbx_system id, skipping ranges and reservations");
                return Ok(summary);
            }
        };
        summary.system_resolved = true;

        self.apply_ranges(site, cm, system_id, ranges, &audit, &mut summary)
            .await?;
        self.apply_reservations(site, cm, system_id, ranges, &audit, &mut summary)
            .await?;

        debug!(
            site,
            cm,
            system_id,
            processed = summary.processed(),
            updated = summary.updated(),
            inserted = summary.inserted(),
            "Reconciled site"
        );
        Ok(summary)
    }

    async fn apply_ranges(
        &self,
        site: &str,
        cm: &str,
        system_id: i64,
        ranges: &[RangeEntry],
        audit: &AuditStamp,
        summary: &mut ReconciliationSummary,
    ) -> Result<(), EngineError> {
        for (index, range) in ranges.iter().enumerate() {
            let valid = match range.validate() {
                Ok(valid) => valid,
                Err(e) => {
                    warn!(site, cm, index, error = %e, "Skipping range with missing required fields");
                    summary.ranges.skipped += 1;
                    continue;
                }
            };

            let phone_number_type = self.resolve_phone_number_type(valid.kind).await?;
            let key = NumberRangeKey {
                system_id,
                range_from: valid.lower_bound.to_string(),
                range_to: valid.upper_bound.to_string(),
                phone_number_type,
            };

            match self.store.upsert_number_range(&key, audit).await {
                Ok(outcome) => summary.ranges.record(outcome),
                Err(e) if e.is_systemic() => return Err(e.into()),
                Err(e) => {
                    error!(
                        site,
                        cm,
                        system_id,
                        range_from = %key.range_from,
                        range_to = %key.range_to,
                        error = %e,
                        "Failed to upsert pbx_number_range"
                    );
                    summary.ranges.failed += 1;
                }
            }
        }
        Ok(())
    }

    async fn apply_reservations(
        &self,
        site: &str,
        cm: &str,
        system_id: i64,
        ranges: &[RangeEntry],
        audit: &AuditStamp,
        summary: &mut ReconciliationSummary,
    ) -> Result<(), EngineError> {
        let mut seen: HashSet<&str> = HashSet::new();

        for extension in ranges.iter().flat_map(|r| r.extensions()) {
            if !seen.insert(extension) {
                debug!(site, cm, extension, "Duplicate extension in payload");
                summary.duplicates += 1;
                continue;
            }

            let key = ReservationKey::new(system_id, extension);
            match self.store.upsert_reservation(&key, audit).await {
                Ok(outcome) => summary.reservations.record(outcome),
                Err(e) if e.is_systemic() => return Err(e.into()),
                Err(e) => {
                    error!(
                        site,
                        cm,
                        system_id,
                        extension,
                        error = %e,
                        "Failed to upsert pbx_number_reserved"
                    );
                    summary.reservations.failed += 1;
                }
            }
        }
        Ok(())
    }

    async fn resolve_phone_number_type(&self, name: &str) -> Result<i64, EngineError> {
        match self.store.phone_number_type_id(name).await {
            Ok(Some(id)) => Ok(id),
            Ok(None) => {
                warn!(phone_number_type = name, "No phone_number_type found, using default");
                Ok(DEFAULT_PHONE_NUMBER_TYPE_ID)
            }
            Err(e) if e.is_systemic() => Err(e.into()),
            Err(e) => {
                warn!(phone_number_type = name, error = %e, "Error getting phone_number_type id, using default");
                Ok(DEFAULT_PHONE_NUMBER_TYPE_ID)
            }
        }
    }
}
