// ABOUTME: The StaffStore trait: one persistence contract implemented by every backend.
// ABOUTME: Callers hold an Arc<dyn StaffStore> chosen once at startup and never branch on backend.

use std::time::Duration;

use async_trait::async_trait;
use staffvax_core::{GroupingColumn, StaffFields, StaffRecord, StatusUpdate, VaccinationStatus};

use crate::error::StoreError;

/// Backend-agnostic access to the `staff` table.
///
/// Every implementation must produce the same observable results for the
/// same calls, including listing order (byte-wise, NULLs last, `id` as
/// tie-breaker).
#[async_trait]
pub trait StaffStore: Send + Sync {
    /// Short backend name for logs and reports.
    fn backend(&self) -> &'static str;

    /// Insert a row, or overwrite the six detail columns of the row with the
    /// same employee number. `id`, `created_at` and `vaccinated` of an
    /// existing row are left alone. Returns the row id.
    async fn upsert_staff(&self, fields: &StaffFields) -> Result<i64, StoreError>;

    /// Set the status for an employee. `Ok(false)` when no row matched.
    async fn update_vaccination_status(
        &self,
        employee_number: &str,
        status: VaccinationStatus,
    ) -> Result<bool, StoreError>;

    /// Apply many status updates inside a single transaction. Returns, per
    /// update, whether a row matched. Any error rolls back every update.
    async fn update_statuses(&self, updates: &[StatusUpdate]) -> Result<Vec<bool>, StoreError>;

    async fn get_by_employee_number(
        &self,
        employee_number: &str,
    ) -> Result<Option<StaffRecord>, StoreError>;

    /// Email is not unique in the schema. When several rows share an email
    /// the one with the lowest id is returned.
    async fn get_by_email(&self, email: &str) -> Result<Option<StaffRecord>, StoreError>;

    /// All rows ordered by last name, then first name. Legacy rows without an
    /// employee number are included.
    async fn list_all(&self) -> Result<Vec<StaffRecord>, StoreError>;

    /// Distinct non-blank values of a grouping column, ascending.
    async fn list_distinct(&self, column: GroupingColumn) -> Result<Vec<String>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    /// Rows with `id > last_id`, ordered by id ascending.
    async fn records_after(&self, last_id: i64) -> Result<Vec<StaffRecord>, StoreError>;

    /// Upsert a batch of records inside a single transaction, carrying over
    /// `vaccinated` and `created_at`. Either every row commits or none does.
    /// `row_delay` is slept between rows to throttle the backend.
    async fn write_batch(
        &self,
        batch: &[StaffRecord],
        row_delay: Duration,
    ) -> Result<(), StoreError>;
}
