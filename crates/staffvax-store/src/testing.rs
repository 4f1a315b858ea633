// ABOUTME: Test utilities for staffvax-store: a failure-injecting wrapper and legacy fixtures.
// ABOUTME: Used to drive migration retry, exhaustion and unkeyed-row paths without a flaky network.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{Connection, params};
use staffvax_core::{GroupingColumn, StaffFields, StaffRecord, StatusUpdate, VaccinationStatus};

use crate::error::StoreError;
use crate::store::StaffStore;

/// The staff table as first deployed: the employee number may be NULL.
const LEGACY_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS staff (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_number TEXT UNIQUE,
        directorate TEXT,
        organisation TEXT,
        employee_first_name TEXT,
        employee_last_name TEXT,
        email TEXT,
        vaccinated TEXT DEFAULT 'no',
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );";

/// Create a database file with the legacy schema and one row per entry,
/// ids assigned in order. `None` leaves the employee number NULL.
pub fn create_legacy_database(
    path: &Path,
    employee_numbers: &[Option<&str>],
) -> Result<(), StoreError> {
    let conn = Connection::open(path)?;
    conn.execute_batch(LEGACY_SCHEMA)?;
    for (i, number) in employee_numbers.iter().enumerate() {
        conn.execute(
            "INSERT INTO staff (employee_number, directorate, employee_last_name)
             VALUES (?1, 'Surgery', ?2)",
            params![number, format!("Legacy{:03}", i + 1)],
        )?;
    }
    Ok(())
}

/// Delegates to an inner store, but fails chosen `write_batch` calls with
/// `BackendUnavailable` before they reach it.
///
/// Calls are numbered from zero in the order they arrive, so a plan like
/// `failing_calls([2, 3])` fails the first two attempts of the third batch
/// when every earlier batch succeeds first time.
pub struct FlakyStore {
    inner: Arc<dyn StaffStore>,
    failing: HashSet<usize>,
    calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn StaffStore>) -> Self {
        Self {
            inner,
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail the `write_batch` calls with these zero-based call numbers.
    pub fn failing_calls(mut self, calls: impl IntoIterator<Item = usize>) -> Self {
        self.failing.extend(calls);
        self
    }

    /// Number of `write_batch` calls seen so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StaffStore for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    async fn upsert_staff(&self, fields: &StaffFields) -> Result<i64, StoreError> {
        self.inner.upsert_staff(fields).await
    }

    async fn update_vaccination_status(
        &self,
        employee_number: &str,
        status: VaccinationStatus,
    ) -> Result<bool, StoreError> {
        self.inner.update_vaccination_status(employee_number, status).await
    }

    async fn update_statuses(&self, updates: &[StatusUpdate]) -> Result<Vec<bool>, StoreError> {
        self.inner.update_statuses(updates).await
    }

    async fn get_by_employee_number(
        &self,
        employee_number: &str,
    ) -> Result<Option<StaffRecord>, StoreError> {
        self.inner.get_by_employee_number(employee_number).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<StaffRecord>, StoreError> {
        self.inner.get_by_email(email).await
    }

    async fn list_all(&self) -> Result<Vec<StaffRecord>, StoreError> {
        self.inner.list_all().await
    }

    async fn list_distinct(&self, column: GroupingColumn) -> Result<Vec<String>, StoreError> {
        self.inner.list_distinct(column).await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.inner.count().await
    }

    async fn records_after(&self, last_id: i64) -> Result<Vec<StaffRecord>, StoreError> {
        self.inner.records_after(last_id).await
    }

    async fn write_batch(
        &self,
        batch: &[StaffRecord],
        row_delay: Duration,
    ) -> Result<(), StoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&call) {
            return Err(StoreError::BackendUnavailable(format!(
                "injected failure on write_batch call {call}"
            )));
        }
        self.inner.write_batch(batch, row_delay).await
    }
}
