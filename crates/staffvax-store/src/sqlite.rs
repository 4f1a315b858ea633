// ABOUTME: Embedded SQLite backend for the staff table, used for local and development runs.
// ABOUTME: Runs synchronous rusqlite calls on the blocking pool behind the async StaffStore trait.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use staffvax_core::{GroupingColumn, StaffFields, StaffRecord, StatusUpdate, VaccinationStatus};

use crate::error::StoreError;
use crate::store::StaffStore;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS staff (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_number TEXT NOT NULL UNIQUE CHECK (employee_number <> ''),
        directorate TEXT,
        organisation TEXT,
        employee_first_name TEXT,
        employee_last_name TEXT,
        email TEXT,
        vaccinated TEXT DEFAULT 'no',
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_staff_email ON staff(email);
    CREATE INDEX IF NOT EXISTS idx_staff_directorate ON staff(directorate);
    CREATE INDEX IF NOT EXISTS idx_staff_organisation ON staff(organisation);";

const COLUMNS: &str = "id, employee_number, directorate, organisation, employee_first_name, \
                       employee_last_name, email, vaccinated, created_at";

const UPSERT_STAFF: &str = "
    INSERT INTO staff (employee_number, directorate, organisation, employee_first_name,
                       employee_last_name, email, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT(employee_number) DO UPDATE SET
        directorate = excluded.directorate,
        organisation = excluded.organisation,
        employee_first_name = excluded.employee_first_name,
        employee_last_name = excluded.employee_last_name,
        email = excluded.email
    RETURNING id";

const UPSERT_MIGRATED: &str = "
    INSERT INTO staff (employee_number, directorate, organisation, employee_first_name,
                       employee_last_name, email, vaccinated, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(employee_number) DO UPDATE SET
        directorate = excluded.directorate,
        organisation = excluded.organisation,
        employee_first_name = excluded.employee_first_name,
        employee_last_name = excluded.employee_last_name,
        email = excluded.email,
        vaccinated = excluded.vaccinated,
        created_at = excluded.created_at";

const UPDATE_STATUS: &str = "UPDATE staff SET vaccinated = ?1 WHERE employee_number = ?2";

fn map_row(row: &Row<'_>) -> rusqlite::Result<StaffRecord> {
    let vaccinated: Option<String> = row.get(7)?;
    Ok(StaffRecord {
        id: row.get(0)?,
        employee_number: row.get(1)?,
        directorate: row.get(2)?,
        organisation: row.get(3)?,
        employee_first_name: row.get(4)?,
        employee_last_name: row.get(5)?,
        email: row.get(6)?,
        vaccinated: VaccinationStatus::from_stored(vaccinated.as_deref()),
        created_at: row.get(8)?,
    })
}

/// A file-backed SQLite store. The single connection is shared behind a
/// mutex, so statements from concurrent callers run one at a time.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        tracing::debug!(path = %path.display(), "opened sqlite store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking thread pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::BackendUnavailable("sqlite connection poisoned".into()))?;
            f(&mut guard).map_err(StoreError::from)
        })
        .await
        .map_err(|e| StoreError::BackendUnavailable(format!("sqlite worker failed: {e}")))?
    }

    async fn query_one(
        &self,
        column: &'static str,
        value: &str,
    ) -> Result<Option<StaffRecord>, StoreError> {
        let value = value.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM staff WHERE {column} = ?1 ORDER BY id LIMIT 1"),
                params![value],
                map_row,
            )
            .optional()
        })
        .await
    }
}

#[async_trait]
impl StaffStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn upsert_staff(&self, fields: &StaffFields) -> Result<i64, StoreError> {
        let fields = fields.clone();
        self.with_conn(move |conn| {
            conn.query_row(
                UPSERT_STAFF,
                params![
                    fields.employee_number,
                    fields.directorate,
                    fields.organisation,
                    fields.employee_first_name,
                    fields.employee_last_name,
                    fields.email,
                    Utc::now().naive_utc(),
                ],
                |row| row.get(0),
            )
        })
        .await
    }

    async fn update_vaccination_status(
        &self,
        employee_number: &str,
        status: VaccinationStatus,
    ) -> Result<bool, StoreError> {
        let employee_number = employee_number.to_string();
        let changed = self
            .with_conn(move |conn| {
                conn.execute(UPDATE_STATUS, params![status.as_str(), employee_number])
            })
            .await?;
        Ok(changed > 0)
    }

    async fn update_statuses(&self, updates: &[StatusUpdate]) -> Result<Vec<bool>, StoreError> {
        let updates = updates.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut matched = Vec::with_capacity(updates.len());
            {
                let mut stmt = tx.prepare(UPDATE_STATUS)?;
                for update in &updates {
                    let changed =
                        stmt.execute(params![update.status.as_str(), update.employee_number])?;
                    matched.push(changed > 0);
                }
            }
            tx.commit()?;
            Ok(matched)
        })
        .await
    }

    async fn get_by_employee_number(
        &self,
        employee_number: &str,
    ) -> Result<Option<StaffRecord>, StoreError> {
        self.query_one("employee_number", employee_number).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<StaffRecord>, StoreError> {
        self.query_one("email", email).await
    }

    async fn list_all(&self) -> Result<Vec<StaffRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM staff
                 ORDER BY employee_last_name ASC NULLS LAST,
                          employee_first_name ASC NULLS LAST,
                          id ASC"
            ))?;
            let rows = stmt.query_map([], map_row)?;
            rows.collect()
        })
        .await
    }

    async fn list_distinct(&self, column: GroupingColumn) -> Result<Vec<String>, StoreError> {
        let name = column.column();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT DISTINCT {name} FROM staff
                 WHERE {name} IS NOT NULL AND {name} != ''
                 ORDER BY {name}"
            ))?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })
        .await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .with_conn(|conn| conn.query_row("SELECT COUNT(*) FROM staff", [], |row| row.get(0)))
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn records_after(&self, last_id: i64) -> Result<Vec<StaffRecord>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM staff WHERE id > ?1 ORDER BY id"))?;
            let rows = stmt.query_map(params![last_id], map_row)?;
            rows.collect()
        })
        .await
    }

    async fn write_batch(
        &self,
        batch: &[StaffRecord],
        row_delay: Duration,
    ) -> Result<(), StoreError> {
        let batch = batch.to_vec();
        self.with_conn(move |conn| {
            // Dropping an uncommitted transaction rolls it back.
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(UPSERT_MIGRATED)?;
                for (i, record) in batch.iter().enumerate() {
                    if i > 0 && !row_delay.is_zero() {
                        std::thread::sleep(row_delay);
                    }
                    stmt.execute(params![
                        record.employee_number,
                        record.directorate,
                        record.organisation,
                        record.employee_first_name,
                        record.employee_last_name,
                        record.email,
                        record.vaccinated.map(|s| s.as_str()),
                        record.created_at,
                    ])?;
                }
            }
            tx.commit()
        })
        .await
    }
}
