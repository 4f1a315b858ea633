// ABOUTME: Hosted PostgreSQL backend for the staff table, used in production.
// ABOUTME: Wraps a sqlx connection pool with relaxed TLS trust and pool-level timeouts.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use staffvax_core::{GroupingColumn, StaffFields, StaffRecord, StatusUpdate, VaccinationStatus};

use crate::config::HostedConfig;
use crate::error::StoreError;
use crate::store::StaffStore;

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS staff (
        id BIGSERIAL PRIMARY KEY,
        employee_number TEXT NOT NULL UNIQUE CHECK (employee_number <> ''),
        directorate TEXT,
        organisation TEXT,
        employee_first_name TEXT,
        employee_last_name TEXT,
        email TEXT,
        vaccinated TEXT DEFAULT 'no',
        created_at TIMESTAMP NOT NULL DEFAULT (now() AT TIME ZONE 'utc')
    )",
    "CREATE INDEX IF NOT EXISTS idx_staff_email ON staff(email)",
    "CREATE INDEX IF NOT EXISTS idx_staff_directorate ON staff(directorate)",
    "CREATE INDEX IF NOT EXISTS idx_staff_organisation ON staff(organisation)",
];

const COLUMNS: &str = "id, employee_number, directorate, organisation, employee_first_name, \
                       employee_last_name, email, vaccinated, created_at";

const UPSERT_STAFF: &str = "
    INSERT INTO staff (employee_number, directorate, organisation, employee_first_name,
                       employee_last_name, email, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (employee_number) DO UPDATE SET
        directorate = EXCLUDED.directorate,
        organisation = EXCLUDED.organisation,
        employee_first_name = EXCLUDED.employee_first_name,
        employee_last_name = EXCLUDED.employee_last_name,
        email = EXCLUDED.email
    RETURNING id";

const UPSERT_MIGRATED: &str = "
    INSERT INTO staff (employee_number, directorate, organisation, employee_first_name,
                       employee_last_name, email, vaccinated, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ON CONFLICT (employee_number) DO UPDATE SET
        directorate = EXCLUDED.directorate,
        organisation = EXCLUDED.organisation,
        employee_first_name = EXCLUDED.employee_first_name,
        employee_last_name = EXCLUDED.employee_last_name,
        email = EXCLUDED.email,
        vaccinated = EXCLUDED.vaccinated,
        created_at = EXCLUDED.created_at";

const UPDATE_STATUS: &str = "UPDATE staff SET vaccinated = $1 WHERE employee_number = $2";

#[derive(sqlx::FromRow)]
struct StaffRow {
    id: i64,
    employee_number: Option<String>,
    directorate: Option<String>,
    organisation: Option<String>,
    employee_first_name: Option<String>,
    employee_last_name: Option<String>,
    email: Option<String>,
    vaccinated: Option<String>,
    created_at: NaiveDateTime,
}

impl From<StaffRow> for StaffRecord {
    fn from(row: StaffRow) -> Self {
        StaffRecord {
            id: row.id,
            employee_number: row.employee_number,
            directorate: row.directorate,
            organisation: row.organisation,
            employee_first_name: row.employee_first_name,
            employee_last_name: row.employee_last_name,
            email: row.email,
            vaccinated: VaccinationStatus::from_stored(row.vaccinated.as_deref()),
            created_at: row.created_at,
        }
    }
}

/// A PostgreSQL store backed by a connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to the hosted database and ensure the schema exists.
    pub async fn connect(config: &HostedConfig) -> Result<Self, StoreError> {
        Self::connect_with(config, config.connect_options()).await
    }

    /// Connect with explicit connection options, keeping the pool settings
    /// from `config`.
    pub(crate) async fn connect_with(
        config: &HostedConfig,
        options: PgConnectOptions,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .connect_with(options)
            .await?;

        tracing::info!(
            host = %config.host,
            database = %config.database,
            max_connections = config.max_connections,
            "connected to postgres"
        );

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the staff table and its indexes if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Wait for pooled connections to finish and close them.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn query_one(
        &self,
        column: &'static str,
        value: &str,
    ) -> Result<Option<StaffRecord>, StoreError> {
        let row: Option<StaffRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM staff WHERE {column} = $1 ORDER BY id LIMIT 1"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(StaffRecord::from))
    }
}

#[async_trait]
impl StaffStore for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn upsert_staff(&self, fields: &StaffFields) -> Result<i64, StoreError> {
        let (id,): (i64,) = sqlx::query_as(UPSERT_STAFF)
            .bind(&fields.employee_number)
            .bind(&fields.directorate)
            .bind(&fields.organisation)
            .bind(&fields.employee_first_name)
            .bind(&fields.employee_last_name)
            .bind(&fields.email)
            .bind(Utc::now().naive_utc())
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    async fn update_vaccination_status(
        &self,
        employee_number: &str,
        status: VaccinationStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(UPDATE_STATUS)
            .bind(status.as_str())
            .bind(employee_number)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_statuses(&self, updates: &[StatusUpdate]) -> Result<Vec<bool>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut matched = Vec::with_capacity(updates.len());
        for update in updates {
            let result = sqlx::query(UPDATE_STATUS)
                .bind(update.status.as_str())
                .bind(&update.employee_number)
                .execute(&mut *tx)
                .await?;
            matched.push(result.rows_affected() > 0);
        }
        tx.commit().await?;
        Ok(matched)
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
        let rows: Vec<StaffRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM staff
             ORDER BY employee_last_name COLLATE \"C\" ASC NULLS LAST,
                      employee_first_name COLLATE \"C\" ASC NULLS LAST,
                      id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StaffRecord::from).collect())
    }

    async fn list_distinct(&self, column: GroupingColumn) -> Result<Vec<String>, StoreError> {
        let name = column.column();
        let values: Vec<(String,)> = sqlx::query_as(&format!(
            "SELECT DISTINCT {name} FROM staff
             WHERE {name} IS NOT NULL AND {name} != ''
             ORDER BY {name} COLLATE \"C\""
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(values.into_iter().map(|(v,)| v).collect())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM staff")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn records_after(&self, last_id: i64) -> Result<Vec<StaffRecord>, StoreError> {
        let rows: Vec<StaffRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM staff WHERE id > $1 ORDER BY id"))
                .bind(last_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(StaffRecord::from).collect())
    }

    async fn write_batch(
        &self,
        batch: &[StaffRecord],
        row_delay: Duration,
    ) -> Result<(), StoreError> {
        // Dropping an uncommitted transaction rolls it back.
        let mut tx = self.pool.begin().await?;

        for (i, record) in batch.iter().enumerate() {
            if i > 0 && !row_delay.is_zero() {
                tokio::time::sleep(row_delay).await;
            }
            sqlx::query(UPSERT_MIGRATED)
                .bind(&record.employee_number)
                .bind(&record.directorate)
                .bind(&record.organisation)
                .bind(&record.employee_first_name)
                .bind(&record.employee_last_name)
                .bind(&record.email)
                .bind(record.vaccinated.map(|s| s.as_str()))
                .bind(record.created_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
