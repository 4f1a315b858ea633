// ABOUTME: Persistence layer for staffvax: one StaffStore contract over SQLite and PostgreSQL.
// ABOUTME: Also provides backend selection, the resumable migration engine, and import runners.

pub mod checkpoint;
pub mod config;
#[cfg(test)]
mod contract;
pub mod error;
pub mod import;
pub mod migrate;
pub mod postgres;
pub mod sqlite;
pub mod store;
pub mod testing;

pub use checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
pub use config::{
    ConfigError, DatabaseConfig, HostedConfig, Mode, open_embedded, open_hosted, open_store,
};
pub use error::StoreError;
pub use import::{ImportError, ImportSummary, import_staff, import_statuses, read_rows};
pub use migrate::{MigrationEngine, MigrationError, MigrationReport, MigrationSettings};
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
pub use store::StaffStore;
