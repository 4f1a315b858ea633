// ABOUTME: Resumable batch migration of staff records from one store to another.
// ABOUTME: Copies rows newer than the checkpoint in transactional batches with retry and back-off.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use staffvax_core::StaffRecord;
use staffvax_core::report::percentage;
use thiserror::Error;

use crate::checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
use crate::error::StoreError;
use crate::store::StaffStore;

/// Errors that abort a migration run. Batch write failures never do; they
/// are retried and then counted.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("source store error: {0}")]
    Source(#[from] StoreError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Tunables for a migration run.
#[derive(Debug, Clone)]
pub struct MigrationSettings {
    pub batch_size: usize,
    /// Total write attempts per batch, including the first.
    pub max_attempts: u32,
    /// Wait before retry `n` is `n * retry_backoff`.
    pub retry_backoff: Duration,
    /// Pause after each batch, whatever its outcome.
    pub batch_delay: Duration,
    /// Pause between row writes inside a batch.
    pub row_delay: Duration,
    /// Grand total that overall progress is reported against.
    pub expected_total: u64,
}

impl MigrationSettings {
    pub fn new(expected_total: u64) -> Self {
        Self {
            batch_size: 25,
            max_attempts: 8,
            retry_backoff: Duration::from_secs(8),
            batch_delay: Duration::from_secs(2),
            row_delay: Duration::from_millis(100),
            expected_total,
        }
    }

    /// Same settings with every delay removed.
    pub fn without_delays(self) -> Self {
        Self {
            retry_backoff: Duration::ZERO,
            batch_delay: Duration::ZERO,
            row_delay: Duration::ZERO,
            ..self
        }
    }

    /// Wait before the retry that follows failed attempt number `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff * attempt
    }
}

/// Outcome of a migration run.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationReport {
    /// Rows handled in this run, migrated or abandoned.
    pub processed: u64,
    pub succeeded: u64,
    /// Rows not migrated this run, including `unkeyed`.
    pub failed: u64,
    /// Legacy rows without an employee number, which cannot be upserted.
    pub unkeyed: u64,
    pub batches_committed: usize,
    pub batches_abandoned: usize,
    /// Checkpoint after the run; its counts are cumulative across runs.
    pub checkpoint: Checkpoint,
    pub expected_total: u64,
}

impl MigrationReport {
    /// Cumulative successes as a percentage of the expected total.
    pub fn completion_pct(&self) -> f64 {
        percentage(
            self.checkpoint.success_count as usize,
            self.expected_total as usize,
        )
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Migration Summary:")?;
        writeln!(f, "  Records processed this run: {}", self.processed)?;
        writeln!(f, "  Migrated this run: {}", self.succeeded)?;
        writeln!(f, "  Failed this run: {}", self.failed)?;
        if self.unkeyed > 0 {
            writeln!(f, "  Skipped without employee number: {}", self.unkeyed)?;
        }
        writeln!(f, "  Total processed: {}", self.checkpoint.processed())?;
        writeln!(f, "  Successfully migrated: {}", self.checkpoint.success_count)?;
        writeln!(f, "  Failed to migrate: {}", self.checkpoint.error_count)?;
        write!(f, "  Overall completion: {:.2}%", self.completion_pct())
    }
}

/// Copies every source row with `id` above the checkpoint into the target.
///
/// Batches run strictly in order. The checkpoint is saved after each batch,
/// so stopping the process at any point loses at most the in-flight batch,
/// which the next run repeats. Target writes are upserts, so a repeated batch
/// does not duplicate rows.
///
/// Failure handling is per batch: one bad row fails its whole batch, and a
/// batch that exhausts its attempts is skipped for good (counted in
/// `error_count`, with `last_processed_id` moved past it). Rows without an
/// employee number are never written; each counts as an error.
pub struct MigrationEngine {
    source: Arc<dyn StaffStore>,
    target: Arc<dyn StaffStore>,
    checkpoints: CheckpointStore,
    settings: MigrationSettings,
}

impl MigrationEngine {
    pub fn new(
        source: Arc<dyn StaffStore>,
        target: Arc<dyn StaffStore>,
        checkpoints: CheckpointStore,
        settings: MigrationSettings,
    ) -> Self {
        Self {
            source,
            target,
            checkpoints,
            settings,
        }
    }

    pub async fn run(&self) -> Result<MigrationReport, MigrationError> {
        let mut checkpoint = self.checkpoints.load()?;
        tracing::info!(
            last_processed_id = checkpoint.last_processed_id,
            success_count = checkpoint.success_count,
            error_count = checkpoint.error_count,
            source = self.source.backend(),
            target = self.target.backend(),
            "resuming migration from checkpoint"
        );

        let rows = self.source.records_after(checkpoint.last_processed_id).await?;
        let run_total = rows.len() as u64;
        tracing::info!(remaining = run_total, "found records to migrate");

        let mut report = MigrationReport {
            processed: 0,
            succeeded: 0,
            failed: 0,
            unkeyed: 0,
            batches_committed: 0,
            batches_abandoned: 0,
            checkpoint,
            expected_total: self.settings.expected_total,
        };

        let batch_size = self.settings.batch_size.max(1);
        let batch_count = rows.len().div_ceil(batch_size);

        for (index, chunk) in rows.chunks(batch_size).enumerate() {
            let size = chunk.len() as u64;
            let Some(last) = chunk.last() else { continue };

            let batch: Vec<StaffRecord> =
                chunk.iter().filter(|r| r.key().is_some()).cloned().collect();
            let unkeyed = size - batch.len() as u64;
            if unkeyed > 0 {
                for record in chunk.iter().filter(|r| r.key().is_none()) {
                    tracing::warn!(id = record.id, "skipping record without employee number");
                }
                checkpoint.error_count += unkeyed;
                report.failed += unkeyed;
                report.unkeyed += unkeyed;
            }

            let written = batch.len() as u64;
            if batch.is_empty() {
                tracing::debug!(batch = index, "no keyed rows to write");
            } else {
                match self.migrate_batch(index, &batch).await {
                    Ok(attempts) => {
                        checkpoint.success_count += written;
                        report.succeeded += written;
                        report.batches_committed += 1;
                        tracing::debug!(batch = index, attempts, "batch committed");
                    }
                    Err(err) => {
                        checkpoint.error_count += written;
                        report.failed += written;
                        report.batches_abandoned += 1;
                        tracing::error!(
                            batch = index,
                            first_id = chunk[0].id,
                            last_id = last.id,
                            size = written,
                            error = %err,
                            "max retries reached, skipping batch"
                        );
                    }
                }
            }

            checkpoint.last_processed_id = last.id;
            self.checkpoints.save(&checkpoint)?;
            report.processed += size;
            report.checkpoint = checkpoint;

            tracing::info!(
                success_count = checkpoint.success_count,
                run_total,
                run_pct = percentage(report.succeeded as usize, run_total as usize),
                expected_total = self.settings.expected_total,
                overall_pct = report.completion_pct(),
                "migrated {}/{} records",
                checkpoint.success_count,
                run_total
            );

            if index + 1 < batch_count && !self.settings.batch_delay.is_zero() {
                tokio::time::sleep(self.settings.batch_delay).await;
            }
        }

        tracing::info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            total_success = checkpoint.success_count,
            total_errors = checkpoint.error_count,
            overall_pct = report.completion_pct(),
            "migration completed"
        );
        Ok(report)
    }

    /// Write one batch, retrying with linear back-off. Returns the number of
    /// attempts used, or the last error once attempts are exhausted.
    async fn migrate_batch(
        &self,
        index: usize,
        batch: &[StaffRecord],
    ) -> Result<u32, StoreError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.target.write_batch(batch, self.settings.row_delay).await {
                Ok(()) => return Ok(attempt),
                Err(err) => {
                    tracing::warn!(batch = index, attempt, error = %err, "batch write failed");
                    if attempt >= max_attempts {
                        return Err(err);
                    }
                    let delay = self.settings.backoff(attempt);
                    if !delay.is_zero() {
                        tracing::info!(seconds = delay.as_secs(), "waiting before retry");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}
