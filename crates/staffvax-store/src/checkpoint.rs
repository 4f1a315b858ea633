// ABOUTME: Durable migration checkpoint: last processed source id plus success and error counts.
// ABOUTME: Written atomically (temp file, fsync, rename) after every committed or abandoned batch.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CHECKPOINT_VERSION: u32 = 1;

/// Errors that can occur while reading or writing a checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Progress marker for a migration run. Counts are cumulative across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    #[serde(default = "current_version")]
    pub version: u32,
    pub last_processed_id: i64,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub error_count: u64,
}

fn current_version() -> u32 {
    CHECKPOINT_VERSION
}

impl Checkpoint {
    pub fn new(last_processed_id: i64, success_count: u64, error_count: u64) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            last_processed_id,
            success_count,
            error_count,
        }
    }

    /// Records accounted for so far, whether migrated or abandoned.
    pub fn processed(&self) -> u64 {
        self.success_count + self.error_count
    }
}

/// Reads and writes the checkpoint file at a fixed path.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint, or the zero checkpoint when no file exists yet.
    pub fn load(&self) -> Result<Checkpoint, CheckpointError> {
        if !self.path.exists() {
            return Ok(Checkpoint::new(0, 0, 0));
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Replace the checkpoint on disk. A crash mid-write leaves the previous
    /// checkpoint intact.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let tmp_path = self.path.with_extension("tmp");
        let json = serde_json::to_string(checkpoint)?;

        let mut file = File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
