// ABOUTME: Reads spreadsheet rows (workbook or JSON) and applies them to a store.
// ABOUTME: Bad rows are counted and logged as skips; only unreadable input fails the whole import.

use std::fmt;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use serde_json::Value;
use staffvax_core::{SheetRow, SkipReason, StatusUpdate, parse_staff_row, parse_status_row};
use thiserror::Error;

use crate::store::StaffStore;

/// Errors that stop an import before any row is applied.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rows file is not a JSON array of objects: {0}")]
    Json(#[from] serde_json::Error),

    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("workbook has no worksheets")]
    NoWorksheet,
}

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Counts for one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub processed: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Import Summary:")?;
        writeln!(f, "  Total records processed: {}", self.processed)?;
        writeln!(f, "  Successfully updated: {}", self.updated)?;
        writeln!(f, "  Skipped: {}", self.skipped)?;
        write!(f, "  Errors: {}", self.errors)
    }
}

/// Read header-keyed rows. Workbooks (by extension) are read from their
/// first worksheet with the first row as headers; anything else must be a
/// JSON array of row objects.
pub fn read_rows(path: &Path) -> Result<Vec<SheetRow>, ImportError> {
    let is_workbook = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| WORKBOOK_EXTENSIONS.iter().any(|w| ext.eq_ignore_ascii_case(w)));

    if is_workbook {
        read_workbook_rows(path)
    } else {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

fn read_workbook_rows(path: &Path) -> Result<Vec<SheetRow>, ImportError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::NoWorksheet)??;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header.iter().map(|h| h.to_string().trim().to_string()).collect();

    let parsed = rows
        .map(|cells| {
            headers
                .iter()
                .zip(cells)
                .filter(|(name, _)| !name.is_empty())
                .filter_map(|(name, cell)| cell_value(cell).map(|value| (name.clone(), value)))
                .collect::<SheetRow>()
        })
        .filter(|row| !row.is_empty())
        .collect();
    Ok(parsed)
}

/// Convert a workbook cell to JSON. Whole-number floats become integers so an
/// employee number typed as `101` reads back as `101`, not `101.0`.
fn cell_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            Some(Value::String(s.clone()))
        }
        Data::Int(i) => Some(Value::from(*i)),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(Value::from(*f as i64)),
        Data::Float(f) => Some(Value::from(*f)),
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::DateTime(dt) => Some(Value::from(dt.as_f64())),
        _ => None,
    }
}

fn skip(summary: &mut ImportSummary, row: usize, reason: &SkipReason) {
    summary.skipped += 1;
    tracing::info!(row, reason = %reason, "skipping row");
}

/// Set vaccination statuses from rows carrying an employee number and a
/// `yes`/`no` status. Unknown employees are skipped, never created. Valid
/// rows are applied in one transaction; if it fails, every one of them
/// counts as an error and nothing is written.
pub async fn import_statuses(store: &dyn StaffStore, rows: &[SheetRow]) -> ImportSummary {
    let mut summary = ImportSummary::default();
    let mut indices = Vec::new();
    let mut updates: Vec<StatusUpdate> = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        summary.processed += 1;
        match parse_status_row(row) {
            Ok(update) => {
                indices.push(index);
                updates.push(update);
            }
            Err(reason) => skip(&mut summary, index, &reason),
        }
    }

    if !updates.is_empty() {
        match store.update_statuses(&updates).await {
            Ok(matched) => {
                for ((index, update), hit) in indices.into_iter().zip(updates).zip(matched) {
                    if hit {
                        summary.updated += 1;
                        tracing::debug!(
                            employee_number = %update.employee_number,
                            status = %update.status,
                            "updated vaccination status"
                        );
                    } else {
                        let reason = SkipReason::UnknownEmployee(update.employee_number);
                        skip(&mut summary, index, &reason);
                    }
                }
            }
            Err(err) => {
                summary.errors += updates.len();
                tracing::error!(
                    rows = updates.len(),
                    error = %err,
                    "status import rolled back"
                );
            }
        }
    }

    tracing::info!(
        processed = summary.processed,
        updated = summary.updated,
        skipped = summary.skipped,
        errors = summary.errors,
        "status import finished"
    );
    summary
}

/// Upsert staff details from rows. A row without an employee number is
/// skipped; a row the store rejects is counted as an error.
pub async fn import_staff(store: &dyn StaffStore, rows: &[SheetRow]) -> ImportSummary {
    let mut summary = ImportSummary::default();

    for (index, row) in rows.iter().enumerate() {
        summary.processed += 1;

        let fields = match parse_staff_row(row) {
            Ok(fields) => fields,
            Err(reason) => {
                skip(&mut summary, index, &reason);
                continue;
            }
        };

        match store.upsert_staff(&fields).await {
            Ok(id) => {
                summary.updated += 1;
                tracing::debug!(
                    id,
                    employee_number = %fields.employee_number,
                    "saved staff details"
                );
            }
            Err(err) => {
                summary.errors += 1;
                tracing::error!(
                    employee_number = %fields.employee_number,
                    error = %err,
                    "failed to save staff details"
                );
            }
        }
    }

    tracing::info!(
        processed = summary.processed,
        updated = summary.updated,
        skipped = summary.skipped,
        errors = summary.errors,
        "staff import finished"
    );
    summary
}
