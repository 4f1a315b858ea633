// ABOUTME: Core library for staffvax, containing the staff record model and pure domain logic.
// ABOUTME: Shared by the storage backends, the HTTP server, and the command-line tools.

pub mod import;
pub mod model;
pub mod report;

pub use import::{SheetRow, SkipReason, StatusUpdate, parse_staff_row, parse_status_row};
pub use model::{GroupingColumn, InvalidStatus, StaffFields, StaffRecord, VaccinationStatus};
pub use report::{DataQualityReport, PivotRow, SearchResults, StatusComparison, VaccinationPivot};
