// ABOUTME: Maps spreadsheet rows (header -> cell) onto staff fields and vaccination updates.
// ABOUTME: Rows that cannot be used are reported as skip reasons, never as errors.

use std::fmt;

use serde_json::{Map, Value};

use crate::model::{StaffFields, VaccinationStatus};

/// One spreadsheet row keyed by its column header, as exported from the first sheet.
pub type SheetRow = Map<String, Value>;

const EMPLOYEE_NUMBER: &str = "employee number";
const VACCINATED: &str = "vaccinated";
const DIRECTORATE: &str = "directorate";
const ORGANISATION: &str = "organisation";
const FIRST_NAME: &str = "employee first name";
const LAST_NAME: &str = "employee last name";
const EMAIL: &str = "email";

/// Why an import row was not written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingField(&'static str),
    InvalidStatus(String),
    UnknownEmployee(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingField(name) => write!(f, "missing required field '{}'", name),
            SkipReason::InvalidStatus(value) => write!(f, "invalid vaccination status {:?}", value),
            SkipReason::UnknownEmployee(number) => write!(f, "employee {} not found", number),
        }
    }
}

/// A validated vaccination status row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub employee_number: String,
    pub status: VaccinationStatus,
}

/// Normalize a column header: trimmed, lower-cased, with `_` treated as a space.
pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace('_', " ")
}

/// Find a cell by normalized header and render it as text. Blank cells read as absent.
fn cell(row: &SheetRow, name: &str) -> Option<String> {
    row.iter()
        .find(|(key, _)| normalize_header(key) == name)
        .and_then(|(_, value)| cell_text(value))
}

fn cell_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}

/// Parse a vaccination-status row. The status is trimmed and lower-cased, then
/// must be exactly `yes` or `no`; anything else is skipped rather than coerced.
pub fn parse_status_row(row: &SheetRow) -> Result<StatusUpdate, SkipReason> {
    let employee_number =
        cell(row, EMPLOYEE_NUMBER).ok_or(SkipReason::MissingField(EMPLOYEE_NUMBER))?;
    let raw = cell(row, VACCINATED).ok_or(SkipReason::MissingField(VACCINATED))?;
    let status = raw
        .to_lowercase()
        .parse::<VaccinationStatus>()
        .map_err(|_| SkipReason::InvalidStatus(raw))?;

    Ok(StatusUpdate {
        employee_number,
        status,
    })
}

/// Parse a staff-detail row. Only the employee number is required; a missing
/// email is stored as an empty string.
pub fn parse_staff_row(row: &SheetRow) -> Result<StaffFields, SkipReason> {
    let employee_number =
        cell(row, EMPLOYEE_NUMBER).ok_or(SkipReason::MissingField(EMPLOYEE_NUMBER))?;

    Ok(StaffFields {
        employee_number,
        directorate: cell(row, DIRECTORATE),
        organisation: cell(row, ORGANISATION),
        employee_first_name: cell(row, FIRST_NAME),
        employee_last_name: cell(row, LAST_NAME),
        email: Some(cell(row, EMAIL).unwrap_or_default()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> SheetRow {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn headers_match_case_insensitively() {
        let r = row(json!({ "  Employee Number ": "E100", "VACCINATED": " Yes " }));
        let update = parse_status_row(&r).unwrap();
        assert_eq!(update.employee_number, "E100");
        assert_eq!(update.status, VaccinationStatus::Yes);
    }

    #[test]
    fn numeric_employee_numbers_become_text() {
        let r = row(json!({ "employee_number": 4711, "vaccinated": "no" }));
        let update = parse_status_row(&r).unwrap();
        assert_eq!(update.employee_number, "4711");
        assert_eq!(update.status, VaccinationStatus::No);
    }

    #[test]
    fn maybe_is_skipped_not_coerced() {
        let r = row(json!({ "Employee Number": "E1", "Vaccinated": "maybe" }));
        assert_eq!(
            parse_status_row(&r),
            Err(SkipReason::InvalidStatus("maybe".to_string()))
        );
    }

    #[test]
    fn missing_fields_are_skipped() {
        let r = row(json!({ "Vaccinated": "yes" }));
        assert_eq!(
            parse_status_row(&r),
            Err(SkipReason::MissingField("employee number"))
        );

        let r = row(json!({ "Employee Number": "E1", "Vaccinated": "" }));
        assert_eq!(parse_status_row(&r), Err(SkipReason::MissingField("vaccinated")));
    }

    #[test]
    fn staff_row_maps_all_columns() {
        let r = row(json!({
            "Employee Number": 12,
            "Directorate": "Surgery",
            "Organisation": "North Trust",
            "Employee First Name": "Ada",
            "Employee Last Name": "Lovelace",
        }));
        let fields = parse_staff_row(&r).unwrap();
        assert_eq!(fields.employee_number, "12");
        assert_eq!(fields.directorate.as_deref(), Some("Surgery"));
        assert_eq!(fields.organisation.as_deref(), Some("North Trust"));
        assert_eq!(fields.employee_first_name.as_deref(), Some("Ada"));
        assert_eq!(fields.employee_last_name.as_deref(), Some("Lovelace"));
        assert_eq!(fields.email.as_deref(), Some(""));
    }

    #[test]
    fn staff_row_without_number_is_skipped() {
        let r = row(json!({ "Directorate": "Surgery" }));
        assert!(matches!(
            parse_staff_row(&r),
            Err(SkipReason::MissingField(_))
        ));
    }
}
