// ABOUTME: Defines the StaffRecord entity and the field sets used to create or update it.
// ABOUTME: Also holds the vaccination status enum and the grouping columns used for listings.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Recorded vaccination answer. An unrecorded status is modelled as `None`
/// wherever a status is optional; the stored forms `""` and NULL both read as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaccinationStatus {
    Yes,
    No,
}

impl VaccinationStatus {
    /// The exact string written to the `vaccinated` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            VaccinationStatus::Yes => "yes",
            VaccinationStatus::No => "no",
        }
    }

    /// Interpret a stored column value. Blank and NULL are "not recorded".
    /// Any other unexpected value is also treated as not recorded, with a warning,
    /// so one bad legacy row cannot break a listing.
    pub fn from_stored(value: Option<&str>) -> Option<Self> {
        match value {
            None | Some("") => None,
            Some(v) => match v.parse() {
                Ok(status) => Some(status),
                Err(_) => {
                    tracing::warn!(value = v, "ignoring unexpected stored vaccination status");
                    None
                }
            },
        }
    }

    /// Label used by reports for an optional status.
    pub fn label(status: Option<Self>) -> &'static str {
        match status {
            Some(s) => s.as_str(),
            None => "Not recorded",
        }
    }
}

impl fmt::Display for VaccinationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not exactly `yes` or `no`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid vaccination status: {0:?}")]
pub struct InvalidStatus(pub String);

impl FromStr for VaccinationStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(VaccinationStatus::Yes),
            "no" => Ok(VaccinationStatus::No),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

/// A persisted staff row. `id` is assigned by the backend and `created_at` is
/// set once on first insert.
///
/// `employee_number` is optional because databases created before the column
/// became `NOT NULL` can hold rows without one. Such rows are listed and
/// reported but never migrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffRecord {
    pub id: i64,
    pub employee_number: Option<String>,
    pub directorate: Option<String>,
    pub organisation: Option<String>,
    pub employee_first_name: Option<String>,
    pub employee_last_name: Option<String>,
    pub email: Option<String>,
    pub vaccinated: Option<VaccinationStatus>,
    pub created_at: NaiveDateTime,
}

impl StaffRecord {
    /// The employee number, when present and non-blank.
    pub fn key(&self) -> Option<&str> {
        self.employee_number.as_deref().filter(|n| !n.is_empty())
    }
}

/// The columns written by a staff-detail submission or staff import.
///
/// An upsert overwrites every one of these columns on an existing row, so a
/// field left as `None` blanks the stored value. Callers must send all known
/// fields on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffFields {
    pub employee_number: String,
    #[serde(default)]
    pub directorate: Option<String>,
    #[serde(default)]
    pub organisation: Option<String>,
    #[serde(default)]
    pub employee_first_name: Option<String>,
    #[serde(default)]
    pub employee_last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl StaffFields {
    pub fn new(employee_number: impl Into<String>) -> Self {
        Self {
            employee_number: employee_number.into(),
            ..Self::default()
        }
    }
}

/// Organisational columns that can be listed as distinct values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingColumn {
    Directorate,
    Organisation,
}

impl GroupingColumn {
    /// Column name in the `staff` table. Safe to splice into SQL.
    pub fn column(&self) -> &'static str {
        match self {
            GroupingColumn::Directorate => "directorate",
            GroupingColumn::Organisation => "organisation",
        }
    }

    /// The value of this column on a record.
    pub fn value_of<'a>(&self, record: &'a StaffRecord) -> Option<&'a str> {
        match self {
            GroupingColumn::Directorate => record.directorate.as_deref(),
            GroupingColumn::Organisation => record.organisation.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_only_exact_values() {
        assert_eq!("yes".parse::<VaccinationStatus>(), Ok(VaccinationStatus::Yes));
        assert_eq!("no".parse::<VaccinationStatus>(), Ok(VaccinationStatus::No));
        assert!("maybe".parse::<VaccinationStatus>().is_err());
        assert!("Yes".parse::<VaccinationStatus>().is_err());
        assert!("".parse::<VaccinationStatus>().is_err());
    }

    #[test]
    fn blank_and_null_stored_status_are_unrecorded() {
        assert_eq!(VaccinationStatus::from_stored(None), None);
        assert_eq!(VaccinationStatus::from_stored(Some("")), None);
        assert_eq!(
            VaccinationStatus::from_stored(Some("yes")),
            Some(VaccinationStatus::Yes)
        );
        assert_eq!(VaccinationStatus::from_stored(Some("garbage")), None);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&VaccinationStatus::Yes).unwrap();
        assert_eq!(json, "\"yes\"");
        let parsed: Result<VaccinationStatus, _> = serde_json::from_str("\"maybe\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn staff_fields_default_missing_optionals() {
        let fields: StaffFields =
            serde_json::from_str(r#"{"employee_number":"E1","email":"a@b.org"}"#).unwrap();
        assert_eq!(fields.employee_number, "E1");
        assert_eq!(fields.email.as_deref(), Some("a@b.org"));
        assert!(fields.directorate.is_none());
    }

    #[test]
    fn record_key_ignores_null_and_blank() {
        let mut record = StaffRecord {
            id: 1,
            employee_number: None,
            directorate: None,
            organisation: None,
            employee_first_name: None,
            employee_last_name: None,
            email: None,
            vaccinated: None,
            created_at: chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        };
        assert_eq!(record.key(), None);

        record.employee_number = Some(String::new());
        assert_eq!(record.key(), None);

        record.employee_number = Some("E9".to_string());
        assert_eq!(record.key(), Some("E9"));

        let json = serde_json::to_value(StaffRecord { employee_number: None, ..record }).unwrap();
        assert!(json["employee_number"].is_null());
    }

    #[test]
    fn grouping_column_names() {
        assert_eq!(GroupingColumn::Directorate.column(), "directorate");
        assert_eq!(GroupingColumn::Organisation.column(), "organisation");
    }
}
