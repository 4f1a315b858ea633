// ABOUTME: Read-only reports over loaded staff records: data quality, coverage pivot, search.
// ABOUTME: Also compares statuses between two stores; works the same against either backend.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{GroupingColumn, StaffRecord, VaccinationStatus};

static EMAIL_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("static email regex")
});

const SAMPLE_SIZE: usize = 5;

/// A value and how many records carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub value: String,
    pub count: usize,
}

/// Share of records per vaccination status.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusShare {
    pub status: Option<VaccinationStatus>,
    pub count: usize,
    pub percentage: f64,
}

/// Summary of anomalies and distributions in a set of staff records.
#[derive(Debug, Clone)]
pub struct DataQualityReport {
    pub total: usize,
    pub missing_employee_numbers: usize,
    pub missing_first_names: usize,
    pub missing_last_names: usize,
    pub missing_emails: usize,
    pub duplicate_employee_numbers: Vec<Tally>,
    pub directorates: Vec<Tally>,
    pub organisations: Vec<Tally>,
    pub statuses: Vec<StatusShare>,
    pub invalid_emails: Vec<String>,
    pub most_recent: Vec<StaffRecord>,
}

fn blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.is_empty())
}

/// Count non-blank values of a column, highest count first, ties by value.
pub fn distribution(records: &[StaffRecord], column: GroupingColumn) -> Vec<Tally> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        if let Some(value) = column.value_of(record).filter(|v| !v.is_empty()) {
            *counts.entry(value).or_default() += 1;
        }
    }
    sorted_tallies(counts)
}

fn sorted_tallies(counts: HashMap<&str, usize>) -> Vec<Tally> {
    let mut tallies: Vec<Tally> = counts
        .into_iter()
        .map(|(value, count)| Tally {
            value: value.to_string(),
            count,
        })
        .collect();
    tallies.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    tallies
}

/// Count records per vaccination status, highest count first.
pub fn status_counts(records: &[StaffRecord]) -> Vec<StatusShare> {
    let mut counts: HashMap<Option<VaccinationStatus>, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.vaccinated).or_default() += 1;
    }

    let total = records.len();
    let mut shares: Vec<StatusShare> = counts
        .into_iter()
        .map(|(status, count)| StatusShare {
            status,
            count,
            percentage: percentage(count, total),
        })
        .collect();
    shares.sort_by(|a, b| {
        let a_label = VaccinationStatus::label(a.status);
        let b_label = VaccinationStatus::label(b.status);
        b.count.cmp(&a.count).then_with(|| a_label.cmp(b_label))
    });
    shares
}

/// `part / whole` as a percentage rounded to two decimals; zero when `whole` is zero.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    ((part as f64 / whole as f64) * 10_000.0).round() / 100.0
}

impl DataQualityReport {
    pub fn from_records(records: &[StaffRecord]) -> Self {
        let mut by_number: HashMap<&str, usize> = HashMap::new();
        for number in records.iter().filter_map(StaffRecord::key) {
            *by_number.entry(number).or_default() += 1;
        }
        by_number.retain(|_, count| *count > 1);

        let invalid_emails = records
            .iter()
            .filter_map(|r| r.email.as_deref())
            .filter(|email| !email.is_empty() && !EMAIL_FORMAT.is_match(email))
            .take(SAMPLE_SIZE)
            .map(str::to_string)
            .collect();

        let mut most_recent: Vec<StaffRecord> = records.to_vec();
        most_recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        most_recent.truncate(SAMPLE_SIZE);

        Self {
            total: records.len(),
            missing_employee_numbers: records.iter().filter(|r| r.key().is_none()).count(),
            missing_first_names: records
                .iter()
                .filter(|r| blank(r.employee_first_name.as_deref()))
                .count(),
            missing_last_names: records
                .iter()
                .filter(|r| blank(r.employee_last_name.as_deref()))
                .count(),
            missing_emails: records.iter().filter(|r| blank(r.email.as_deref())).count(),
            duplicate_employee_numbers: sorted_tallies(by_number),
            directorates: distribution(records, GroupingColumn::Directorate),
            organisations: distribution(records, GroupingColumn::Organisation),
            statuses: status_counts(records),
            invalid_emails,
            most_recent,
        }
    }
}

impl fmt::Display for DataQualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Missing Data Analysis:")?;
        writeln!(f, "  Total Records: {}", self.total)?;
        writeln!(f, "  Missing Employee Numbers: {}", self.missing_employee_numbers)?;
        writeln!(f, "  Missing First Names: {}", self.missing_first_names)?;
        writeln!(f, "  Missing Last Names: {}", self.missing_last_names)?;
        writeln!(f, "  Missing Emails: {}", self.missing_emails)?;

        writeln!(f, "\nDuplicate Employee Numbers:")?;
        if self.duplicate_employee_numbers.is_empty() {
            writeln!(f, "  none")?;
        }
        for dup in &self.duplicate_employee_numbers {
            writeln!(f, "  {} appears {} times", dup.value, dup.count)?;
        }

        writeln!(f, "\nDirectorate Distribution:")?;
        for tally in &self.directorates {
            writeln!(f, "  {}: {} staff", tally.value, tally.count)?;
        }

        writeln!(f, "\nOrganisation Distribution:")?;
        for tally in &self.organisations {
            writeln!(f, "  {}: {} staff", tally.value, tally.count)?;
        }

        writeln!(f, "\nVaccination Status Distribution:")?;
        for share in &self.statuses {
            writeln!(
                f,
                "  {}: {} staff ({:.2}%)",
                VaccinationStatus::label(share.status),
                share.count,
                share.percentage
            )?;
        }

        writeln!(f, "\nEmail Format Check:")?;
        if self.invalid_emails.is_empty() {
            writeln!(f, "  all email addresses appear well formed")?;
        }
        for email in &self.invalid_emails {
            writeln!(f, "  invalid email format: {}", email)?;
        }

        writeln!(f, "\nMost Recent Records:")?;
        for record in &self.most_recent {
            writeln!(
                f,
                "  {} {} ({}) status={} created={}",
                record.employee_first_name.as_deref().unwrap_or(""),
                record.employee_last_name.as_deref().unwrap_or(""),
                record.key().unwrap_or("no employee number"),
                VaccinationStatus::label(record.vaccinated),
                record.created_at
            )?;
        }
        Ok(())
    }
}

const GRAND_TOTAL: &str = "Grand Total";

/// Coverage counts for one pivot category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotRow {
    pub category: String,
    pub yes: usize,
    pub no: usize,
    pub total_staff: usize,
}

impl PivotRow {
    fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            yes: 0,
            no: 0,
            total_staff: 0,
        }
    }

    fn add(&mut self, status: Option<VaccinationStatus>) {
        self.total_staff += 1;
        match status {
            Some(VaccinationStatus::Yes) => self.yes += 1,
            Some(VaccinationStatus::No) => self.no += 1,
            None => {}
        }
    }

    /// Staff who gave either answer.
    pub fn answered(&self) -> usize {
        self.yes + self.no
    }

    /// Staff with no recorded answer.
    pub fn remaining(&self) -> usize {
        self.total_staff - self.answered()
    }

    /// Share answering yes. `None` for an empty category.
    pub fn vaccinated_pct(&self) -> Option<f64> {
        (self.total_staff > 0).then(|| percentage(self.yes, self.total_staff))
    }

    /// Share with any recorded answer. `None` for an empty category.
    pub fn including_deadline_pct(&self) -> Option<f64> {
        (self.total_staff > 0).then(|| percentage(self.answered(), self.total_staff))
    }
}

fn is_vaccination_team(directorate: &str) -> bool {
    directorate.to_lowercase().contains("vaccination")
}

/// Per-directorate vaccination coverage.
///
/// Directorates whose name mentions "vaccination" are the vaccination team
/// and are listed after the others. The grand total covers the other
/// directorates only. Rows with a blank directorate are left out.
#[derive(Debug, Clone)]
pub struct VaccinationPivot {
    pub grand_total: PivotRow,
    pub directorates: Vec<PivotRow>,
    pub vaccination_team: Vec<PivotRow>,
}

impl VaccinationPivot {
    pub fn from_records(records: &[StaffRecord]) -> Self {
        let mut regular: BTreeMap<&str, PivotRow> = BTreeMap::new();
        let mut team: BTreeMap<&str, PivotRow> = BTreeMap::new();
        let mut grand_total = PivotRow::new(GRAND_TOTAL);

        for record in records {
            let Some(directorate) = record.directorate.as_deref().filter(|d| !d.is_empty()) else {
                continue;
            };
            if is_vaccination_team(directorate) {
                team.entry(directorate)
                    .or_insert_with(|| PivotRow::new(directorate))
                    .add(record.vaccinated);
            } else {
                regular
                    .entry(directorate)
                    .or_insert_with(|| PivotRow::new(directorate))
                    .add(record.vaccinated);
                grand_total.add(record.vaccinated);
            }
        }

        Self {
            grand_total,
            directorates: regular.into_values().collect(),
            vaccination_team: team.into_values().collect(),
        }
    }

    /// Rows in display order: grand total, directorates, vaccination team.
    pub fn rows(&self) -> impl Iterator<Item = &PivotRow> {
        std::iter::once(&self.grand_total)
            .chain(&self.directorates)
            .chain(&self.vaccination_team)
    }
}

fn pct_cell(value: Option<f64>) -> String {
    match value {
        Some(pct) => format!("{:.2}%", pct),
        None => "N/A".to_string(),
    }
}

impl fmt::Display for VaccinationPivot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Vaccination Status Report:")?;
        writeln!(
            f,
            "{:<40} | {:>6} | {:>6} | {:>6} | {:>6} | {:>7} | {:>7} | {:>9}",
            "Directorate", "Yes", "No", "Total", "Staff", "Vacc%", "Inc.%", "Remaining"
        )?;
        writeln!(f, "{}", "-".repeat(100))?;
        for row in self.rows() {
            writeln!(
                f,
                "{:<40} | {:>6} | {:>6} | {:>6} | {:>6} | {:>7} | {:>7} | {:>9}",
                row.category,
                row.yes,
                row.no,
                row.answered(),
                row.total_staff,
                pct_cell(row.vaccinated_pct()),
                pct_cell(row.including_deadline_pct()),
                row.remaining()
            )?;
        }
        Ok(())
    }
}

fn contains_ignore_case(value: Option<&str>, needle: &str) -> bool {
    value.is_some_and(|v| v.to_lowercase().contains(needle))
}

/// Records whose email, employee number or name contains a search term.
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub term: String,
    pub matches: Vec<StaffRecord>,
}

impl SearchResults {
    /// Case-insensitive substring match, newest rows (highest id) first.
    pub fn search(records: &[StaffRecord], term: &str) -> Self {
        let needle = term.to_lowercase();
        let mut matches: Vec<StaffRecord> = records
            .iter()
            .filter(|r| {
                contains_ignore_case(r.email.as_deref(), &needle)
                    || contains_ignore_case(r.employee_number.as_deref(), &needle)
                    || contains_ignore_case(r.employee_first_name.as_deref(), &needle)
                    || contains_ignore_case(r.employee_last_name.as_deref(), &needle)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.id.cmp(&a.id));

        Self {
            term: term.to_string(),
            matches,
        }
    }
}

impl fmt::Display for SearchResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.matches.is_empty() {
            return write!(f, "No entries found matching '{}'", self.term);
        }
        writeln!(f, "Found {} entries matching '{}':", self.matches.len(), self.term)?;
        for record in &self.matches {
            let text = |v: &Option<String>| v.clone().unwrap_or_default();
            writeln!(f, "Entry ID: {}", record.id)?;
            writeln!(f, "Employee Number: {}", text(&record.employee_number))?;
            writeln!(
                f,
                "Name: {} {}",
                text(&record.employee_first_name),
                text(&record.employee_last_name)
            )?;
            writeln!(f, "Email: {}", text(&record.email))?;
            writeln!(f, "Directorate: {}", text(&record.directorate))?;
            writeln!(f, "Organisation: {}", text(&record.organisation))?;
            writeln!(f, "Vaccination Status: {}", VaccinationStatus::label(record.vaccinated))?;
            writeln!(f, "Created At: {}", record.created_at)?;
            writeln!(f, "--------------------------------")?;
        }
        Ok(())
    }
}

/// A record whose status differs between two stores. `None` on a side means
/// the employee is missing from that store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMismatch {
    pub employee_number: String,
    pub left: Option<Option<VaccinationStatus>>,
    pub right: Option<Option<VaccinationStatus>>,
}

/// Side-by-side vaccination status comparison of two record sets. Rows
/// without an employee number count towards the totals but cannot be matched.
#[derive(Debug, Clone)]
pub struct StatusComparison {
    pub left_name: String,
    pub right_name: String,
    pub left_total: usize,
    pub right_total: usize,
    pub left_statuses: Vec<StatusShare>,
    pub right_statuses: Vec<StatusShare>,
    pub mismatches: Vec<StatusMismatch>,
}

impl StatusComparison {
    pub fn compare(
        left_name: &str,
        left: &[StaffRecord],
        right_name: &str,
        right: &[StaffRecord],
    ) -> Self {
        let left_map: BTreeMap<&str, Option<VaccinationStatus>> = left
            .iter()
            .filter_map(|r| Some((r.key()?, r.vaccinated)))
            .collect();
        let right_map: BTreeMap<&str, Option<VaccinationStatus>> = right
            .iter()
            .filter_map(|r| Some((r.key()?, r.vaccinated)))
            .collect();

        let mut keys: Vec<&str> = left_map.keys().chain(right_map.keys()).copied().collect();
        keys.sort_unstable();
        keys.dedup();

        let mismatches = keys
            .into_iter()
            .filter_map(|key| {
                let l = left_map.get(key).copied();
                let r = right_map.get(key).copied();
                (l != r).then(|| StatusMismatch {
                    employee_number: key.to_string(),
                    left: l,
                    right: r,
                })
            })
            .collect();

        Self {
            left_name: left_name.to_string(),
            right_name: right_name.to_string(),
            left_total: left.len(),
            right_total: right.len(),
            left_statuses: status_counts(left),
            right_statuses: status_counts(right),
            mismatches,
        }
    }
}

fn describe(side: Option<Option<VaccinationStatus>>) -> &'static str {
    match side {
        None => "missing",
        Some(status) => VaccinationStatus::label(status),
    }
}

impl fmt::Display for StatusComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, total, statuses) in [
            (&self.left_name, self.left_total, &self.left_statuses),
            (&self.right_name, self.right_total, &self.right_statuses),
        ] {
            writeln!(f, "{} ({} records):", name, total)?;
            for share in statuses {
                writeln!(
                    f,
                    "  {}: {} records",
                    VaccinationStatus::label(share.status),
                    share.count
                )?;
            }
        }

        writeln!(f, "\nMismatches: {}", self.mismatches.len())?;
        for m in &self.mismatches {
            writeln!(
                f,
                "  {}: {}={} {}={}",
                m.employee_number,
                self.left_name,
                describe(m.left),
                self.right_name,
                describe(m.right)
            )?;
        }
        Ok(())
    }
}
