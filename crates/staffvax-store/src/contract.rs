// ABOUTME: Behaviour every StaffStore backend must share, written once and run against each one.
// ABOUTME: SQLite tests always run them; PostgreSQL tests run them when a database is configured.

use std::time::Duration;

use chrono::NaiveDate;
use staffvax_core::{GroupingColumn, StaffFields, StaffRecord, StatusUpdate, VaccinationStatus};

use crate::error::StoreError;
use crate::store::StaffStore;

pub(crate) fn fields(number: &str, directorate: &str) -> StaffFields {
    StaffFields {
        employee_number: number.to_string(),
        directorate: Some(directorate.to_string()),
        organisation: Some("North Trust".to_string()),
        employee_first_name: Some("Ada".to_string()),
        employee_last_name: Some("Lovelace".to_string()),
        email: Some(format!("{}@example.org", number.to_lowercase())),
    }
}

pub(crate) fn migrated(id: i64, number: &str) -> StaffRecord {
    StaffRecord {
        id,
        employee_number: Some(number.to_string()),
        directorate: Some("Surgery".to_string()),
        organisation: None,
        employee_first_name: None,
        employee_last_name: Some(format!("Last{id:03}")),
        email: None,
        vaccinated: Some(VaccinationStatus::Yes),
        created_at: NaiveDate::from_ymd_opt(2021, 3, 4)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap(),
    }
}

fn update(number: &str, status: VaccinationStatus) -> StatusUpdate {
    StatusUpdate {
        employee_number: number.to_string(),
        status,
    }
}

pub(crate) async fn upsert_twice_keeps_one_row_and_identity(store: &dyn StaffStore) {
    let first_id = store.upsert_staff(&fields("E1", "Surgery")).await.unwrap();
    let before = store.get_by_employee_number("E1").await.unwrap().unwrap();

    let second_id = store.upsert_staff(&fields("E1", "Surgery")).await.unwrap();
    let after = store.get_by_employee_number("E1").await.unwrap().unwrap();

    assert_eq!(first_id, second_id);
    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(before, after);
    assert_eq!(after.vaccinated, Some(VaccinationStatus::No));
}

pub(crate) async fn upsert_overwrites_directorate_only(store: &dyn StaffStore) {
    store.upsert_staff(&fields("E1", "Surgery")).await.unwrap();
    let before = store.get_by_employee_number("E1").await.unwrap().unwrap();
    store
        .update_vaccination_status("E1", VaccinationStatus::Yes)
        .await
        .unwrap();

    store.upsert_staff(&fields("E1", "Medicine")).await.unwrap();
    let after = store.get_by_employee_number("E1").await.unwrap().unwrap();

    assert_eq!(after.directorate.as_deref(), Some("Medicine"));
    assert_eq!(after.id, before.id);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.vaccinated, Some(VaccinationStatus::Yes));
}

pub(crate) async fn upsert_blanks_omitted_fields(store: &dyn StaffStore) {
    store.upsert_staff(&fields("E1", "Surgery")).await.unwrap();
    store.upsert_staff(&StaffFields::new("E1")).await.unwrap();

    let after = store.get_by_employee_number("E1").await.unwrap().unwrap();
    assert!(after.directorate.is_none());
    assert!(after.email.is_none());
}

pub(crate) async fn blank_employee_number_is_a_constraint_violation(store: &dyn StaffStore) {
    let err = store.upsert_staff(&StaffFields::new("")).await.unwrap_err();
    assert!(matches!(err, StoreError::ConstraintViolation(_)), "got {err:?}");
    assert_eq!(store.count().await.unwrap(), 0);
}

pub(crate) async fn status_update_on_unknown_key_creates_nothing(store: &dyn StaffStore) {
    let changed = store
        .update_vaccination_status("nonexistent", VaccinationStatus::Yes)
        .await
        .unwrap();
    assert!(!changed);
    assert_eq!(store.count().await.unwrap(), 0);
}

pub(crate) async fn status_updates_report_matches_per_row(store: &dyn StaffStore) {
    store.upsert_staff(&fields("E1", "Surgery")).await.unwrap();
    store.upsert_staff(&fields("E2", "Surgery")).await.unwrap();

    let matched = store
        .update_statuses(&[
            update("E1", VaccinationStatus::Yes),
            update("E9", VaccinationStatus::Yes),
            update("E2", VaccinationStatus::No),
        ])
        .await
        .unwrap();

    assert_eq!(matched, vec![true, false, true]);
    assert_eq!(store.count().await.unwrap(), 2);
    let e1 = store.get_by_employee_number("E1").await.unwrap().unwrap();
    assert_eq!(e1.vaccinated, Some(VaccinationStatus::Yes));
}

pub(crate) async fn lookup_by_email_returns_lowest_id(store: &dyn StaffStore) {
    let mut a = fields("E1", "Surgery");
    a.email = Some("shared@example.org".to_string());
    let mut b = fields("E2", "Surgery");
    b.email = Some("shared@example.org".to_string());
    let id_a = store.upsert_staff(&a).await.unwrap();
    store.upsert_staff(&b).await.unwrap();

    let found = store.get_by_email("shared@example.org").await.unwrap().unwrap();
    assert_eq!(found.id, id_a);
    assert!(store.get_by_email("nobody@example.org").await.unwrap().is_none());
}

pub(crate) async fn list_all_orders_by_name_with_nulls_last(store: &dyn StaffStore) {
    let people = [
        ("E1", Some("Smith"), Some("Zoe")),
        ("E2", None, Some("Nameless")),
        ("E3", Some("Smith"), Some("Adam")),
        ("E4", Some("Brown"), None),
        ("E5", Some("brown"), Some("Lower")),
    ];
    for (number, last, first) in people {
        let mut f = StaffFields::new(number);
        f.employee_last_name = last.map(str::to_string);
        f.employee_first_name = first.map(str::to_string);
        store.upsert_staff(&f).await.unwrap();
    }

    let order: Vec<String> = store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .filter_map(|r| r.employee_number)
        .collect();
    assert_eq!(order, vec!["E4", "E3", "E1", "E5", "E2"]);
}

pub(crate) async fn distinct_listing_excludes_blank_and_null(store: &dyn StaffStore) {
    store.upsert_staff(&fields("E1", "Surgery")).await.unwrap();
    store.upsert_staff(&fields("E2", "")).await.unwrap();
    store.upsert_staff(&fields("E3", "Medicine")).await.unwrap();
    store.upsert_staff(&fields("E4", "Surgery")).await.unwrap();
    let mut no_directorate = fields("E5", "x");
    no_directorate.directorate = None;
    store.upsert_staff(&no_directorate).await.unwrap();

    let directorates = store.list_distinct(GroupingColumn::Directorate).await.unwrap();
    assert_eq!(directorates, vec!["Medicine", "Surgery"]);

    let organisations = store.list_distinct(GroupingColumn::Organisation).await.unwrap();
    assert_eq!(organisations, vec!["North Trust"]);
}

pub(crate) async fn write_batch_carries_status_and_created_at(store: &dyn StaffStore) {
    let record = migrated(7, "E7");
    store.write_batch(&[record.clone()], Duration::ZERO).await.unwrap();

    let stored = store.get_by_employee_number("E7").await.unwrap().unwrap();
    assert_eq!(stored.vaccinated, Some(VaccinationStatus::Yes));
    assert_eq!(stored.created_at, record.created_at);
    assert_eq!(stored.directorate.as_deref(), Some("Surgery"));
}

pub(crate) async fn write_batch_rolls_back_on_bad_row(store: &dyn StaffStore) {
    let batch = vec![migrated(1, "E1"), migrated(2, "E2"), migrated(3, "")];
    let err = store.write_batch(&batch, Duration::ZERO).await.unwrap_err();

    assert!(matches!(err, StoreError::ConstraintViolation(_)), "got {err:?}");
    assert_eq!(store.count().await.unwrap(), 0);
}

pub(crate) async fn records_after_is_ordered_by_id(store: &dyn StaffStore) {
    let mut ids = Vec::new();
    for n in 1..=5 {
        let id = store
            .upsert_staff(&fields(&format!("E{n}"), "Surgery"))
            .await
            .unwrap();
        ids.push(id);
    }

    let after: Vec<i64> = store
        .records_after(ids[1])
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(after, ids[2..].to_vec());
}
