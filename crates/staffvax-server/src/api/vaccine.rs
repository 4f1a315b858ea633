// ABOUTME: Vaccination API handlers: dropdown listings, staff lookup and save, status submission.
// ABOUTME: Store errors and bad bodies are logged and mapped to a fixed message per route.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use staffvax_core::{GroupingColumn, StaffFields, StaffRecord, VaccinationStatus};

use crate::app_state::SharedState;

/// Request body for a yes/no vaccination answer.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub employee_number: String,
    pub response: VaccinationStatus,
}

/// Response body for a staff lookup by email.
#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff: Option<StaffRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

fn failure(message: &'static str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// A body that failed to parse keeps axum's status (400, 415 or 422) but
/// gets the route's fixed JSON error instead of the plain-text rejection.
fn rejected(rejection: JsonRejection, message: &'static str) -> Response {
    tracing::warn!(error = %rejection.body_text(), "rejected request body");
    (
        rejection.status(),
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

fn success(message: &'static str) -> Response {
    (StatusCode::OK, Json(serde_json::json!({ "message": message }))).into_response()
}

async fn distinct(state: &SharedState, column: GroupingColumn, error: &'static str) -> Response {
    match state.store.list_distinct(column).await {
        Ok(values) => {
            tracing::debug!(
                column = column.column(),
                count = values.len(),
                "listed distinct values"
            );
            Json(values).into_response()
        }
        Err(e) => {
            tracing::error!(
                column = column.column(),
                error = %e,
                "failed to list distinct values"
            );
            failure(error)
        }
    }
}

/// GET /api/vaccine/directorates - Distinct non-blank directorates.
pub async fn list_directorates(State(state): State<SharedState>) -> Response {
    distinct(&state, GroupingColumn::Directorate, "Failed to get directorates").await
}

/// GET /api/vaccine/organisations - Distinct non-blank organisations.
pub async fn list_organisations(State(state): State<SharedState>) -> Response {
    distinct(&state, GroupingColumn::Organisation, "Failed to get organisations").await
}

/// GET /api/vaccine/list-all-options - Both dropdown lists with their sizes.
pub async fn list_all_options(State(state): State<SharedState>) -> Response {
    let directorates = state.store.list_distinct(GroupingColumn::Directorate).await;
    let organisations = state.store.list_distinct(GroupingColumn::Organisation).await;

    match (directorates, organisations) {
        (Ok(directorates), Ok(organisations)) => Json(serde_json::json!({
            "counts": {
                "directorates": directorates.len(),
                "organisations": organisations.len(),
            },
            "values": {
                "directorates": directorates,
                "organisations": organisations,
            },
        }))
        .into_response(),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "failed to list options");
            failure("Failed to get options")
        }
    }
}

/// POST /api/vaccine/submit - Record a yes/no answer for an existing employee.
///
/// An unknown employee number is a failure; nothing is created.
pub async fn submit_response(
    State(state): State<SharedState>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => return rejected(rejection, "Failed to save response"),
    };

    match state.store.get_by_employee_number(&req.employee_number).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            tracing::warn!(employee_number = %req.employee_number, "staff member not found");
            return failure("Failed to save response");
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to look up staff member");
            return failure("Failed to save response");
        }
    }

    match state
        .store
        .update_vaccination_status(&req.employee_number, req.response)
        .await
    {
        Ok(_) => {
            tracing::info!(
                employee_number = %req.employee_number,
                status = %req.response,
                "updated vaccination status"
            );
            success("Response saved successfully")
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to update vaccination status");
            failure("Failed to save response")
        }
    }
}

/// GET /api/vaccine/lookup/{email} - Find a staff member by email.
pub async fn lookup_staff(
    State(state): State<SharedState>,
    Path(email): Path<String>,
) -> Response {
    match state.store.get_by_email(&email).await {
        Ok(Some(staff)) => Json(LookupResponse {
            found: true,
            staff: Some(staff),
            message: None,
        })
        .into_response(),
        Ok(None) => Json(LookupResponse {
            found: false,
            staff: None,
            message: Some("Staff not found. Please provide your details."),
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to look up staff by email");
            failure("Failed to look up staff")
        }
    }
}

/// POST /api/vaccine/staff - Create or overwrite a staff member's details.
pub async fn save_staff(
    State(state): State<SharedState>,
    body: Result<Json<StaffFields>, JsonRejection>,
) -> Response {
    let fields = match body {
        Ok(Json(fields)) => fields,
        Err(rejection) => return rejected(rejection, "Failed to save staff details"),
    };

    match state.store.upsert_staff(&fields).await {
        Ok(id) => {
            tracing::info!(id, employee_number = %fields.employee_number, "saved staff details");
            success("Staff details saved successfully")
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to save staff details");
            failure("Failed to save staff details")
        }
    }
}

/// GET /api/vaccine/staff - Every staff record, ordered by name.
pub async fn list_staff(State(state): State<SharedState>) -> Response {
    match state.store.list_all().await {
        Ok(staff) => Json(staff).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to list staff");
            failure("Failed to get staff data")
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::app_state::{AppState, SharedState};
    use crate::routes::create_router;
    use axum::body::Body;
    use axum::http::HeaderValue;
    use http::{Request, StatusCode};
    use staffvax_core::{StaffFields, VaccinationStatus};
    use staffvax_store::{SqliteStore, StaffStore};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        _dir: TempDir,
        store: Arc<SqliteStore>,
        state: SharedState,
    }

    fn test_app() -> TestApp {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(&dir.path().join("staff.db")).unwrap());
        let state = Arc::new(AppState::new(
            store.clone(),
            HeaderValue::from_static("http://localhost:3000"),
        ));
        TestApp {
            _dir: dir,
            store,
            state,
        }
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    async fn seed(store: &SqliteStore, number: &str, directorate: &str, email: &str) {
        let mut fields = StaffFields::new(number);
        fields.directorate = Some(directorate.to_string());
        fields.organisation = Some("North Trust".to_string());
        fields.email = Some(email.to_string());
        store.upsert_staff(&fields).await.unwrap();
    }

    #[tokio::test]
    async fn directorates_are_distinct_and_sorted() {
        let app = test_app();
        seed(&app.store, "E1", "Surgery", "a@x.org").await;
        seed(&app.store, "E2", "", "b@x.org").await;
        seed(&app.store, "E3", "Medicine", "c@x.org").await;

        let resp = create_router(app.state.clone())
            .oneshot(Request::get("/api/vaccine/directorates").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await, serde_json::json!(["Medicine", "Surgery"]));
    }

    #[tokio::test]
    async fn list_all_options_reports_counts() {
        let app = test_app();
        seed(&app.store, "E1", "Surgery", "a@x.org").await;

        let resp = create_router(app.state.clone())
            .oneshot(
                Request::get("/api/vaccine/list-all-options")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let json = json_body(resp).await;
        assert_eq!(json["counts"]["directorates"], 1);
        assert_eq!(json["values"]["organisations"], serde_json::json!(["North Trust"]));
    }

    #[tokio::test]
    async fn submit_updates_known_employee() {
        let app = test_app();
        seed(&app.store, "E1", "Surgery", "a@x.org").await;

        let resp = create_router(app.state.clone())
            .oneshot(post_json(
                "/api/vaccine/submit",
                serde_json::json!({ "employee_number": "E1", "response": "yes" }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["message"], "Response saved successfully");
        let stored = app.store.get_by_employee_number("E1").await.unwrap().unwrap();
        assert_eq!(stored.vaccinated, Some(VaccinationStatus::Yes));
    }

    #[tokio::test]
    async fn submit_for_unknown_employee_fails_without_creating() {
        let app = test_app();

        let resp = create_router(app.state.clone())
            .oneshot(post_json(
                "/api/vaccine/submit",
                serde_json::json!({ "employee_number": "nobody", "response": "yes" }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(resp).await["error"], "Failed to save response");
        assert_eq!(app.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn submit_rejects_unknown_answer() {
        let app = test_app();
        seed(&app.store, "E1", "Surgery", "a@x.org").await;

        let resp = create_router(app.state.clone())
            .oneshot(post_json(
                "/api/vaccine/submit",
                serde_json::json!({ "employee_number": "E1", "response": "maybe" }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            json_body(resp).await,
            serde_json::json!({ "error": "Failed to save response" })
        );
        let stored = app.store.get_by_employee_number("E1").await.unwrap().unwrap();
        assert_eq!(stored.vaccinated, Some(VaccinationStatus::No));
    }

    #[tokio::test]
    async fn malformed_staff_body_gets_json_error() {
        let app = test_app();

        let resp = create_router(app.state.clone())
            .oneshot(
                Request::post("/api/vaccine/staff")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"], "Failed to save staff details");

        let resp = create_router(app.state.clone())
            .oneshot(post_json(
                "/api/vaccine/staff",
                serde_json::json!({ "directorate": "Surgery" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(resp).await["error"], "Failed to save staff details");
        assert_eq!(app.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn lookup_reports_found_and_missing() {
        let app = test_app();
        seed(&app.store, "E1", "Surgery", "ada@example.org").await;

        let resp = create_router(app.state.clone())
            .oneshot(
                Request::get("/api/vaccine/lookup/ada@example.org")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = json_body(resp).await;
        assert_eq!(json["found"], true);
        assert_eq!(json["staff"]["employee_number"], "E1");

        let resp = create_router(app.state.clone())
            .oneshot(
                Request::get("/api/vaccine/lookup/nobody@example.org")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["found"], false);
        assert_eq!(json["message"], "Staff not found. Please provide your details.");
        assert!(json.get("staff").is_none());
    }

    #[tokio::test]
    async fn save_then_list_staff() {
        let app = test_app();

        for (number, last) in [("E2", "Young"), ("E1", "Adams")] {
            let resp = create_router(app.state.clone())
                .oneshot(post_json(
                    "/api/vaccine/staff",
                    serde_json::json!({
                        "employee_number": number,
                        "directorate": "Surgery",
                        "organisation": "North Trust",
                        "employee_first_name": "Sam",
                        "employee_last_name": last,
                        "email": format!("{number}@example.org"),
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(json_body(resp).await["message"], "Staff details saved successfully");
        }

        let resp = create_router(app.state.clone())
            .oneshot(Request::get("/api/vaccine/staff").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = json_body(resp).await;
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["employee_last_name"], "Adams");
        assert_eq!(rows[1]["employee_last_name"], "Young");
        assert_eq!(rows[0]["vaccinated"], "no");
    }

    #[tokio::test]
    async fn save_with_blank_employee_number_fails() {
        let app = test_app();

        let resp = create_router(app.state.clone())
            .oneshot(post_json(
                "/api/vaccine/staff",
                serde_json::json!({ "employee_number": "" }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(resp).await["error"], "Failed to save staff details");
    }
}
