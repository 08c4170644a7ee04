use super::*;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app() -> (Router, Storage) {
    let storage = Storage::open("sqlite::memory:").await.expect("db");
    let app = build_router(Arc::new(AppState {
        api: ApiContext {
            storage: storage.clone(),
        },
    }));
    (app, storage)
}

async fn call(app: &Router, method: Method, uri: &str, payload: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match payload {
        Some(payload) => builder
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");
    app.clone().oneshot(request).await.expect("response")
}

async fn json_of(response: Response) -> Value {
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&body).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _storage) = test_app().await;
    let response = call(&app, Method::GET, "/healthz", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn student_lifecycle_over_http() {
    let (app, _storage) = test_app().await;

    let created = call(
        &app,
        Method::POST,
        "/api/students",
        Some(json!({ "name": "Omar", "nationalId": "29901011234567", "gender": "male" })),
    )
    .await;
    assert_eq!(created.status(), StatusCode::OK);
    let created = json_of(created).await;
    let id = created["id"].as_i64().expect("id");
    assert_eq!(created["gender"], "male");

    let patched = call(
        &app,
        Method::PATCH,
        &format!("/api/students/{id}"),
        Some(json!({ "gender": null, "notes": "moved seat" })),
    )
    .await;
    assert_eq!(patched.status(), StatusCode::OK);
    let patched = json_of(patched).await;
    assert!(patched.get("gender").is_none());
    assert_eq!(patched["notes"], "moved seat");
    assert_eq!(patched["name"], "Omar");

    let fetched = json_of(call(&app, Method::GET, &format!("/api/students/{id}"), None).await).await;
    assert_eq!(fetched, patched);

    let deleted = call(&app, Method::DELETE, &format!("/api/students/{id}"), None).await;
    assert_eq!(json_of(deleted).await, json!({ "success": true }));

    let missing = call(&app, Method::GET, &format!("/api/students/{id}"), None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_of(missing).await["code"], "not_found");
}

#[tokio::test]
async fn duplicate_national_id_returns_conflict() {
    let (app, _storage) = test_app().await;
    let payload = json!({ "name": "Laila", "nationalId": "111" });
    let first = call(&app, Method::POST, "/api/students", Some(payload.clone())).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = call(&app, Method::POST, "/api/students", Some(payload)).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(json_of(second).await["code"], "conflict");
}

#[tokio::test]
async fn malformed_bodies_and_ids_are_bad_requests() {
    let (app, _storage) = test_app().await;

    let missing_field = call(
        &app,
        Method::POST,
        "/api/students",
        Some(json!({ "name": "No id" })),
    )
    .await;
    assert_eq!(missing_field.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(missing_field).await["code"], "validation");

    let bad_id = call(&app, Method::DELETE, "/api/groups/cohort-a", None).await;
    assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_defaults_to_national_id() {
    let (app, storage) = test_app().await;
    for (name, national_id) in [("Nour 12", "A-12"), ("Ziad", "B-34")] {
        storage
            .create_student(&NewStudent {
                group_id: None,
                name: name.into(),
                national_id: national_id.into(),
                details: Default::default(),
            })
            .await
            .expect("student");
    }

    let by_id = json_of(call(&app, Method::GET, "/api/students/search?q=12", None).await).await;
    assert_eq!(by_id.as_array().expect("array").len(), 1);
    assert_eq!(by_id[0]["nationalId"], "A-12");

    let by_name = json_of(
        call(&app, Method::GET, "/api/students/search?q=Zi&type=name", None).await,
    )
    .await;
    assert_eq!(by_name[0]["name"], "Ziad");

    let everything = json_of(call(&app, Method::GET, "/api/students/search", None).await).await;
    assert_eq!(everything.as_array().expect("array").len(), 2);
}

#[tokio::test]
async fn import_groups_and_transfers_round_trip() {
    let (app, _storage) = test_app().await;

    let imported = call(
        &app,
        Method::POST,
        "/api/students/import",
        Some(json!({
            "groupName": "Grade 3",
            "students": [
                { "name": "Hala", "nationalId": "900" },
                { "name": "Hala again", "nationalId": "900" },
                {}
            ]
        })),
    )
    .await;
    assert_eq!(imported.status(), StatusCode::OK);
    let imported = json_of(imported).await;
    let students = imported["students"].as_array().expect("students");
    assert_eq!(students.len(), 1);
    let student_id = students[0]["id"].as_i64().expect("id");

    let groups = json_of(call(&app, Method::GET, "/api/groups", None).await).await;
    assert_eq!(groups[0]["name"], "Grade 3");
    let group_id = groups[0]["id"].as_i64().expect("group id");

    let transfer = call(
        &app,
        Method::POST,
        "/api/transfer-requests",
        Some(json!({
            "studentId": student_id,
            "fromSchool": "North",
            "toSchool": "South",
            "requestDate": "2024-10-01"
        })),
    )
    .await;
    assert_eq!(transfer.status(), StatusCode::OK);
    assert_eq!(json_of(transfer).await["status"], "pending");

    let transfers = json_of(
        call(
            &app,
            Method::GET,
            &format!("/api/students/{student_id}/transfer-requests"),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(transfers.as_array().expect("array").len(), 1);

    let deleted = call(&app, Method::DELETE, &format!("/api/groups/{group_id}"), None).await;
    assert_eq!(json_of(deleted).await, json!({ "success": true }));
    let remaining = json_of(call(&app, Method::GET, "/api/students", None).await).await;
    assert_eq!(remaining, json!([]));
}

#[tokio::test]
async fn transfer_for_unknown_student_is_rejected() {
    let (app, _storage) = test_app().await;
    let response = call(
        &app,
        Method::POST,
        "/api/transfer-requests",
        Some(json!({
            "studentId": 404,
            "fromSchool": "North",
            "toSchool": "South",
            "requestDate": "2024-10-01"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patching_a_missing_student_is_not_found() {
    let (app, _storage) = test_app().await;
    let response = call(
        &app,
        Method::PATCH,
        "/api/students/404",
        Some(json!({ "notes": "late" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_of(response).await["code"], "not_found");
}
