use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use shared::{
    domain::{Group, GroupId, Student, StudentId, TransferRequest},
    error::{ApiError, ErrorCode},
    protocol::{
        ImportStudentsRequest, ImportStudentsResponse, NewGroup, NewStudent, NewTransferRequest,
        SearchKind, StudentPatch, SuccessResponse, DEFAULT_SEARCH_TYPE,
    },
};
use storage::Storage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;

use api::ApiContext;
use app_state::AppState;
use config::load_settings;

type HttpError = (StatusCode, Json<ApiError>);
type HttpResult<T> = Result<Json<T>, HttpError>;

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let database_url = settings.database_url;
    let storage = Storage::open(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            error = %format!("{error:#}"),
            "failed to open SQLite database; verify parent directory permissions"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext {
            storage: storage.clone(),
        },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    storage.close().await;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/api/students",
            get(http_list_students).post(http_create_student),
        )
        .route("/api/students/search", get(http_search_students))
        .route("/api/students/import", post(http_import_students))
        .route(
            "/api/students/:student_id",
            get(http_get_student)
                .patch(http_update_student)
                .delete(http_delete_student),
        )
        .route(
            "/api/students/:student_id/transfer-requests",
            get(http_list_transfer_requests),
        )
        .route("/api/groups", get(http_list_groups).post(http_create_group))
        .route("/api/groups/:group_id", delete(http_delete_group))
        .route("/api/transfer-requests", post(http_create_transfer_request))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state.api.storage.health_check().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, format!("{e:#}"))),
        )
    })?;
    Ok("ok")
}

async fn http_list_students(State(state): State<Arc<AppState>>) -> HttpResult<Vec<Student>> {
    api::list_students(&state.api).await.map(Json).map_err(reject)
}

async fn http_create_student(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewStudent>, JsonRejection>,
) -> HttpResult<Student> {
    let student = json_body(payload)?;
    api::create_student(&state.api, student)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_search_students(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> HttpResult<Vec<Student>> {
    let kind = query
        .kind
        .as_deref()
        .filter(|kind| !kind.is_empty())
        .unwrap_or(DEFAULT_SEARCH_TYPE);
    api::search_students(&state.api, &query.q, SearchKind::from_param(kind))
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_import_students(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ImportStudentsRequest>, JsonRejection>,
) -> HttpResult<ImportStudentsResponse> {
    let request = json_body(payload)?;
    api::import_students(&state.api, request)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_get_student(
    State(state): State<Arc<AppState>>,
    student_id: Result<Path<i64>, PathRejection>,
) -> HttpResult<Student> {
    let student_id = StudentId(path_id(student_id)?);
    api::get_student(&state.api, student_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_update_student(
    State(state): State<Arc<AppState>>,
    student_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StudentPatch>, JsonRejection>,
) -> HttpResult<Student> {
    let student_id = StudentId(path_id(student_id)?);
    let patch = json_body(payload)?;
    api::update_student(&state.api, student_id, patch)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_delete_student(
    State(state): State<Arc<AppState>>,
    student_id: Result<Path<i64>, PathRejection>,
) -> HttpResult<SuccessResponse> {
    let student_id = StudentId(path_id(student_id)?);
    api::delete_student(&state.api, student_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_list_transfer_requests(
    State(state): State<Arc<AppState>>,
    student_id: Result<Path<i64>, PathRejection>,
) -> HttpResult<Vec<TransferRequest>> {
    let student_id = StudentId(path_id(student_id)?);
    api::list_transfer_requests(&state.api, student_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_list_groups(State(state): State<Arc<AppState>>) -> HttpResult<Vec<Group>> {
    api::list_groups(&state.api).await.map(Json).map_err(reject)
}

async fn http_create_group(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewGroup>, JsonRejection>,
) -> HttpResult<Group> {
    let group = json_body(payload)?;
    api::create_group(&state.api, group)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_delete_group(
    State(state): State<Arc<AppState>>,
    group_id: Result<Path<i64>, PathRejection>,
) -> HttpResult<SuccessResponse> {
    let group_id = GroupId(path_id(group_id)?);
    api::delete_group(&state.api, group_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_create_transfer_request(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewTransferRequest>, JsonRejection>,
) -> HttpResult<TransferRequest> {
    let request = json_body(payload)?;
    api::create_transfer_request(&state.api, request)
        .await
        .map(Json)
        .map_err(reject)
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, HttpError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        reject(ApiError::new(ErrorCode::Validation, rejection.body_text()))
    })
}

fn path_id(id: Result<Path<i64>, PathRejection>) -> Result<i64, HttpError> {
    id.map(|Path(id)| id).map_err(|rejection| {
        reject(ApiError::new(ErrorCode::Validation, rejection.body_text()))
    })
}

fn reject(err: ApiError) -> HttpError {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(message = %err.message, "request failed");
    }
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
