use chrono::Utc;
use shared::{
    domain::{Group, GroupId, Student, StudentId, TransferRequest},
    error::{ApiError, ErrorCode},
    protocol::{
        ImportStudentsRequest, ImportStudentsResponse, NewGroup, NewStudent, NewTransferRequest,
        SearchKind, StudentPatch, SuccessResponse,
    },
};
use storage::{constraint_violation, Storage};
use tracing::debug;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn list_students(ctx: &ApiContext) -> Result<Vec<Student>, ApiError> {
    ctx.storage.list_students().await.map_err(storage_error)
}

pub async fn search_students(
    ctx: &ApiContext,
    query: &str,
    kind: SearchKind,
) -> Result<Vec<Student>, ApiError> {
    ctx.storage
        .search_students(query, kind)
        .await
        .map_err(storage_error)
}

pub async fn get_student(ctx: &ApiContext, student_id: StudentId) -> Result<Student, ApiError> {
    ctx.storage
        .get_student(student_id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| student_not_found(student_id))
}

pub async fn create_student(ctx: &ApiContext, student: NewStudent) -> Result<Student, ApiError> {
    student.validate()?;
    ctx.storage
        .create_student(&student)
        .await
        .map_err(storage_error)
}

pub async fn update_student(
    ctx: &ApiContext,
    student_id: StudentId,
    patch: StudentPatch,
) -> Result<Student, ApiError> {
    ctx.storage
        .update_student(student_id, &patch)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| student_not_found(student_id))
}

pub async fn delete_student(
    ctx: &ApiContext,
    student_id: StudentId,
) -> Result<SuccessResponse, ApiError> {
    let deleted = ctx
        .storage
        .delete_student(student_id)
        .await
        .map_err(storage_error)?;
    debug!(student_id = student_id.0, deleted, "student delete finished");
    Ok(SuccessResponse::ok())
}

pub async fn import_students(
    ctx: &ApiContext,
    request: ImportStudentsRequest,
) -> Result<ImportStudentsResponse, ApiError> {
    let students = ctx
        .storage
        .bulk_create_students(&request.students, request.group_name.as_deref())
        .await
        .map_err(storage_error)?;
    Ok(ImportStudentsResponse { students })
}

pub async fn list_transfer_requests(
    ctx: &ApiContext,
    student_id: StudentId,
) -> Result<Vec<TransferRequest>, ApiError> {
    ctx.storage
        .list_transfer_requests_for_student(student_id)
        .await
        .map_err(storage_error)
}

pub async fn list_groups(ctx: &ApiContext) -> Result<Vec<Group>, ApiError> {
    ctx.storage.list_groups().await.map_err(storage_error)
}

pub async fn create_group(ctx: &ApiContext, group: NewGroup) -> Result<Group, ApiError> {
    group.validate()?;
    ctx.storage
        .create_group(&group.name, group.created_at.unwrap_or_else(Utc::now))
        .await
        .map_err(storage_error)
}

pub async fn delete_group(ctx: &ApiContext, group_id: GroupId) -> Result<SuccessResponse, ApiError> {
    let deleted = ctx
        .storage
        .delete_group(group_id)
        .await
        .map_err(storage_error)?;
    debug!(group_id = group_id.0, deleted, "group delete finished");
    Ok(SuccessResponse::ok())
}

pub async fn create_transfer_request(
    ctx: &ApiContext,
    request: NewTransferRequest,
) -> Result<TransferRequest, ApiError> {
    ctx.storage
        .create_transfer_request(&request)
        .await
        .map_err(storage_error)
}

fn student_not_found(student_id: StudentId) -> ApiError {
    ApiError::new(
        ErrorCode::NotFound,
        format!("student {} not found", student_id.0),
    )
}

fn storage_error(err: anyhow::Error) -> ApiError {
    use storage::ConstraintKind;

    let code = match constraint_violation(&err) {
        Some(ConstraintKind::UniqueViolation) => ErrorCode::Conflict,
        Some(_) => ErrorCode::Validation,
        None => ErrorCode::Internal,
    };
    ApiError::new(code, format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
