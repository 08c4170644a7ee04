use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{Group, GroupId, Student, StudentId, TransferRequest},
    protocol::{
        ApiCall, ApiReply, ImportStudentsResponse, NewGroup, NewStudent, NewTransferRequest,
        SearchKind, StudentDraft, StudentPatch, SuccessResponse,
    },
};
use storage::Storage;
use tracing::debug;

/// Record operations available in-process, without a server.
#[async_trait]
pub trait LocalBackend: Send + Sync {
    async fn list_students(&self) -> Result<Vec<Student>>;
    async fn search_students(&self, query: &str, kind: SearchKind) -> Result<Vec<Student>>;
    async fn get_student(&self, student_id: StudentId) -> Result<Option<Student>>;
    async fn create_student(&self, student: NewStudent) -> Result<Student>;
    async fn update_student(
        &self,
        student_id: StudentId,
        patch: StudentPatch,
    ) -> Result<Option<Student>>;
    async fn delete_student(&self, student_id: StudentId) -> Result<bool>;
    async fn bulk_create_students(
        &self,
        students: Vec<StudentDraft>,
        group_name: Option<String>,
    ) -> Result<Vec<Student>>;
    async fn list_groups(&self) -> Result<Vec<Group>>;
    async fn create_group(&self, group: NewGroup) -> Result<Group>;
    async fn delete_group(&self, group_id: GroupId) -> Result<bool>;
    async fn create_transfer_request(&self, request: NewTransferRequest)
        -> Result<TransferRequest>;
    async fn list_transfer_requests(&self, student_id: StudentId) -> Result<Vec<TransferRequest>>;
}

#[async_trait]
impl LocalBackend for Storage {
    async fn list_students(&self) -> Result<Vec<Student>> {
        Storage::list_students(self).await
    }

    async fn search_students(&self, query: &str, kind: SearchKind) -> Result<Vec<Student>> {
        Storage::search_students(self, query, kind).await
    }

    async fn get_student(&self, student_id: StudentId) -> Result<Option<Student>> {
        Storage::get_student(self, student_id).await
    }

    async fn create_student(&self, student: NewStudent) -> Result<Student> {
        Storage::create_student(self, &student).await
    }

    async fn update_student(
        &self,
        student_id: StudentId,
        patch: StudentPatch,
    ) -> Result<Option<Student>> {
        Storage::update_student(self, student_id, &patch).await
    }

    async fn delete_student(&self, student_id: StudentId) -> Result<bool> {
        Storage::delete_student(self, student_id).await
    }

    async fn bulk_create_students(
        &self,
        students: Vec<StudentDraft>,
        group_name: Option<String>,
    ) -> Result<Vec<Student>> {
        Storage::bulk_create_students(self, &students, group_name.as_deref()).await
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        Storage::list_groups(self).await
    }

    async fn create_group(&self, group: NewGroup) -> Result<Group> {
        let created_at = group.created_at.unwrap_or_else(Utc::now);
        Storage::create_group(self, &group.name, created_at).await
    }

    async fn delete_group(&self, group_id: GroupId) -> Result<bool> {
        Storage::delete_group(self, group_id).await
    }

    async fn create_transfer_request(
        &self,
        request: NewTransferRequest,
    ) -> Result<TransferRequest> {
        Storage::create_transfer_request(self, &request).await
    }

    async fn list_transfer_requests(&self, student_id: StudentId) -> Result<Vec<TransferRequest>> {
        Storage::list_transfer_requests_for_student(self, student_id).await
    }
}

/// Runs `call` against `backend`. Deletes always answer `{"success": true}`
/// once the backend call itself succeeded.
pub async fn execute(backend: &dyn LocalBackend, call: ApiCall) -> Result<ApiReply> {
    let reply = match call {
        ApiCall::ListStudents => ApiReply::Students(backend.list_students().await?),
        ApiCall::CreateStudent(student) => {
            ApiReply::Student(Some(backend.create_student(student).await?))
        }
        ApiCall::SearchStudents { query, kind } => {
            ApiReply::Students(backend.search_students(&query, kind).await?)
        }
        ApiCall::ImportStudents(request) => ApiReply::Imported(ImportStudentsResponse {
            students: backend
                .bulk_create_students(request.students, request.group_name)
                .await?,
        }),
        ApiCall::GetStudent(student_id) => ApiReply::Student(backend.get_student(student_id).await?),
        ApiCall::UpdateStudent(student_id, patch) => {
            ApiReply::Student(backend.update_student(student_id, patch).await?)
        }
        ApiCall::DeleteStudent(student_id) => {
            let deleted = backend.delete_student(student_id).await?;
            debug!(student_id = student_id.0, deleted, "student delete finished");
            ApiReply::Success(SuccessResponse::ok())
        }
        ApiCall::ListStudentTransferRequests(student_id) => {
            ApiReply::TransferRequests(backend.list_transfer_requests(student_id).await?)
        }
        ApiCall::ListGroups => ApiReply::Groups(backend.list_groups().await?),
        ApiCall::CreateGroup(group) => ApiReply::Group(backend.create_group(group).await?),
        ApiCall::DeleteGroup(group_id) => {
            let deleted = backend.delete_group(group_id).await?;
            debug!(group_id = group_id.0, deleted, "group delete finished");
            ApiReply::Success(SuccessResponse::ok())
        }
        ApiCall::CreateTransferRequest(request) => {
            ApiReply::TransferRequest(backend.create_transfer_request(request).await?)
        }
    };
    Ok(reply)
}
