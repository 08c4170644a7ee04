use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        present, Group, GroupId, Student, StudentDetails, StudentDetailsPatch, StudentId,
        TransferRequest,
    },
    error::ApiException,
};

pub const DEFAULT_SEARCH_TYPE: &str = "nationalId";

/// Column a student search matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchKind {
    #[default]
    NationalId,
    Name,
}

impl SearchKind {
    /// Anything other than `nationalId` searches by name.
    pub fn from_param(raw: &str) -> Self {
        if raw == DEFAULT_SEARCH_TYPE {
            Self::NationalId
        } else {
            Self::Name
        }
    }

    pub fn as_param(self) -> &'static str {
        match self {
            Self::NationalId => DEFAULT_SEARCH_TYPE,
            Self::Name => "name",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    pub name: String,
    pub national_id: String,
    #[serde(flatten)]
    pub details: StudentDetails,
}

impl NewStudent {
    pub fn validate(&self) -> Result<(), ApiException> {
        if self.name.trim().is_empty() {
            return Err(ApiException::validation("student name must not be empty"));
        }
        if self.national_id.trim().is_empty() {
            return Err(ApiException::validation("nationalId must not be empty"));
        }
        Ok(())
    }
}

/// One row of a bulk import. Nothing is required up front; the store decides
/// what to skip and what to fill in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    #[serde(flatten)]
    pub details: StudentDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Option<GroupId>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub national_id: Option<Option<String>>,
    #[serde(flatten)]
    pub details: StudentDetailsPatch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStudentsRequest {
    #[serde(default)]
    pub students: Vec<StudentDraft>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportStudentsResponse {
    pub students: Vec<Student>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewGroup {
    pub fn validate(&self) -> Result<(), ApiException> {
        if self.name.trim().is_empty() {
            return Err(ApiException::validation("group name must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransferRequest {
    pub student_id: StudentId,
    pub from_school: String,
    pub to_school: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_reason: Option<String>,
    pub request_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// The fixed set of operations reachable through `/api/...` paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ListStudents,
    CreateStudent,
    SearchStudents,
    ImportStudents,
    GetStudent,
    UpdateStudent,
    DeleteStudent,
    ListStudentTransferRequests,
    ListGroups,
    CreateGroup,
    DeleteGroup,
    CreateTransferRequest,
}

/// A decoded request, one variant per endpoint, with its payload already typed.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    ListStudents,
    CreateStudent(NewStudent),
    SearchStudents { query: String, kind: SearchKind },
    ImportStudents(ImportStudentsRequest),
    GetStudent(StudentId),
    UpdateStudent(StudentId, StudentPatch),
    DeleteStudent(StudentId),
    ListStudentTransferRequests(StudentId),
    ListGroups,
    CreateGroup(NewGroup),
    DeleteGroup(GroupId),
    CreateTransferRequest(NewTransferRequest),
}

impl ApiCall {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::ListStudents => Endpoint::ListStudents,
            Self::CreateStudent(_) => Endpoint::CreateStudent,
            Self::SearchStudents { .. } => Endpoint::SearchStudents,
            Self::ImportStudents(_) => Endpoint::ImportStudents,
            Self::GetStudent(_) => Endpoint::GetStudent,
            Self::UpdateStudent(..) => Endpoint::UpdateStudent,
            Self::DeleteStudent(_) => Endpoint::DeleteStudent,
            Self::ListStudentTransferRequests(_) => Endpoint::ListStudentTransferRequests,
            Self::ListGroups => Endpoint::ListGroups,
            Self::CreateGroup(_) => Endpoint::CreateGroup,
            Self::DeleteGroup(_) => Endpoint::DeleteGroup,
            Self::CreateTransferRequest(_) => Endpoint::CreateTransferRequest,
        }
    }

    pub fn validate(&self) -> Result<(), ApiException> {
        match self {
            Self::CreateStudent(student) => student.validate(),
            Self::CreateGroup(group) => group.validate(),
            _ => Ok(()),
        }
    }
}

/// Result of an [`ApiCall`]; serializes to the same JSON an HTTP endpoint
/// answers with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApiReply {
    Students(Vec<Student>),
    Student(Option<Student>),
    Imported(ImportStudentsResponse),
    TransferRequests(Vec<TransferRequest>),
    TransferRequest(TransferRequest),
    Groups(Vec<Group>),
    Group(Group),
    Success(SuccessResponse),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_kind_defaults_unknown_types_to_name() {
        assert_eq!(SearchKind::from_param("nationalId"), SearchKind::NationalId);
        assert_eq!(SearchKind::from_param("name"), SearchKind::Name);
        assert_eq!(SearchKind::from_param("guardian"), SearchKind::Name);
    }

    #[test]
    fn new_student_requires_name_and_national_id() {
        let err = serde_json::from_value::<NewStudent>(serde_json::json!({ "name": "Ali" }))
            .expect_err("missing nationalId");
        assert!(err.to_string().contains("nationalId"));

        let blank: NewStudent =
            serde_json::from_value(serde_json::json!({ "name": " ", "nationalId": "1" }))
                .expect("decodes");
        assert!(blank.validate().is_err());
    }

    #[test]
    fn import_request_reads_group_name_and_sparse_rows() {
        let request: ImportStudentsRequest = serde_json::from_value(serde_json::json!({
            "students": [{ "name": "A", "nationalId": "1" }, { "nationalId": "1" }, {}],
            "groupName": "G1",
        }))
        .expect("request");

        assert_eq!(request.group_name.as_deref(), Some("G1"));
        assert_eq!(request.students.len(), 3);
        assert_eq!(request.students[1].name, None);
        assert_eq!(request.students[2], StudentDraft::default());
    }

    #[test]
    fn patch_distinguishes_null_group_from_absent_group() {
        let clear: StudentPatch =
            serde_json::from_value(serde_json::json!({ "groupId": null })).expect("patch");
        assert_eq!(clear.group_id, Some(None));

        let untouched: StudentPatch =
            serde_json::from_value(serde_json::json!({ "name": "Sara" })).expect("patch");
        assert_eq!(untouched.group_id, None);
        assert_eq!(untouched.name, Some(Some("Sara".into())));
    }

    #[test]
    fn delete_reply_serializes_as_success_flag() {
        let reply = ApiReply::Success(SuccessResponse::ok());
        assert_eq!(
            serde_json::to_value(reply).expect("json"),
            serde_json::json!({ "success": true })
        );
    }
}
