use shared::protocol::{ImportStudentsRequest, NewTransferRequest, SearchKind, StudentPatch};
use storage::Storage;

#[tokio::test]
async fn import_search_transfer_and_group_removal_acceptance() {
    let storage = Storage::open("sqlite::memory:").await.expect("db");

    let request: ImportStudentsRequest = serde_json::from_value(serde_json::json!({
        "groupName": "Autumn intake",
        "students": [
            { "name": "Rania Fouad", "nationalId": "30101011200011", "classCode": "1A", "birthYear": 2015 },
            { "name": "Samir Nabil", "nationalId": "30101011200012", "guardianName": "Nabil" },
            { "name": "Duplicate", "nationalId": "30101011200011" },
            { "classCode": "1B" }
        ]
    }))
    .expect("import payload");

    let imported = storage
        .bulk_create_students(&request.students, request.group_name.as_deref())
        .await
        .expect("import");
    assert_eq!(imported.len(), 2);

    let hits = storage
        .search_students("999", SearchKind::NationalId)
        .await
        .expect("search");
    assert_eq!(hits.len(), 0);
    let hits = storage
        .search_students("12000", SearchKind::NationalId)
        .await
        .expect("search");
    assert_eq!(hits.len(), 2);

    let samir = hits
        .iter()
        .find(|s| s.name == "Samir Nabil")
        .expect("samir")
        .clone();
    let patch: StudentPatch =
        serde_json::from_value(serde_json::json!({ "groupId": null, "stage": "primary" }))
            .expect("patch");
    let moved = storage
        .update_student(samir.id, &patch)
        .await
        .expect("update")
        .expect("present");
    assert_eq!(moved.group_id, None);
    assert_eq!(moved.details.stage.as_deref(), Some("primary"));
    assert_eq!(moved.details.guardian_name.as_deref(), Some("Nabil"));

    let transfer = storage
        .create_transfer_request(&NewTransferRequest {
            student_id: samir.id,
            from_school: "Nasr".into(),
            to_school: "Horreya".into(),
            transfer_reason: Some("relocation".into()),
            request_date: "2024-10-02".into(),
            status: None,
        })
        .await
        .expect("transfer");
    assert_eq!(transfer.status, "pending");

    let group = storage.list_groups().await.expect("groups").remove(0);
    assert!(storage.delete_group(group.id).await.expect("delete group"));

    let remaining = storage.list_students().await.expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, samir.id);
    assert_eq!(
        storage
            .list_transfer_requests_for_student(samir.id)
            .await
            .expect("transfers")
            .len(),
        1
    );
}
