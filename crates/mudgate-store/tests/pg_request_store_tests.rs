//! Integration tests for `PgRequestStore`.

use chrono::{TimeZone, Utc};
use mudgate_core::error::DomainError;
use mudgate_core::model::{
    ChangeRequest, ChangeRequestShape, Comment, Field, FieldStatus, FieldType, Request,
    RequestStatus, RequestType, Subfield,
};
use mudgate_core::repository::{HistoryEntry, RequestStore};
use mudgate_store::pg_request_store::PgRequestStore;
use sqlx::PgPool;
use uuid::Uuid;

fn make_request(owner_id: Uuid) -> Request {
    Request::new(
        Uuid::new_v4(),
        RequestType::CharacterApplication,
        owner_id,
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
    )
}

fn make_change_request(request: &Request, field: &Field) -> ChangeRequest {
    ChangeRequest {
        id: Uuid::new_v4(),
        request_id: request.id,
        field_id: field.id,
        reviewer_id: Uuid::new_v4(),
        value: field.value.clone(),
        text: "Please pick another name.".to_string(),
        created_at: request.created_at,
        updated_at: request.created_at,
    }
}

// --- requests ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_insert_and_load_request(pool: PgPool) {
    let store = PgRequestStore::new(pool);
    let request = make_request(Uuid::new_v4());

    let mut tx = store.begin().await.unwrap();
    tx.insert_request(&request).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.load_request(request.id).await.unwrap();
    assert_eq!(loaded, Some(request));
    assert_eq!(tx.load_request(Uuid::new_v4()).await.unwrap(), None);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_rollback_discards_writes(pool: PgPool) {
    let store = PgRequestStore::new(pool);
    let request = make_request(Uuid::new_v4());

    let mut tx = store.begin().await.unwrap();
    tx.insert_request(&request).await.unwrap();
    tx.rollback().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.load_request(request.id).await.unwrap(), None);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_find_request_reads_without_locking(pool: PgPool) {
    let store = PgRequestStore::new(pool);
    let request = make_request(Uuid::new_v4());
    let mut tx = store.begin().await.unwrap();
    tx.insert_request(&request).await.unwrap();
    tx.commit().await.unwrap();

    let mut writer = store.begin().await.unwrap();
    let locked = writer.load_request(request.id).await.unwrap();
    // Would block behind the writer's row lock if it took one itself.
    let mut reader = store.begin().await.unwrap();
    let found = reader.find_request(request.id).await.unwrap();

    assert_eq!(locked, Some(request.clone()));
    assert_eq!(found, Some(request));
    assert_eq!(reader.find_request(Uuid::new_v4()).await.unwrap(), None);
}

// --- compare-and-swap ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_update_request_with_current_version(pool: PgPool) {
    let store = PgRequestStore::new(pool);
    let mut request = make_request(Uuid::new_v4());
    let mut tx = store.begin().await.unwrap();
    tx.insert_request(&request).await.unwrap();

    request.status = RequestStatus::Ready;
    request.version = 2;
    tx.update_request(&request, 1).await.unwrap();

    let loaded = tx.load_request(request.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, RequestStatus::Ready);
    assert_eq!(loaded.version, 2);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_update_request_with_stale_version_conflicts(pool: PgPool) {
    let store = PgRequestStore::new(pool);
    let request = make_request(Uuid::new_v4());
    let mut tx = store.begin().await.unwrap();
    tx.insert_request(&request).await.unwrap();

    let result = tx.update_request(&request, 7).await;

    match result {
        Err(DomainError::ConcurrencyConflict {
            request_id,
            expected,
            actual,
        }) => {
            assert_eq!(request_id, request.id);
            assert_eq!(expected, 7);
            assert_eq!(actual, 1);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_update_missing_request_is_not_found(pool: PgPool) {
    let store = PgRequestStore::new(pool);
    let request = make_request(Uuid::new_v4());
    let mut tx = store.begin().await.unwrap();

    let result = tx.update_request(&request, 1).await;

    assert!(matches!(result, Err(DomainError::NotFound { .. })));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_list_requests_by_owner_and_status(pool: PgPool) {
    let store = PgRequestStore::new(pool);
    let owner = Uuid::new_v4();
    let mine = make_request(owner);
    let mut submitted = make_request(Uuid::new_v4());
    submitted.status = RequestStatus::Submitted;
    let mut tx = store.begin().await.unwrap();
    tx.insert_request(&mine).await.unwrap();
    tx.insert_request(&submitted).await.unwrap();

    let owned = tx.list_requests_for_owner(owner).await.unwrap();
    let queue = tx
        .list_requests_with_status(&[RequestStatus::Submitted, RequestStatus::InReview])
        .await
        .unwrap();

    assert_eq!(owned, vec![mine]);
    assert_eq!(queue, vec![submitted]);
}

// --- fields and subfields ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_field_and_subfield_round_trip(pool: PgPool) {
    let store = PgRequestStore::new(pool);
    let request = make_request(Uuid::new_v4());
    let mut field = Field::new(Uuid::new_v4(), request.id, FieldType::Keywords);
    let mut tx = store.begin().await.unwrap();
    tx.insert_request(&request).await.unwrap();
    tx.insert_field(&field).await.unwrap();

    for (position, value) in [(1, "tall"), (0, "woman")] {
        tx.insert_subfield(&Subfield {
            id: Uuid::new_v4(),
            field_id: field.id,
            value: value.to_string(),
            position,
        })
        .await
        .unwrap();
    }
    field.value = "woman, tall".to_string();
    field.status = FieldStatus::Approved;
    tx.update_field(&field).await.unwrap();

    let fields = tx.list_fields(request.id).await.unwrap();
    let subfields = tx.list_subfields(field.id).await.unwrap();
    assert_eq!(fields, vec![field]);
    let values: Vec<&str> = subfields.iter().map(|s| s.value.as_str()).collect();
    assert_eq!(values, vec!["woman", "tall"]);

    tx.delete_subfield(subfields[0].id).await.unwrap();
    assert_eq!(tx.load_subfield(subfields[0].id).await.unwrap(), None);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_delete_missing_subfield_is_not_found(pool: PgPool) {
    let store = PgRequestStore::new(pool);
    let missing = Uuid::new_v4();
    let mut tx = store.begin().await.unwrap();

    let result = tx.delete_subfield(missing).await;

    match result {
        Err(DomainError::NotFound { entity, key }) => {
            assert_eq!(entity, "subfield");
            assert_eq!(key, missing.to_string());
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

// --- change requests ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_change_request_shapes_are_separate_sets(pool: PgPool) {
    let store = PgRequestStore::new(pool);
    let request = make_request(Uuid::new_v4());
    let mut field = Field::new(Uuid::new_v4(), request.id, FieldType::Name);
    field.value = "Testify".to_string();
    let mut change_request = make_change_request(&request, &field);
    let mut tx = store.begin().await.unwrap();
    tx.insert_request(&request).await.unwrap();
    tx.insert_field(&field).await.unwrap();

    tx.insert_change_request(ChangeRequestShape::Open, &change_request)
        .await
        .unwrap();
    change_request.text = "Please pick a shorter name.".to_string();
    tx.update_change_request(ChangeRequestShape::Open, &change_request)
        .await
        .unwrap();
    tx.insert_change_request(ChangeRequestShape::Active, &change_request)
        .await
        .unwrap();
    tx.delete_change_request(ChangeRequestShape::Open, change_request.id)
        .await
        .unwrap();

    assert!(
        tx.list_change_requests(ChangeRequestShape::Open, request.id)
            .await
            .unwrap()
            .is_empty()
    );
    let active = tx
        .list_change_requests_for_field(ChangeRequestShape::Active, field.id)
        .await
        .unwrap();
    assert_eq!(active, vec![change_request]);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_delete_change_request_from_wrong_shape_is_not_found(pool: PgPool) {
    let store = PgRequestStore::new(pool);
    let request = make_request(Uuid::new_v4());
    let field = Field::new(Uuid::new_v4(), request.id, FieldType::Name);
    let change_request = make_change_request(&request, &field);
    let mut tx = store.begin().await.unwrap();
    tx.insert_request(&request).await.unwrap();
    tx.insert_field(&field).await.unwrap();
    tx.insert_change_request(ChangeRequestShape::Active, &change_request)
        .await
        .unwrap();

    let result = tx
        .delete_change_request(ChangeRequestShape::Open, change_request.id)
        .await;

    assert!(matches!(result, Err(DomainError::NotFound { .. })));
    assert_eq!(
        tx.list_change_requests(ChangeRequestShape::Active, request.id)
            .await
            .unwrap(),
        vec![change_request]
    );
}

// --- comments and history ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_comments_and_history_round_trip(pool: PgPool) {
    let store = PgRequestStore::new(pool);
    let request = make_request(Uuid::new_v4());
    let comment = Comment {
        id: Uuid::new_v4(),
        request_id: request.id,
        field_type: FieldType::Backstory,
        version: 1,
        parent_id: None,
        author_id: Uuid::new_v4(),
        text: "Where did she grow up?".to_string(),
        created_at: request.created_at,
    };
    let entries: Vec<HistoryEntry> = ["request.created", "request.status_changed"]
        .into_iter()
        .map(|event_type| HistoryEntry {
            event_id: Uuid::new_v4(),
            request_id: request.id,
            event_type: event_type.to_string(),
            payload: serde_json::json!({"nested": {"to": "Ready"}}),
            actor_id: request.owner_id,
            correlation_id: Uuid::new_v4(),
            occurred_at: request.created_at,
        })
        .collect();
    let mut tx = store.begin().await.unwrap();
    tx.insert_request(&request).await.unwrap();

    tx.insert_comment(&comment).await.unwrap();
    tx.append_history(&entries).await.unwrap();

    assert_eq!(tx.load_comment(comment.id).await.unwrap(), Some(comment.clone()));
    assert_eq!(
        tx.list_comments(request.id, FieldType::Backstory).await.unwrap(),
        vec![comment]
    );
    assert!(tx.list_comments(request.id, FieldType::Name).await.unwrap().is_empty());
    assert_eq!(tx.list_history(request.id).await.unwrap(), entries);
}
