//! Seeding helpers for handler tests.

use chrono::{DateTime, TimeZone, Utc};
use mudgate_core::model::{
    Field, FieldStatus, FieldType, Request, RequestStatus, RequestType, Subfield,
};
use mudgate_core::repository::RequestStore;
use mudgate_test_support::{FixedClock, InMemoryRequestStore};
use uuid::Uuid;

pub(crate) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

pub(crate) fn clock() -> FixedClock {
    FixedClock(fixed_now())
}

pub(crate) const KEYWORDS: [&str; 2] = ["tall", "woman"];

pub(crate) fn valid_value(field_type: FieldType) -> String {
    match field_type {
        FieldType::Name => "Testify".to_owned(),
        FieldType::Gender => "Female".to_owned(),
        FieldType::ShortDescription => "a tall, dark-eyed woman".to_owned(),
        FieldType::Description => {
            "A tall woman with dark eyes and a crooked, charming smile.".to_owned()
        }
        FieldType::Backstory => "Born in the hills, she learned the old songs. ".repeat(12),
        FieldType::Keywords => KEYWORDS.join(", "),
    }
}

/// Seeds a request in `status` with every field present. When `filled`,
/// every field carries a valid value and keywords carry two items.
pub(crate) async fn seed_request(
    store: &InMemoryRequestStore,
    status: RequestStatus,
    owner_id: Uuid,
    reviewer_id: Option<Uuid>,
    filled: bool,
) -> Request {
    let mut tx = store.begin().await.unwrap();
    let mut request = Request::new(
        Uuid::new_v4(),
        RequestType::CharacterApplication,
        owner_id,
        fixed_now(),
    );
    request.status = status;
    request.reviewer_id = reviewer_id;
    tx.insert_request(&request).await.unwrap();

    for field_type in FieldType::ALL {
        let mut field = Field::new(Uuid::new_v4(), request.id, field_type);
        if filled {
            field.value = valid_value(field_type);
            if field_type == FieldType::Keywords {
                for (position, value) in (0_i64..).zip(KEYWORDS) {
                    tx.insert_subfield(&Subfield {
                        id: Uuid::new_v4(),
                        field_id: field.id,
                        value: value.to_owned(),
                        position,
                    })
                    .await
                    .unwrap();
                }
            }
        }
        tx.insert_field(&field).await.unwrap();
    }

    tx.commit().await.unwrap();
    request
}

pub(crate) async fn load_request(store: &InMemoryRequestStore, request_id: Uuid) -> Request {
    let mut tx = store.begin().await.unwrap();
    tx.load_request(request_id).await.unwrap().unwrap()
}

pub(crate) async fn load_field(
    store: &InMemoryRequestStore,
    request_id: Uuid,
    field_type: FieldType,
) -> Field {
    let mut tx = store.begin().await.unwrap();
    tx.list_fields(request_id)
        .await
        .unwrap()
        .into_iter()
        .find(|f| f.field_type == field_type)
        .unwrap()
}

pub(crate) async fn load_subfields(store: &InMemoryRequestStore, field_id: Uuid) -> Vec<Subfield> {
    let mut tx = store.begin().await.unwrap();
    tx.list_subfields(field_id).await.unwrap()
}

pub(crate) async fn set_field_statuses(
    store: &InMemoryRequestStore,
    request_id: Uuid,
    status: FieldStatus,
) {
    let mut tx = store.begin().await.unwrap();
    for mut field in tx.list_fields(request_id).await.unwrap() {
        field.status = status;
        tx.update_field(&field).await.unwrap();
    }
    tx.commit().await.unwrap();
}
