//! Change request ledger.
//!
//! A change request is written `Open` by the assigned reviewer, becomes
//! `Active` when its review round closes and `Past` once its field is
//! approved again. The identifier is kept across all three shapes.

use mudgate_core::clock::Clock;
use mudgate_core::error::DomainError;
use mudgate_core::model::{ChangeRequest, ChangeRequestShape, FieldStatus};
use mudgate_core::repository::RequestTransaction;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::application::support::{ensure_reviewing, load_field, load_request};
use crate::domain::commands::{CreateChangeRequest, DeleteChangeRequest, EditChangeRequest};
use crate::domain::registry::Registry;
use crate::domain::validators::CHANGE_REQUEST_TEXT;

async fn load_open(
    tx: &mut dyn RequestTransaction,
    change_request_id: Uuid,
) -> Result<ChangeRequest, DomainError> {
    tx.load_change_request(ChangeRequestShape::Open, change_request_id)
        .await?
        .ok_or_else(|| DomainError::not_found("change request", change_request_id))
}

fn ensure_author(change_request: &ChangeRequest, actor_id: Uuid) -> Result<(), DomainError> {
    if change_request.reviewer_id == actor_id {
        Ok(())
    } else {
        debug!(change_request_id = %change_request.id, %actor_id, "not the author");
        Err(DomainError::Forbidden(format!(
            "change request {} belongs to another reviewer",
            change_request.id
        )))
    }
}

/// Handles the `CreateChangeRequest` command: opens a change request on a
/// field, snapshotting its current value, and marks the field `Reviewed`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request or field type is unknown,
/// `DomainError::Forbidden` unless the actor is the assigned, non-owner
/// reviewer of an `InReview` request or if the field already has an open
/// change request, and `DomainError::InvalidInput` if the text fails
/// validation once disallowed characters are stripped.
#[instrument(skip_all, fields(request_id = %command.request_id, field_type = %command.field_type))]
pub async fn handle_create_change_request(
    command: &CreateChangeRequest,
    registry: &Registry,
    clock: &dyn Clock,
    tx: &mut dyn RequestTransaction,
) -> Result<ChangeRequest, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling create_change_request command");

    let request = load_request(tx, command.request_id).await?;
    let definition = registry.field_definition_by_token(request.request_type, &command.field_type)?;
    ensure_reviewing(command.actor_id, &request, "open change requests on")?;
    let text = CHANGE_REQUEST_TEXT.clean("change request text", &command.text)?;

    let mut field = load_field(tx, request.id, definition.field_type).await?;
    let open = tx
        .list_change_requests_for_field(ChangeRequestShape::Open, field.id)
        .await?;
    if !open.is_empty() {
        return Err(DomainError::Forbidden(format!(
            "{} already has an open change request",
            definition.field_type
        )));
    }

    let now = clock.now();
    let change_request = ChangeRequest {
        id: Uuid::new_v4(),
        request_id: request.id,
        field_id: field.id,
        reviewer_id: command.actor_id,
        value: field.value.clone(),
        text,
        created_at: now,
        updated_at: now,
    };
    tx.insert_change_request(ChangeRequestShape::Open, &change_request)
        .await?;
    if field.status != FieldStatus::Reviewed {
        field.status = FieldStatus::Reviewed;
        tx.update_field(&field).await?;
    }
    info!(change_request_id = %change_request.id, field_id = %field.id, "change request opened");

    Ok(change_request)
}

/// Handles the `EditChangeRequest` command: rewords an open change request.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no open change request has the id,
/// `DomainError::Forbidden` unless the request is `InReview` with the actor
/// as its assigned reviewer and the author of the change request,
/// `DomainError::InvalidInput` if the text fails validation, and
/// `DomainError::Conflict` if the text is unchanged.
#[instrument(skip_all, fields(change_request_id = %command.change_request_id))]
pub async fn handle_edit_change_request(
    command: &EditChangeRequest,
    clock: &dyn Clock,
    tx: &mut dyn RequestTransaction,
) -> Result<ChangeRequest, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling edit_change_request command");

    let mut change_request = load_open(tx, command.change_request_id).await?;
    let request = load_request(tx, change_request.request_id).await?;
    ensure_reviewing(command.actor_id, &request, "edit change requests on")?;
    ensure_author(&change_request, command.actor_id)?;
    let text = CHANGE_REQUEST_TEXT.clean("change request text", &command.text)?;
    if change_request.text == text {
        return Err(DomainError::Conflict(
            "change request already has that text".into(),
        ));
    }

    change_request.text = text;
    change_request.updated_at = clock.now();
    tx.update_change_request(ChangeRequestShape::Open, &change_request)
        .await?;

    Ok(change_request)
}

/// Handles the `DeleteChangeRequest` command: withdraws an open change
/// request. With no other open change request left on the field, the field
/// returns to `Approved` and any active change request for it is resolved.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no open change request has the id,
/// `DomainError::Forbidden` unless the request is `InReview` with the actor
/// as its assigned reviewer and the author of the change request, and
/// `DomainError::Internal` if its field is missing.
#[instrument(skip_all, fields(change_request_id = %command.change_request_id))]
pub async fn handle_delete_change_request(
    command: &DeleteChangeRequest,
    tx: &mut dyn RequestTransaction,
) -> Result<(), DomainError> {
    info!(correlation_id = %command.correlation_id, "handling delete_change_request command");

    let change_request = load_open(tx, command.change_request_id).await?;
    let request = load_request(tx, change_request.request_id).await?;
    ensure_reviewing(command.actor_id, &request, "withdraw change requests on")?;
    ensure_author(&change_request, command.actor_id)?;

    tx.delete_change_request(ChangeRequestShape::Open, change_request.id)
        .await?;
    let remaining = tx
        .list_change_requests_for_field(ChangeRequestShape::Open, change_request.field_id)
        .await?;
    if remaining.is_empty() {
        let mut field = tx
            .load_field(change_request.field_id)
            .await?
            .ok_or_else(|| {
                DomainError::Internal(format!(
                    "change request {} references missing field {}",
                    change_request.id, change_request.field_id
                ))
            })?;
        field.status = FieldStatus::Approved;
        tx.update_field(&field).await?;
        resolve_to_past(tx, field.id).await?;
    }
    info!(change_request_id = %change_request.id, "change request withdrawn");

    Ok(())
}

/// Promotes every open change request of a request to active and removes
/// the open copies. An older active change request on the same field is
/// superseded and moved to past. Records already active are not duplicated,
/// so running it twice is harmless.
///
/// Returns the number of change requests promoted.
///
/// # Errors
///
/// Returns `DomainError` if a storage operation fails.
pub async fn close_round_to_active(
    tx: &mut dyn RequestTransaction,
    request_id: Uuid,
) -> Result<usize, DomainError> {
    let open = tx
        .list_change_requests(ChangeRequestShape::Open, request_id)
        .await?;
    let mut activated = 0;
    for change_request in open {
        let already_active = tx
            .load_change_request(ChangeRequestShape::Active, change_request.id)
            .await?
            .is_some();
        if !already_active {
            let superseded = tx
                .list_change_requests_for_field(ChangeRequestShape::Active, change_request.field_id)
                .await?;
            for old in superseded {
                tx.delete_change_request(ChangeRequestShape::Active, old.id)
                    .await?;
                tx.insert_change_request(ChangeRequestShape::Past, &old)
                    .await?;
            }
            tx.insert_change_request(ChangeRequestShape::Active, &change_request)
                .await?;
            activated += 1;
        }
        tx.delete_change_request(ChangeRequestShape::Open, change_request.id)
            .await?;
    }
    if activated > 0 {
        info!(%request_id, activated, "review round closed");
    }
    Ok(activated)
}

/// Moves every active change request of a field to past. Returns the number
/// resolved.
///
/// # Errors
///
/// Returns `DomainError` if a storage operation fails.
pub async fn resolve_to_past(
    tx: &mut dyn RequestTransaction,
    field_id: Uuid,
) -> Result<usize, DomainError> {
    let active = tx
        .list_change_requests_for_field(ChangeRequestShape::Active, field_id)
        .await?;
    for change_request in &active {
        tx.delete_change_request(ChangeRequestShape::Active, change_request.id)
            .await?;
        tx.insert_change_request(ChangeRequestShape::Past, change_request)
            .await?;
        info!(change_request_id = %change_request.id, "change request resolved");
    }
    Ok(active.len())
}

#[cfg(test)]
mod tests {
    use mudgate_core::error::DomainError;
    use mudgate_core::model::{ChangeRequestShape, FieldStatus, FieldType, RequestStatus};
    use mudgate_core::repository::RequestStore;
    use mudgate_test_support::InMemoryRequestStore;
    use uuid::Uuid;

    use crate::application::change_requests::{
        close_round_to_active, handle_create_change_request, handle_delete_change_request,
        handle_edit_change_request,
    };
    use crate::application::fixtures::{clock, load_field, seed_request, set_field_statuses};
    use crate::domain::commands::{CreateChangeRequest, DeleteChangeRequest, EditChangeRequest};
    use crate::domain::registry::Registry;

    fn open_on(actor_id: Uuid, request_id: Uuid, field_type: &str) -> CreateChangeRequest {
        CreateChangeRequest {
            correlation_id: Uuid::new_v4(),
            actor_id,
            request_id,
            field_type: field_type.to_owned(),
            text: "Please pick a listed value.".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_handle_create_change_request_snapshots_value_and_marks_reviewed() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let owner = Uuid::new_v4();
        let reviewer = Uuid::new_v4();
        let request =
            seed_request(&store, RequestStatus::InReview, owner, Some(reviewer), true).await;
        set_field_statuses(&store, request.id, FieldStatus::Approved).await;

        // Act
        let mut tx = store.begin().await.unwrap();
        let change_request = handle_create_change_request(
            &open_on(reviewer, request.id, "gender"),
            Registry::standard(),
            &clock(),
            tx.as_mut(),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        // Assert
        assert_eq!(change_request.value, "Female");
        assert_eq!(change_request.reviewer_id, reviewer);
        let gender = load_field(&store, request.id, FieldType::Gender).await;
        assert_eq!(gender.status, FieldStatus::Reviewed);
        assert_eq!(store.change_requests(ChangeRequestShape::Open).len(), 1);
    }

    #[tokio::test]
    async fn test_second_open_change_request_on_field_is_forbidden() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let reviewer = Uuid::new_v4();
        let request =
            seed_request(&store, RequestStatus::InReview, Uuid::new_v4(), Some(reviewer), true)
                .await;
        let command = open_on(reviewer, request.id, "name");
        let mut tx = store.begin().await.unwrap();
        handle_create_change_request(&command, Registry::standard(), &clock(), tx.as_mut())
            .await
            .unwrap();

        // Act
        let result =
            handle_create_change_request(&command, Registry::standard(), &clock(), tx.as_mut())
                .await;

        // Assert
        match result.unwrap_err() {
            DomainError::Forbidden(msg) => assert!(msg.contains("open change request")),
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_create_change_request_gates_on_reviewer_and_status() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let owner = Uuid::new_v4();
        let reviewer = Uuid::new_v4();
        let in_review =
            seed_request(&store, RequestStatus::InReview, owner, Some(reviewer), true).await;
        let submitted =
            seed_request(&store, RequestStatus::Submitted, owner, Some(reviewer), true).await;

        // Act
        let mut tx = store.begin().await.unwrap();
        let by_owner = handle_create_change_request(
            &open_on(owner, in_review.id, "name"),
            Registry::standard(),
            &clock(),
            tx.as_mut(),
        )
        .await;
        let by_stranger = handle_create_change_request(
            &open_on(Uuid::new_v4(), in_review.id, "name"),
            Registry::standard(),
            &clock(),
            tx.as_mut(),
        )
        .await;
        let not_in_review = handle_create_change_request(
            &open_on(reviewer, submitted.id, "name"),
            Registry::standard(),
            &clock(),
            tx.as_mut(),
        )
        .await;

        // Assert
        assert!(matches!(by_owner, Err(DomainError::Forbidden(_))));
        assert!(matches!(by_stranger, Err(DomainError::Forbidden(_))));
        assert!(matches!(not_in_review, Err(DomainError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_handle_create_change_request_validates_text() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let reviewer = Uuid::new_v4();
        let request =
            seed_request(&store, RequestStatus::InReview, Uuid::new_v4(), Some(reviewer), true)
                .await;
        let mut command = open_on(reviewer, request.id, "name");
        command.text = "Too short".to_owned();

        // Act
        let mut tx = store.begin().await.unwrap();
        let result =
            handle_create_change_request(&command, Registry::standard(), &clock(), tx.as_mut())
                .await;

        // Assert
        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_change_request_text_is_stored_without_disallowed_characters() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let reviewer = Uuid::new_v4();
        let request =
            seed_request(&store, RequestStatus::InReview, Uuid::new_v4(), Some(reviewer), true)
                .await;
        let mut command = open_on(reviewer, request.id, "name");
        command.text = "Please pick 1 name: first and last.".to_owned();

        // Act
        let mut tx = store.begin().await.unwrap();
        let change_request =
            handle_create_change_request(&command, Registry::standard(), &clock(), tx.as_mut())
                .await
                .unwrap();
        let edited = handle_edit_change_request(
            &EditChangeRequest {
                correlation_id: Uuid::new_v4(),
                actor_id: reviewer,
                change_request_id: change_request.id,
                text: "Use 2 names, please.".to_owned(),
            },
            &clock(),
            tx.as_mut(),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        // Assert
        assert_eq!(change_request.text, "Please pick  name first and last.");
        assert_eq!(edited.text, "Use  names, please.");
        let stored = store.change_requests(ChangeRequestShape::Open);
        assert_eq!(stored[0].text, "Use  names, please.");
    }

    #[tokio::test]
    async fn test_edit_and_delete_require_request_in_review() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let reviewer = Uuid::new_v4();
        let request =
            seed_request(&store, RequestStatus::InReview, Uuid::new_v4(), Some(reviewer), true)
                .await;
        let mut tx = store.begin().await.unwrap();
        let change_request = handle_create_change_request(
            &open_on(reviewer, request.id, "name"),
            Registry::standard(),
            &clock(),
            tx.as_mut(),
        )
        .await
        .unwrap();
        let mut reviewed = request.clone();
        reviewed.status = RequestStatus::Reviewed;
        tx.update_request(&reviewed, request.version).await.unwrap();

        // Act
        let edit = handle_edit_change_request(
            &EditChangeRequest {
                correlation_id: Uuid::new_v4(),
                actor_id: reviewer,
                change_request_id: change_request.id,
                text: "Another reason entirely.".to_owned(),
            },
            &clock(),
            tx.as_mut(),
        )
        .await;
        let delete = handle_delete_change_request(
            &DeleteChangeRequest {
                correlation_id: Uuid::new_v4(),
                actor_id: reviewer,
                change_request_id: change_request.id,
            },
            tx.as_mut(),
        )
        .await;

        // Assert
        assert!(matches!(edit, Err(DomainError::Forbidden(_))));
        assert!(matches!(delete, Err(DomainError::Forbidden(_))));
        assert!(
            tx.load_change_request(ChangeRequestShape::Open, change_request.id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_edit_and_delete_are_author_only() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let reviewer = Uuid::new_v4();
        let request =
            seed_request(&store, RequestStatus::InReview, Uuid::new_v4(), Some(reviewer), true)
                .await;
        let mut tx = store.begin().await.unwrap();
        let change_request = handle_create_change_request(
            &open_on(reviewer, request.id, "name"),
            Registry::standard(),
            &clock(),
            tx.as_mut(),
        )
        .await
        .unwrap();
        let stranger = Uuid::new_v4();

        // Act
        let edit = handle_edit_change_request(
            &EditChangeRequest {
                correlation_id: Uuid::new_v4(),
                actor_id: stranger,
                change_request_id: change_request.id,
                text: "Another reason entirely.".to_owned(),
            },
            &clock(),
            tx.as_mut(),
        )
        .await;
        let delete = handle_delete_change_request(
            &DeleteChangeRequest {
                correlation_id: Uuid::new_v4(),
                actor_id: stranger,
                change_request_id: change_request.id,
            },
            tx.as_mut(),
        )
        .await;

        // Assert
        assert!(matches!(edit, Err(DomainError::Forbidden(_))));
        assert!(matches!(delete, Err(DomainError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_handle_edit_change_request_rewords_and_rejects_same_text() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let reviewer = Uuid::new_v4();
        let request =
            seed_request(&store, RequestStatus::InReview, Uuid::new_v4(), Some(reviewer), true)
                .await;
        let mut tx = store.begin().await.unwrap();
        let change_request = handle_create_change_request(
            &open_on(reviewer, request.id, "name"),
            Registry::standard(),
            &clock(),
            tx.as_mut(),
        )
        .await
        .unwrap();
        let edit = |text: &str| EditChangeRequest {
            correlation_id: Uuid::new_v4(),
            actor_id: reviewer,
            change_request_id: change_request.id,
            text: text.to_owned(),
        };

        // Act
        let text = "Please use a longer name.";
        let edited = handle_edit_change_request(&edit(text), &clock(), tx.as_mut())
            .await
            .unwrap();
        let same = handle_edit_change_request(&edit(text), &clock(), tx.as_mut()).await;

        // Assert
        assert_eq!(edited.text, "Please use a longer name.");
        assert_eq!(edited.id, change_request.id);
        assert!(matches!(same, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_handle_delete_change_request_restores_approved() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let reviewer = Uuid::new_v4();
        let request =
            seed_request(&store, RequestStatus::InReview, Uuid::new_v4(), Some(reviewer), true)
                .await;
        let mut tx = store.begin().await.unwrap();
        let change_request = handle_create_change_request(
            &open_on(reviewer, request.id, "sdesc"),
            Registry::standard(),
            &clock(),
            tx.as_mut(),
        )
        .await
        .unwrap();

        // Act
        handle_delete_change_request(
            &DeleteChangeRequest {
                correlation_id: Uuid::new_v4(),
                actor_id: reviewer,
                change_request_id: change_request.id,
            },
            tx.as_mut(),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        // Assert
        let field = load_field(&store, request.id, FieldType::ShortDescription).await;
        assert_eq!(field.status, FieldStatus::Approved);
        assert!(store.change_requests(ChangeRequestShape::Open).is_empty());
    }

    #[tokio::test]
    async fn test_missing_change_request_is_not_found() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let missing = Uuid::new_v4();

        // Act
        let mut tx = store.begin().await.unwrap();
        let result = handle_delete_change_request(
            &DeleteChangeRequest {
                correlation_id: Uuid::new_v4(),
                actor_id: Uuid::new_v4(),
                change_request_id: missing,
            },
            tx.as_mut(),
        )
        .await;

        // Assert
        match result.unwrap_err() {
            DomainError::NotFound { entity, key } => {
                assert_eq!(entity, "change request");
                assert_eq!(key, missing.to_string());
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_round_to_active_is_idempotent() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let reviewer = Uuid::new_v4();
        let request =
            seed_request(&store, RequestStatus::InReview, Uuid::new_v4(), Some(reviewer), true)
                .await;
        let mut tx = store.begin().await.unwrap();
        for field_type in ["name", "backstory"] {
            handle_create_change_request(
                &open_on(reviewer, request.id, field_type),
                Registry::standard(),
                &clock(),
                tx.as_mut(),
            )
            .await
            .unwrap();
        }

        // Act
        let first = close_round_to_active(tx.as_mut(), request.id).await.unwrap();
        let second = close_round_to_active(tx.as_mut(), request.id).await.unwrap();
        tx.commit().await.unwrap();

        // Assert
        assert_eq!(first, 2);
        assert_eq!(second, 0);
        assert_eq!(store.change_requests(ChangeRequestShape::Active).len(), 2);
        assert!(store.change_requests(ChangeRequestShape::Open).is_empty());
    }

    #[tokio::test]
    async fn test_close_round_to_active_skips_records_already_active() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let reviewer = Uuid::new_v4();
        let request =
            seed_request(&store, RequestStatus::InReview, Uuid::new_v4(), Some(reviewer), true)
                .await;
        let mut tx = store.begin().await.unwrap();
        let change_request = handle_create_change_request(
            &open_on(reviewer, request.id, "name"),
            Registry::standard(),
            &clock(),
            tx.as_mut(),
        )
        .await
        .unwrap();
        tx.insert_change_request(ChangeRequestShape::Active, &change_request)
            .await
            .unwrap();

        // Act
        let activated = close_round_to_active(tx.as_mut(), request.id).await.unwrap();
        tx.commit().await.unwrap();

        // Assert
        assert_eq!(activated, 0);
        assert_eq!(store.change_requests(ChangeRequestShape::Active).len(), 1);
        assert!(store.change_requests(ChangeRequestShape::Open).is_empty());
    }

    #[tokio::test]
    async fn test_close_round_to_active_supersedes_older_active_on_same_field() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let reviewer = Uuid::new_v4();
        let request =
            seed_request(&store, RequestStatus::InReview, Uuid::new_v4(), Some(reviewer), true)
                .await;
        let mut tx = store.begin().await.unwrap();
        let older = handle_create_change_request(
            &open_on(reviewer, request.id, "name"),
            Registry::standard(),
            &clock(),
            tx.as_mut(),
        )
        .await
        .unwrap();
        close_round_to_active(tx.as_mut(), request.id).await.unwrap();
        let newer = handle_create_change_request(
            &open_on(reviewer, request.id, "name"),
            Registry::standard(),
            &clock(),
            tx.as_mut(),
        )
        .await
        .unwrap();

        // Act
        close_round_to_active(tx.as_mut(), request.id).await.unwrap();
        tx.commit().await.unwrap();

        // Assert
        let active = store.change_requests(ChangeRequestShape::Active);
        let past = store.change_requests(ChangeRequestShape::Past);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, newer.id);
        assert_eq!(past.len(), 1);
        assert_eq!(past[0].id, older.id);
    }
}
