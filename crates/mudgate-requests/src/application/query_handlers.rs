//! Query handlers for the Request Review context.
//!
//! Read-only views assembled from the relational rows of a request.

use chrono::{DateTime, Utc};
use mudgate_core::error::DomainError;
use mudgate_core::model::{
    ChangeRequest, ChangeRequestShape, FieldStatus, FieldType, Request, RequestStatus,
    RequestType, Subfield,
};
use mudgate_core::permission::PermissionChecker;
use mudgate_core::repository::{HistoryEntry, RequestTransaction};
use serde::Serialize;
use uuid::Uuid;

use crate::application::support::{find_request, is_editable, load_field_map};
use crate::domain::navigation::{
    NextField, next_field_with_active_change_request, next_incomplete_field,
    next_unreviewed_field,
};
use crate::domain::registry::Registry;

/// Read-only view of one field.
#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    /// Field type token.
    pub field_type: FieldType,
    /// Human-readable label.
    pub label: &'static str,
    /// Guidance shown to the owner.
    pub description: &'static str,
    /// Current value.
    pub value: String,
    /// Review status.
    pub status: FieldStatus,
    /// Whether the viewer may change the value.
    pub editable: bool,
    /// Change request written this review round, if any.
    pub open_change_request: Option<ChangeRequest>,
    /// Outstanding change request from an earlier round, if any.
    pub active_change_request: Option<ChangeRequest>,
    /// List items, for list-valued fields.
    pub subfields: Vec<Subfield>,
}

/// Read-only view of a request with all of its fields.
#[derive(Debug, Clone, Serialize)]
pub struct RequestOverview {
    /// The request identifier.
    pub request_id: Uuid,
    /// Kind of request.
    pub request_type: RequestType,
    /// Display title.
    pub title: String,
    /// Lifecycle status.
    pub status: RequestStatus,
    /// Revision counter.
    pub version: i64,
    /// The owning player.
    pub owner_id: Uuid,
    /// Assigned reviewer, if any.
    pub reviewer_id: Option<Uuid>,
    /// Fields in presentation order.
    pub fields: Vec<FieldView>,
}

/// One line of a request listing.
#[derive(Debug, Clone, Serialize)]
pub struct RequestSummary {
    /// The request identifier.
    pub request_id: Uuid,
    /// Kind of request.
    pub request_type: RequestType,
    /// Display title.
    pub title: String,
    /// Lifecycle status.
    pub status: RequestStatus,
    /// The owning player.
    pub owner_id: Uuid,
    /// Assigned reviewer, if any.
    pub reviewer_id: Option<Uuid>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Where a viewer should pick up work on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NextStep {
    /// The owner should fill in this field.
    EditField {
        /// Field to present.
        field_type: FieldType,
        /// Whether it is the last field.
        is_last: bool,
    },
    /// The owner should address the active change request on this field.
    ReviseField {
        /// Field to present.
        field_type: FieldType,
        /// Whether it is the last field.
        is_last: bool,
    },
    /// The reviewer should decide on this field.
    ReviewField {
        /// Field to present.
        field_type: FieldType,
        /// Whether it is the last field.
        is_last: bool,
    },
    /// Nothing pending for the viewer; show the overview.
    Overview,
}

async fn summarize(
    tx: &mut dyn RequestTransaction,
    registry: &Registry,
    request: Request,
) -> Result<RequestSummary, DomainError> {
    let definition = registry.definition(request.request_type)?;
    let fields = load_field_map(tx, definition, request.id).await?;
    Ok(RequestSummary {
        request_id: request.id,
        request_type: request.request_type,
        title: definition.title(&fields),
        status: request.status,
        owner_id: request.owner_id,
        reviewer_id: request.reviewer_id,
        updated_at: request.updated_at,
    })
}

/// Retrieves a request with every field, as seen by `viewer_id`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request does not exist and
/// `DomainError::Internal` if its fields are inconsistent.
pub async fn get_request_overview(
    request_id: Uuid,
    viewer_id: Uuid,
    registry: &Registry,
    tx: &mut dyn RequestTransaction,
) -> Result<RequestOverview, DomainError> {
    let request = find_request(tx, request_id).await?;
    let definition = registry.definition(request.request_type)?;
    let fields = load_field_map(tx, definition, request.id).await?;
    let open = tx
        .list_change_requests(ChangeRequestShape::Open, request.id)
        .await?;
    let active = tx
        .list_change_requests(ChangeRequestShape::Active, request.id)
        .await?;
    let editable = is_editable(viewer_id, &request);

    let mut views = Vec::with_capacity(fields.len());
    for field_definition in definition.fields() {
        let Some(field) = fields.get(field_definition.field_type) else {
            continue;
        };
        let subfields = if field_definition.is_list() {
            tx.list_subfields(field.id).await?
        } else {
            Vec::new()
        };
        views.push(FieldView {
            field_type: field.field_type,
            label: field_definition.label,
            description: field_definition.description,
            value: field.value.clone(),
            status: field.status,
            editable,
            open_change_request: open.iter().find(|cr| cr.field_id == field.id).cloned(),
            active_change_request: active.iter().find(|cr| cr.field_id == field.id).cloned(),
            subfields,
        });
    }

    Ok(RequestOverview {
        request_id: request.id,
        request_type: request.request_type,
        title: definition.title(&fields),
        status: request.status,
        version: request.version,
        owner_id: request.owner_id,
        reviewer_id: request.reviewer_id,
        fields: views,
    })
}

/// Decides where `viewer_id` should resume work on a request: the owner's
/// next empty field while drafting, the next field with an unaddressed
/// change request while revising, or the assigned reviewer's next
/// undecided field.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request does not exist and
/// `DomainError::Internal` if its fields are inconsistent.
pub async fn resume_request(
    request_id: Uuid,
    viewer_id: Uuid,
    registry: &Registry,
    tx: &mut dyn RequestTransaction,
) -> Result<NextStep, DomainError> {
    let request = find_request(tx, request_id).await?;
    let definition = registry.definition(request.request_type)?;
    let fields = load_field_map(tx, definition, request.id).await?;

    let next = match request.status {
        RequestStatus::Incomplete if request.is_owner(viewer_id) => {
            match next_incomplete_field(definition, &fields) {
                Ok(NextField { field, is_last }) => NextStep::EditField {
                    field_type: field.field_type,
                    is_last,
                },
                Err(DomainError::NoIncompleteFields) => NextStep::Overview,
                Err(e) => return Err(e),
            }
        }
        RequestStatus::Reviewed if request.is_owner(viewer_id) => {
            let active = tx
                .list_change_requests(ChangeRequestShape::Active, request.id)
                .await?;
            next_field_with_active_change_request(definition, &fields, &active)
                .map_or(NextStep::Overview, |NextField { field, is_last }| {
                    NextStep::ReviseField {
                        field_type: field.field_type,
                        is_last,
                    }
                })
        }
        RequestStatus::InReview
            if request.is_reviewer(viewer_id) && !request.is_owner(viewer_id) =>
        {
            match next_unreviewed_field(definition, &fields) {
                Ok(NextField { field, is_last }) => NextStep::ReviewField {
                    field_type: field.field_type,
                    is_last,
                },
                Err(DomainError::NoUnreviewedFields) => NextStep::Overview,
                Err(e) => return Err(e),
            }
        }
        _ => NextStep::Overview,
    };
    Ok(next)
}

/// Lists the requests owned by `owner_id`, oldest first.
///
/// # Errors
///
/// Returns `DomainError` if a storage operation fails or a request's fields
/// are inconsistent.
pub async fn list_requests_for_owner(
    owner_id: Uuid,
    registry: &Registry,
    tx: &mut dyn RequestTransaction,
) -> Result<Vec<RequestSummary>, DomainError> {
    let requests = tx.list_requests_for_owner(owner_id).await?;
    let mut summaries = Vec::with_capacity(requests.len());
    for request in requests {
        summaries.push(summarize(tx, registry, request).await?);
    }
    Ok(summaries)
}

/// Lists the `Submitted` and `InReview` requests `reviewer_id` may review:
/// those of types whose review permission the reviewer holds, excluding the
/// reviewer's own.
///
/// # Errors
///
/// Returns `DomainError::Forbidden` if the reviewer holds no review
/// permission at all.
pub async fn list_review_queue(
    reviewer_id: Uuid,
    registry: &Registry,
    permissions: &dyn PermissionChecker,
    tx: &mut dyn RequestTransaction,
) -> Result<Vec<RequestSummary>, DomainError> {
    let reviewable: Vec<RequestType> = registry
        .definitions()
        .filter(|d| permissions.has_permission(reviewer_id, d.review_permission))
        .map(|d| d.request_type)
        .collect();
    if reviewable.is_empty() {
        return Err(DomainError::Forbidden(format!(
            "{reviewer_id} may not review requests"
        )));
    }

    let requests = tx
        .list_requests_with_status(&[RequestStatus::Submitted, RequestStatus::InReview])
        .await?;
    let mut summaries = Vec::new();
    for request in requests {
        if reviewable.contains(&request.request_type) && !request.is_owner(reviewer_id) {
            summaries.push(summarize(tx, registry, request).await?);
        }
    }
    Ok(summaries)
}

/// Lists a request's history entries in the order they were recorded.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request does not exist.
pub async fn list_request_history(
    request_id: Uuid,
    tx: &mut dyn RequestTransaction,
) -> Result<Vec<HistoryEntry>, DomainError> {
    let request = find_request(tx, request_id).await?;
    tx.list_history(request.id).await
}

#[cfg(test)]
mod tests {
    use mudgate_core::error::DomainError;
    use mudgate_core::model::{ChangeRequest, ChangeRequestShape, FieldType, RequestStatus};
    use mudgate_core::repository::RequestStore;
    use mudgate_test_support::{InMemoryRequestStore, StaticPermissions};
    use uuid::Uuid;

    use crate::application::fixtures::{fixed_now, load_field, seed_request};
    use crate::application::query_handlers::{
        NextStep, get_request_overview, list_request_history, list_requests_for_owner,
        list_review_queue, resume_request,
    };
    use crate::domain::registry::{REVIEW_CHARACTER_APPLICATIONS, Registry};

    #[tokio::test]
    async fn test_get_request_overview_lists_fields_in_order() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let owner = Uuid::new_v4();
        let request = seed_request(&store, RequestStatus::Incomplete, owner, None, true).await;

        // Act
        let mut tx = store.begin().await.unwrap();
        let overview = get_request_overview(request.id, owner, Registry::standard(), tx.as_mut())
            .await
            .unwrap();

        // Assert
        assert_eq!(overview.title, "Character Application (Testify)");
        let order: Vec<FieldType> = overview.fields.iter().map(|f| f.field_type).collect();
        assert_eq!(order, FieldType::ALL.to_vec());
        assert!(overview.fields.iter().all(|f| f.editable));
        let keywords = overview.fields.last().unwrap();
        assert_eq!(keywords.subfields.len(), 2);
        assert_eq!(keywords.label, "Keywords");
    }

    #[tokio::test]
    async fn test_queries_do_not_lock_the_request() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let owner = Uuid::new_v4();
        let request = seed_request(&store, RequestStatus::Incomplete, owner, None, true).await;
        let locks_before = store.locked_requests();

        // Act
        let mut tx = store.begin().await.unwrap();
        get_request_overview(request.id, owner, Registry::standard(), tx.as_mut())
            .await
            .unwrap();
        resume_request(request.id, owner, Registry::standard(), tx.as_mut())
            .await
            .unwrap();
        list_request_history(request.id, tx.as_mut()).await.unwrap();
        tx.rollback().await.unwrap();

        // Assert
        assert_eq!(store.locked_requests(), locks_before);
    }

    #[tokio::test]
    async fn test_get_request_overview_is_read_only_for_others() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let request =
            seed_request(&store, RequestStatus::Incomplete, Uuid::new_v4(), None, false).await;

        // Act
        let mut tx = store.begin().await.unwrap();
        let overview =
            get_request_overview(request.id, Uuid::new_v4(), Registry::standard(), tx.as_mut())
                .await
                .unwrap();

        // Assert
        assert_eq!(overview.title, "Character Application (Unnamed)");
        assert!(overview.fields.iter().all(|f| !f.editable));
    }

    #[tokio::test]
    async fn test_get_request_overview_missing_request_is_not_found() {
        // Arrange
        let store = InMemoryRequestStore::new();

        // Act
        let mut tx = store.begin().await.unwrap();
        let result =
            get_request_overview(Uuid::new_v4(), Uuid::new_v4(), Registry::standard(), tx.as_mut())
                .await;

        // Assert
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_resume_request_for_drafting_owner() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let owner = Uuid::new_v4();
        let empty = seed_request(&store, RequestStatus::Incomplete, owner, None, false).await;
        let complete = seed_request(&store, RequestStatus::Incomplete, owner, None, true).await;

        // Act
        let mut tx = store.begin().await.unwrap();
        let first = resume_request(empty.id, owner, Registry::standard(), tx.as_mut())
            .await
            .unwrap();
        let done = resume_request(complete.id, owner, Registry::standard(), tx.as_mut())
            .await
            .unwrap();

        // Assert
        assert_eq!(
            first,
            NextStep::EditField {
                field_type: FieldType::Name,
                is_last: false
            }
        );
        assert_eq!(done, NextStep::Overview);
    }

    #[tokio::test]
    async fn test_resume_request_for_assigned_reviewer() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let reviewer = Uuid::new_v4();
        let request =
            seed_request(&store, RequestStatus::InReview, Uuid::new_v4(), Some(reviewer), true)
                .await;

        // Act
        let mut tx = store.begin().await.unwrap();
        let step = resume_request(request.id, reviewer, Registry::standard(), tx.as_mut())
            .await
            .unwrap();
        let stranger = resume_request(request.id, Uuid::new_v4(), Registry::standard(), tx.as_mut())
            .await
            .unwrap();

        // Assert
        assert_eq!(
            step,
            NextStep::ReviewField {
                field_type: FieldType::Name,
                is_last: false
            }
        );
        assert_eq!(stranger, NextStep::Overview);
    }

    #[tokio::test]
    async fn test_resume_request_for_revising_owner() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let owner = Uuid::new_v4();
        let reviewer = Uuid::new_v4();
        let request =
            seed_request(&store, RequestStatus::Reviewed, owner, Some(reviewer), true).await;
        let keywords = load_field(&store, request.id, FieldType::Keywords).await;
        let mut tx = store.begin().await.unwrap();
        tx.insert_change_request(
            ChangeRequestShape::Active,
            &ChangeRequest {
                id: Uuid::new_v4(),
                request_id: request.id,
                field_id: keywords.id,
                reviewer_id: reviewer,
                value: keywords.value.clone(),
                text: "Please add more keywords.".to_owned(),
                created_at: fixed_now(),
                updated_at: fixed_now(),
            },
        )
        .await
        .unwrap();

        // Act
        let step = resume_request(request.id, owner, Registry::standard(), tx.as_mut())
            .await
            .unwrap();

        // Assert
        assert_eq!(
            step,
            NextStep::ReviseField {
                field_type: FieldType::Keywords,
                is_last: true
            }
        );
    }

    #[tokio::test]
    async fn test_list_requests_for_owner() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let owner = Uuid::new_v4();
        seed_request(&store, RequestStatus::Incomplete, owner, None, true).await;
        seed_request(&store, RequestStatus::Canceled, owner, None, false).await;
        seed_request(&store, RequestStatus::Incomplete, Uuid::new_v4(), None, false).await;

        // Act
        let mut tx = store.begin().await.unwrap();
        let summaries = list_requests_for_owner(owner, Registry::standard(), tx.as_mut())
            .await
            .unwrap();

        // Assert
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].title, "Character Application (Testify)");
        assert_eq!(summaries[1].status, RequestStatus::Canceled);
    }

    #[tokio::test]
    async fn test_list_review_queue_requires_permission() {
        // Arrange
        let store = InMemoryRequestStore::new();
        let reviewer = Uuid::new_v4();
        let submitted =
            seed_request(&store, RequestStatus::Submitted, Uuid::new_v4(), None, true).await;
        seed_request(&store, RequestStatus::Ready, Uuid::new_v4(), None, true).await;
        seed_request(&store, RequestStatus::Submitted, reviewer, None, true).await;
        let permissions =
            StaticPermissions::new().grant(reviewer, REVIEW_CHARACTER_APPLICATIONS);

        // Act
        let mut tx = store.begin().await.unwrap();
        let queue = list_review_queue(reviewer, Registry::standard(), &permissions, tx.as_mut())
            .await
            .unwrap();
        let denied = list_review_queue(
            Uuid::new_v4(),
            Registry::standard(),
            &permissions,
            tx.as_mut(),
        )
        .await;

        // Assert
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].request_id, submitted.id);
        assert!(matches!(denied, Err(DomainError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_list_request_history_missing_request_is_not_found() {
        // Arrange
        let store = InMemoryRequestStore::new();

        // Act
        let mut tx = store.begin().await.unwrap();
        let result = list_request_history(Uuid::new_v4(), tx.as_mut()).await;

        // Assert
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }
}
