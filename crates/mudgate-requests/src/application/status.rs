//! Command handlers for request creation and status transitions.
//!
//! Every transition writes the request through a compare-and-swap on its
//! version and appends a `request.status_changed` history entry.

use mudgate_core::clock::Clock;
use mudgate_core::command::Command;
use mudgate_core::error::DomainError;
use mudgate_core::fulfillment::Fulfiller;
use mudgate_core::model::{ChangeRequestShape, Field, Request, RequestStatus};
use mudgate_core::permission::PermissionChecker;
use mudgate_core::repository::RequestTransaction;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::application::change_requests::close_round_to_active;
use crate::application::support::{load_field_map, load_request, record};
use crate::domain::commands::{
    AdvanceStatus, ArchiveRequest, CancelRequest, CreateRequest, FulfillRequest, RejectRequest,
};
use crate::domain::events::{
    RequestCreated, RequestEvent, RequestEventKind, ReviewRoundClosed, StatusChanged,
};
use crate::domain::registry::Registry;
use crate::domain::status::{
    StatusEdge, TransitionFacts, check_archive, check_cancel, check_fulfill, check_reject,
    next_status, review_outcome,
};

fn refused(err: &DomainError) {
    debug!(error = %err, "transition refused");
}

/// Writes `request` with status `to` and records the transition.
/// Returning to `Ready` from `Reviewed` starts a new revision, so the
/// version is bumped.
async fn commit_transition(
    tx: &mut dyn RequestTransaction,
    mut request: Request,
    to: RequestStatus,
    command: &dyn Command,
    clock: &dyn Clock,
    mut events: Vec<RequestEventKind>,
) -> Result<Request, DomainError> {
    let from = request.status;
    let expected_version = request.version;
    let now = clock.now();
    if from == RequestStatus::Reviewed && to == RequestStatus::Ready {
        request.version += 1;
    }
    request.status = to;
    request.updated_at = now;
    tx.update_request(&request, expected_version).await?;

    events.push(RequestEventKind::StatusChanged(StatusChanged {
        from,
        to,
        reviewer_id: request.reviewer_id,
        version: request.version,
    }));
    let events: Vec<RequestEvent> = events
        .into_iter()
        .map(|kind| {
            RequestEvent::new(
                request.id,
                command.actor_id(),
                command.correlation_id(),
                now,
                kind,
            )
        })
        .collect();
    record(tx, &events).await?;

    info!(
        request_id = %request.id,
        %from,
        %to,
        version = request.version,
        "request status changed"
    );
    Ok(request)
}

/// Closes the review round of an `InReview` request that is leaving review.
async fn close_round(
    tx: &mut dyn RequestTransaction,
    request: &Request,
) -> Result<Vec<RequestEventKind>, DomainError> {
    if request.status != RequestStatus::InReview {
        return Ok(Vec::new());
    }
    let activated = close_round_to_active(tx, request.id).await?;
    Ok(vec![RequestEventKind::ReviewRoundClosed(ReviewRoundClosed {
        activated,
    })])
}

/// Handles the `CreateRequest` command: opens an `Incomplete` request owned
/// by the actor, with one empty field per registered field type.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request type is not registered
/// and `DomainError::Forbidden` if the actor already has the maximum number
/// of open requests of that type.
#[instrument(skip_all, fields(request_type = %command.request_type, actor_id = %command.actor_id))]
pub async fn handle_create_request(
    command: &CreateRequest,
    registry: &Registry,
    clock: &dyn Clock,
    tx: &mut dyn RequestTransaction,
) -> Result<Request, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling create_request command");

    let definition = registry.definition(command.request_type)?;
    let open = tx
        .list_requests_for_owner(command.actor_id)
        .await?
        .into_iter()
        .filter(|r| r.request_type == command.request_type && r.status.is_open())
        .count();
    if open >= definition.max_open_per_owner {
        warn!(open, max = definition.max_open_per_owner, "open request limit reached");
        return Err(DomainError::Forbidden(format!(
            "already {open} open {} requests",
            command.request_type
        )));
    }

    let now = clock.now();
    let request = Request::new(Uuid::new_v4(), command.request_type, command.actor_id, now);
    tx.insert_request(&request).await?;
    for field_definition in definition.fields() {
        tx.insert_field(&Field::new(
            Uuid::new_v4(),
            request.id,
            field_definition.field_type,
        ))
        .await?;
    }
    record(
        tx,
        &[RequestEvent::new(
            request.id,
            command.actor_id,
            command.correlation_id,
            now,
            RequestEventKind::RequestCreated(RequestCreated {
                request_type: request.request_type,
                owner_id: request.owner_id,
            }),
        )],
    )
    .await?;
    info!(request_id = %request.id, "request created");

    Ok(request)
}

/// Handles the `AdvanceStatus` command: moves the request along its forward
/// path. Leaving `InReview` closes the review round and yields `Approved`
/// when every field is approved with no active change request, `Reviewed`
/// otherwise.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request does not exist,
/// `DomainError::Forbidden` if the actor may not take the request's next
/// step, `DomainError::ConcurrencyConflict` if the request changed
/// underneath, and `DomainError::Internal` if its fields are inconsistent.
#[instrument(skip_all, fields(request_id = %command.request_id, actor_id = %command.actor_id))]
pub async fn handle_advance_status(
    command: &AdvanceStatus,
    registry: &Registry,
    clock: &dyn Clock,
    permissions: &dyn PermissionChecker,
    tx: &mut dyn RequestTransaction,
) -> Result<Request, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling advance_status command");

    let mut request = load_request(tx, command.request_id).await?;
    let definition = registry.definition(request.request_type)?;
    let fields = load_field_map(tx, definition, request.id).await?;
    let facts = TransitionFacts {
        can_review: permissions.has_permission(command.actor_id, definition.review_permission),
        has_incomplete_fields: fields.has_incomplete(),
        has_unreviewed_fields: fields.has_unreviewed(),
    };

    match next_status(&request, command.actor_id, facts).inspect_err(refused)? {
        StatusEdge::To(to) => {
            commit_transition(tx, request, to, command, clock, Vec::new()).await
        }
        StatusEdge::PickUp => {
            request.reviewer_id = Some(command.actor_id);
            commit_transition(tx, request, RequestStatus::InReview, command, clock, Vec::new())
                .await
        }
        StatusEdge::FinishReview => {
            let events = close_round(tx, &request).await?;
            let active = tx
                .list_change_requests(ChangeRequestShape::Active, request.id)
                .await?
                .len();
            let outcome = review_outcome(&fields, active);
            commit_transition(tx, request, outcome, command, clock, events).await
        }
        StatusEdge::Resubmit => {
            commit_transition(tx, request, RequestStatus::Ready, command, clock, Vec::new())
                .await
        }
    }
}

/// Handles the `CancelRequest` command: the owner withdraws the request.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request does not exist and
/// `DomainError::Forbidden` if the actor is not the owner or the request is
/// already archived, canceled or fulfilled.
#[instrument(skip_all, fields(request_id = %command.request_id, actor_id = %command.actor_id))]
pub async fn handle_cancel_request(
    command: &CancelRequest,
    clock: &dyn Clock,
    tx: &mut dyn RequestTransaction,
) -> Result<Request, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling cancel_request command");

    let request = load_request(tx, command.request_id).await?;
    check_cancel(&request, command.actor_id).inspect_err(refused)?;
    let events = close_round(tx, &request).await?;
    commit_transition(tx, request, RequestStatus::Canceled, command, clock, events).await
}

/// Handles the `RejectRequest` command: a reviewer turns the request down.
/// Rejecting from `InReview` closes the review round first.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request does not exist and
/// `DomainError::Forbidden` unless the request is `Submitted` and the actor
/// holds the review permission, or `InReview` and the actor is the assigned
/// reviewer.
#[instrument(skip_all, fields(request_id = %command.request_id, actor_id = %command.actor_id))]
pub async fn handle_reject_request(
    command: &RejectRequest,
    registry: &Registry,
    clock: &dyn Clock,
    permissions: &dyn PermissionChecker,
    tx: &mut dyn RequestTransaction,
) -> Result<Request, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling reject_request command");

    let request = load_request(tx, command.request_id).await?;
    let definition = registry.definition(request.request_type)?;
    let can_review = permissions.has_permission(command.actor_id, definition.review_permission);
    check_reject(&request, command.actor_id, can_review).inspect_err(refused)?;
    let events = close_round(tx, &request).await?;
    commit_transition(tx, request, RequestStatus::Rejected, command, clock, events).await
}

/// Handles the `ArchiveRequest` command: files away a rejected request.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request does not exist and
/// `DomainError::Forbidden` unless it is `Rejected` and the actor is its
/// owner or holds the review permission.
#[instrument(skip_all, fields(request_id = %command.request_id, actor_id = %command.actor_id))]
pub async fn handle_archive_request(
    command: &ArchiveRequest,
    registry: &Registry,
    clock: &dyn Clock,
    permissions: &dyn PermissionChecker,
    tx: &mut dyn RequestTransaction,
) -> Result<Request, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling archive_request command");

    let request = load_request(tx, command.request_id).await?;
    let definition = registry.definition(request.request_type)?;
    let can_review = permissions.has_permission(command.actor_id, definition.review_permission);
    check_archive(&request, command.actor_id, can_review).inspect_err(refused)?;
    commit_transition(tx, request, RequestStatus::Archived, command, clock, Vec::new()).await
}

/// Handles the `FulfillRequest` command: runs the request type's fulfiller
/// and marks the request `Fulfilled`. A fulfiller failure is returned as is
/// and the request stays `Approved`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request does not exist,
/// `DomainError::Forbidden` unless it is `Approved` and the actor is its
/// owner or holds the review permission, and any error raised by the
/// fulfiller.
#[instrument(skip_all, fields(request_id = %command.request_id, actor_id = %command.actor_id))]
pub async fn handle_fulfill_request(
    command: &FulfillRequest,
    registry: &Registry,
    clock: &dyn Clock,
    permissions: &dyn PermissionChecker,
    fulfiller: &dyn Fulfiller,
    tx: &mut dyn RequestTransaction,
) -> Result<Request, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling fulfill_request command");

    let request = load_request(tx, command.request_id).await?;
    let definition = registry.definition(request.request_type)?;
    let can_review = permissions.has_permission(command.actor_id, definition.review_permission);
    check_fulfill(&request, command.actor_id, can_review).inspect_err(refused)?;

    fulfiller
        .fulfill(tx, &request)
        .await
        .inspect_err(|e| warn!(error = %e, "fulfillment failed"))?;
    commit_transition(tx, request, RequestStatus::Fulfilled, command, clock, Vec::new()).await
}
