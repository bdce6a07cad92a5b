//! Request state machine rules.
//!
//! Pure decisions only: which transition an actor may take from a request's
//! current status. Persisting the change and its side effects is done by the
//! application layer.

use mudgate_core::error::DomainError;
use mudgate_core::model::{Request, RequestStatus};
use uuid::Uuid;

use crate::domain::field_map::FieldMap;

/// Facts about a request that the forward transition depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionFacts {
    /// Whether the actor holds the request type's review permission.
    pub can_review: bool,
    /// Whether any field still lacks a value.
    pub has_incomplete_fields: bool,
    /// Whether any field still awaits a review decision.
    pub has_unreviewed_fields: bool,
}

/// The forward edge an actor may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEdge {
    /// Move to a fixed status.
    To(RequestStatus),
    /// Take the request into review and assign the actor.
    PickUp,
    /// Close the review round; the outcome depends on field statuses and
    /// outstanding change requests.
    FinishReview,
    /// Put a revised request back in front of reviewers.
    Resubmit,
}

fn forbidden(request: &Request, action: &str) -> DomainError {
    DomainError::Forbidden(format!(
        "cannot {action} request {} in status {}",
        request.id, request.status
    ))
}

/// Decides the forward transition for `actor_id`.
///
/// # Errors
///
/// Returns `DomainError::Forbidden` when the actor lacks the role for the
/// current status, the request is not ready for the next step, or the
/// status has no forward transition.
pub fn next_status(
    request: &Request,
    actor_id: Uuid,
    facts: TransitionFacts,
) -> Result<StatusEdge, DomainError> {
    let is_owner = request.is_owner(actor_id);
    let complete = |edge: StatusEdge| {
        if facts.has_incomplete_fields {
            Err(DomainError::Forbidden(format!(
                "request {} still has incomplete fields",
                request.id
            )))
        } else {
            Ok(edge)
        }
    };
    match request.status {
        RequestStatus::Incomplete if is_owner => complete(StatusEdge::To(RequestStatus::Ready)),
        RequestStatus::Ready if is_owner => complete(StatusEdge::To(RequestStatus::Submitted)),
        RequestStatus::Submitted if !is_owner && facts.can_review => Ok(StatusEdge::PickUp),
        RequestStatus::InReview if request.is_reviewer(actor_id) && !is_owner => {
            if facts.has_unreviewed_fields {
                Err(DomainError::Forbidden(format!(
                    "request {} still has unreviewed fields",
                    request.id
                )))
            } else {
                Ok(StatusEdge::FinishReview)
            }
        }
        RequestStatus::Reviewed if is_owner => complete(StatusEdge::Resubmit),
        _ => Err(forbidden(request, "advance")),
    }
}

/// Outcome of a closed review round.
#[must_use]
pub fn review_outcome(fields: &FieldMap, active_change_requests: usize) -> RequestStatus {
    if fields.all_approved() && active_change_requests == 0 {
        RequestStatus::Approved
    } else {
        RequestStatus::Reviewed
    }
}

/// Whether `actor_id` may reject the request.
///
/// # Errors
///
/// Returns `DomainError::Forbidden` unless the request is `Submitted` and the
/// actor holds the review permission, or it is `InReview` and the actor is
/// the assigned reviewer. Owners never reject their own requests.
pub fn check_reject(
    request: &Request,
    actor_id: Uuid,
    can_review: bool,
) -> Result<(), DomainError> {
    let allowed = !request.is_owner(actor_id)
        && match request.status {
            RequestStatus::Submitted => can_review,
            RequestStatus::InReview => request.is_reviewer(actor_id),
            _ => false,
        };
    if allowed {
        Ok(())
    } else {
        Err(forbidden(request, "reject"))
    }
}

/// Whether `actor_id` may archive the request.
///
/// # Errors
///
/// Returns `DomainError::Forbidden` unless the request is `Rejected` and the
/// actor is its owner or holds the review permission.
pub fn check_archive(
    request: &Request,
    actor_id: Uuid,
    can_review: bool,
) -> Result<(), DomainError> {
    if request.status == RequestStatus::Rejected && (request.is_owner(actor_id) || can_review) {
        Ok(())
    } else {
        Err(forbidden(request, "archive"))
    }
}

/// Whether `actor_id` may cancel the request.
///
/// # Errors
///
/// Returns `DomainError::Forbidden` unless the actor owns the request and it
/// is neither terminal nor already archived.
pub fn check_cancel(request: &Request, actor_id: Uuid) -> Result<(), DomainError> {
    if request.is_owner(actor_id) && !request.status.is_terminal() {
        Ok(())
    } else {
        Err(forbidden(request, "cancel"))
    }
}

/// Whether `actor_id` may fulfill the request.
///
/// # Errors
///
/// Returns `DomainError::Forbidden` unless the request is `Approved` and the
/// actor is its owner or holds the review permission.
pub fn check_fulfill(
    request: &Request,
    actor_id: Uuid,
    can_review: bool,
) -> Result<(), DomainError> {
    if request.status == RequestStatus::Approved && (request.is_owner(actor_id) || can_review) {
        Ok(())
    } else {
        Err(forbidden(request, "fulfill"))
    }
}
