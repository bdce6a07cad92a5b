//! Loading and history helpers shared by the handlers.

use mudgate_core::error::DomainError;
use mudgate_core::event::DomainEvent;
use mudgate_core::model::{Field, FieldType, Request, RequestStatus};
use mudgate_core::repository::{HistoryEntry, RequestTransaction};
use tracing::debug;
use uuid::Uuid;

use crate::domain::events::RequestEvent;
use crate::domain::field_map::FieldMap;
use crate::domain::registry::RequestDefinition;

pub(crate) fn to_history_entry(event: &RequestEvent) -> HistoryEntry {
    let meta = event.metadata();
    HistoryEntry {
        event_id: meta.event_id,
        request_id: meta.request_id,
        event_type: event.event_type().to_owned(),
        payload: event.to_payload(),
        actor_id: meta.actor_id,
        correlation_id: meta.correlation_id,
        occurred_at: meta.occurred_at,
    }
}

/// Appends `events` to their requests' history.
pub(crate) async fn record(
    tx: &mut dyn RequestTransaction,
    events: &[RequestEvent],
) -> Result<(), DomainError> {
    let entries: Vec<HistoryEntry> = events.iter().map(to_history_entry).collect();
    tx.append_history(&entries).await
}

/// Loads and locks a request.
pub(crate) async fn load_request(
    tx: &mut dyn RequestTransaction,
    request_id: Uuid,
) -> Result<Request, DomainError> {
    tx.load_request(request_id)
        .await?
        .ok_or_else(|| DomainError::not_found("request", request_id))
}

/// Loads a request for reading, without locking it.
pub(crate) async fn find_request(
    tx: &mut dyn RequestTransaction,
    request_id: Uuid,
) -> Result<Request, DomainError> {
    tx.find_request(request_id)
        .await?
        .ok_or_else(|| DomainError::not_found("request", request_id))
}

/// Loads every field of a request, checked against its definition.
pub(crate) async fn load_field_map(
    tx: &mut dyn RequestTransaction,
    definition: &RequestDefinition,
    request_id: Uuid,
) -> Result<FieldMap, DomainError> {
    let fields = tx.list_fields(request_id).await?;
    FieldMap::new(definition, fields)
}

/// Loads one field of a request. Every registered field exists from the
/// moment the request is created, so a miss is an integrity failure.
pub(crate) async fn load_field(
    tx: &mut dyn RequestTransaction,
    request_id: Uuid,
    field_type: FieldType,
) -> Result<Field, DomainError> {
    tx.list_fields(request_id)
        .await?
        .into_iter()
        .find(|f| f.field_type == field_type)
        .ok_or_else(|| {
            DomainError::Internal(format!("request {request_id} has no {field_type} field"))
        })
}

/// Whether `actor_id` may write field and subfield values: the owner, while
/// the request is being drafted or revised.
#[must_use]
pub fn is_editable(actor_id: Uuid, request: &Request) -> bool {
    request.is_owner(actor_id) && request.status.is_drafting()
}

pub(crate) fn ensure_editable(actor_id: Uuid, request: &Request) -> Result<(), DomainError> {
    if is_editable(actor_id, request) {
        Ok(())
    } else {
        debug!(request_id = %request.id, %actor_id, status = %request.status, "edit refused");
        Err(DomainError::Forbidden(format!(
            "request {} is not editable by {actor_id}",
            request.id
        )))
    }
}

/// Reviewer-only actions: the actor must be the assigned reviewer of an
/// `InReview` request and must not own it.
pub(crate) fn ensure_reviewing(
    actor_id: Uuid,
    request: &Request,
    action: &str,
) -> Result<(), DomainError> {
    if request.status == RequestStatus::InReview
        && request.is_reviewer(actor_id)
        && !request.is_owner(actor_id)
    {
        Ok(())
    } else {
        debug!(
            request_id = %request.id,
            %actor_id,
            status = %request.status,
            action,
            "review action refused"
        );
        Err(DomainError::Forbidden(format!(
            "{actor_id} may not {action} request {}",
            request.id
        )))
    }
}
