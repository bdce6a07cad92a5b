//! Domain events for the Request Review context.
//!
//! Appended to the request's history; never replayed.

use chrono::{DateTime, Utc};
use mudgate_core::event::{DomainEvent, EventMetadata};
use mudgate_core::model::{RequestStatus, RequestType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Emitted when a request is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCreated {
    /// Kind of request.
    pub request_type: RequestType,
    /// The owning player.
    pub owner_id: Uuid,
}

/// Emitted on every status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    /// Status before the transition.
    pub from: RequestStatus,
    /// Status after the transition.
    pub to: RequestStatus,
    /// Assigned reviewer after the transition.
    pub reviewer_id: Option<Uuid>,
    /// Request version after the transition.
    pub version: i64,
}

/// Emitted when a review round's open change requests become active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRoundClosed {
    /// Number of change requests promoted to active.
    pub activated: usize,
}

/// Event payload variants for the Request Review context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestEventKind {
    /// A request has been opened.
    RequestCreated(RequestCreated),
    /// A request's status has changed.
    StatusChanged(StatusChanged),
    /// A review round has been closed.
    ReviewRoundClosed(ReviewRoundClosed),
}

impl RequestEventKind {
    /// Event type name recorded in history.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RequestCreated(_) => "request.created",
            Self::StatusChanged(_) => "request.status_changed",
            Self::ReviewRoundClosed(_) => "request.review_round_closed",
        }
    }
}

/// Domain event envelope for the Request Review context.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: RequestEventKind,
}

impl RequestEvent {
    /// Wraps `kind` in fresh metadata.
    #[must_use]
    pub fn new(
        request_id: Uuid,
        actor_id: Uuid,
        correlation_id: Uuid,
        occurred_at: DateTime<Utc>,
        kind: RequestEventKind,
    ) -> Self {
        Self {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                request_id,
                actor_id,
                correlation_id,
                occurred_at,
            },
            kind,
        }
    }
}

impl DomainEvent for RequestEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("RequestEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_changed_payload_names_both_statuses() {
        let event = RequestEvent::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Utc::now(),
            RequestEventKind::StatusChanged(StatusChanged {
                from: RequestStatus::Ready,
                to: RequestStatus::Submitted,
                reviewer_id: None,
                version: 1,
            }),
        );

        let payload = event.to_payload();

        assert_eq!(event.event_type(), "request.status_changed");
        assert_eq!(event.metadata().event_type, "request.status_changed");
        assert_eq!(payload["StatusChanged"]["from"], "Ready");
        assert_eq!(payload["StatusChanged"]["to"], "Submitted");
        let kind: RequestEventKind = serde_json::from_value(payload).unwrap();
        assert_eq!(kind, event.kind);
    }
}
