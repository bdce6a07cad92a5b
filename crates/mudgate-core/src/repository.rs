//! Transactional repository abstraction.
//!
//! A [`RequestStore`] hands out [`RequestTransaction`]s. Every engine
//! operation runs inside one caller-opened transaction and is sequential
//! within it; the caller commits on success and rolls back on any error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::model::{
    ChangeRequest, ChangeRequestShape, Comment, Field, FieldType, Request, RequestStatus, Subfield,
};

/// Stored representation of a request history event.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Request this entry belongs to.
    pub request_id: Uuid,
    /// Event type name.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Player whose command produced the entry.
    pub actor_id: Uuid,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Timestamp of the event.
    pub occurred_at: DateTime<Utc>,
}

/// Factory for transactions against the relational store.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Opens a new transaction.
    async fn begin(&self) -> Result<Box<dyn RequestTransaction>, DomainError>;
}

/// An open transaction. Reads see the transaction's own writes; nothing is
/// visible to other transactions until [`RequestTransaction::commit`].
#[async_trait]
pub trait RequestTransaction: Send {
    // --- requests ---

    /// Inserts a new request row.
    async fn insert_request(&mut self, request: &Request) -> Result<(), DomainError>;

    /// Loads a request and locks its row until the transaction ends.
    async fn load_request(&mut self, request_id: Uuid) -> Result<Option<Request>, DomainError>;

    /// Loads a request without locking it. For read-only queries.
    async fn find_request(&mut self, request_id: Uuid) -> Result<Option<Request>, DomainError>;

    /// Writes status, reviewer, version and `updated_at` if the stored
    /// version still equals `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` on a version mismatch and
    /// `DomainError::NotFound` if the row is gone.
    async fn update_request(
        &mut self,
        request: &Request,
        expected_version: i64,
    ) -> Result<(), DomainError>;

    /// Lists requests created by `owner_id`, oldest first.
    async fn list_requests_for_owner(&mut self, owner_id: Uuid)
    -> Result<Vec<Request>, DomainError>;

    /// Lists requests in any of `statuses`, oldest first.
    async fn list_requests_with_status(
        &mut self,
        statuses: &[RequestStatus],
    ) -> Result<Vec<Request>, DomainError>;

    // --- fields ---

    /// Inserts a new field row.
    async fn insert_field(&mut self, field: &Field) -> Result<(), DomainError>;

    /// Loads a single field.
    async fn load_field(&mut self, field_id: Uuid) -> Result<Option<Field>, DomainError>;

    /// Lists every field of a request.
    async fn list_fields(&mut self, request_id: Uuid) -> Result<Vec<Field>, DomainError>;

    /// Writes a field's value and status.
    async fn update_field(&mut self, field: &Field) -> Result<(), DomainError>;

    // --- subfields ---

    /// Inserts a new subfield row.
    async fn insert_subfield(&mut self, subfield: &Subfield) -> Result<(), DomainError>;

    /// Loads a single subfield.
    async fn load_subfield(&mut self, subfield_id: Uuid) -> Result<Option<Subfield>, DomainError>;

    /// Lists a field's subfields in insertion order.
    async fn list_subfields(&mut self, field_id: Uuid) -> Result<Vec<Subfield>, DomainError>;

    /// Writes a subfield's value.
    async fn update_subfield(&mut self, subfield: &Subfield) -> Result<(), DomainError>;

    /// Deletes a subfield.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if no subfield has the id.
    async fn delete_subfield(&mut self, subfield_id: Uuid) -> Result<(), DomainError>;

    // --- change requests ---

    /// Inserts a change request into the set for `shape`.
    async fn insert_change_request(
        &mut self,
        shape: ChangeRequestShape,
        change_request: &ChangeRequest,
    ) -> Result<(), DomainError>;

    /// Loads a change request from the set for `shape`.
    async fn load_change_request(
        &mut self,
        shape: ChangeRequestShape,
        change_request_id: Uuid,
    ) -> Result<Option<ChangeRequest>, DomainError>;

    /// Lists the change requests of `shape` for one field, oldest first.
    async fn list_change_requests_for_field(
        &mut self,
        shape: ChangeRequestShape,
        field_id: Uuid,
    ) -> Result<Vec<ChangeRequest>, DomainError>;

    /// Lists the change requests of `shape` for a whole request, oldest first.
    async fn list_change_requests(
        &mut self,
        shape: ChangeRequestShape,
        request_id: Uuid,
    ) -> Result<Vec<ChangeRequest>, DomainError>;

    /// Writes a change request's text and `updated_at`.
    async fn update_change_request(
        &mut self,
        shape: ChangeRequestShape,
        change_request: &ChangeRequest,
    ) -> Result<(), DomainError>;

    /// Deletes a change request from the set for `shape`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the set has no such change request.
    async fn delete_change_request(
        &mut self,
        shape: ChangeRequestShape,
        change_request_id: Uuid,
    ) -> Result<(), DomainError>;

    // --- comments ---

    /// Inserts a new comment.
    async fn insert_comment(&mut self, comment: &Comment) -> Result<(), DomainError>;

    /// Loads a single comment.
    async fn load_comment(&mut self, comment_id: Uuid) -> Result<Option<Comment>, DomainError>;

    /// Lists every comment on one field of a request, across all versions,
    /// oldest first.
    async fn list_comments(
        &mut self,
        request_id: Uuid,
        field_type: FieldType,
    ) -> Result<Vec<Comment>, DomainError>;

    // --- history ---

    /// Appends history entries.
    async fn append_history(&mut self, entries: &[HistoryEntry]) -> Result<(), DomainError>;

    /// Lists a request's history in insertion order.
    async fn list_history(&mut self, request_id: Uuid) -> Result<Vec<HistoryEntry>, DomainError>;

    // --- lifecycle ---

    /// Commits every write made through this transaction.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    /// Discards every write made through this transaction.
    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}
