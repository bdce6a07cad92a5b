//! Test stores — in-memory `RequestStore` implementations for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mudgate_core::error::DomainError;
use mudgate_core::model::{
    ChangeRequest, ChangeRequestShape, Comment, Field, FieldType, Request, RequestStatus, Subfield,
};
use mudgate_core::repository::{HistoryEntry, RequestStore, RequestTransaction};
use uuid::Uuid;

/// Every table of the store, in insertion order.
#[derive(Debug, Default, Clone)]
struct Tables {
    requests: Vec<Request>,
    fields: Vec<Field>,
    subfields: Vec<Subfield>,
    open: Vec<ChangeRequest>,
    active: Vec<ChangeRequest>,
    past: Vec<ChangeRequest>,
    comments: Vec<Comment>,
    history: Vec<HistoryEntry>,
}

impl Tables {
    fn change_requests(&self, shape: ChangeRequestShape) -> &Vec<ChangeRequest> {
        match shape {
            ChangeRequestShape::Open => &self.open,
            ChangeRequestShape::Active => &self.active,
            ChangeRequestShape::Past => &self.past,
        }
    }

    fn change_requests_mut(&mut self, shape: ChangeRequestShape) -> &mut Vec<ChangeRequest> {
        match shape {
            ChangeRequestShape::Open => &mut self.open,
            ChangeRequestShape::Active => &mut self.active,
            ChangeRequestShape::Past => &mut self.past,
        }
    }
}

/// A store that keeps every table in memory.
///
/// Each transaction works on a private copy of the tables; `commit`
/// publishes the copy and `rollback` (or dropping the transaction) discards
/// it. Concurrent transactions are last-writer-wins. Row locks are not
/// enforced, only recorded.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRequestStore {
    tables: Arc<Mutex<Tables>>,
    locks: Arc<Mutex<Vec<Uuid>>>,
}

impl InMemoryRequestStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every committed request.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requests(&self) -> Vec<Request> {
        self.tables.lock().unwrap().requests.clone()
    }

    /// Returns the committed change requests of `shape`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn change_requests(&self, shape: ChangeRequestShape) -> Vec<ChangeRequest> {
        self.tables.lock().unwrap().change_requests(shape).clone()
    }

    /// Returns every committed history entry.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.tables.lock().unwrap().history.clone()
    }

    /// Returns the id of every request loaded for update so far, committed
    /// or not, in load order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn locked_requests(&self) -> Vec<Uuid> {
        self.locks.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn begin(&self) -> Result<Box<dyn RequestTransaction>, DomainError> {
        let working = self.tables.lock().unwrap().clone();
        Ok(Box::new(InMemoryTransaction {
            working,
            target: Arc::clone(&self.tables),
            locks: Arc::clone(&self.locks),
        }))
    }
}

/// A transaction over an [`InMemoryRequestStore`].
#[derive(Debug)]
struct InMemoryTransaction {
    working: Tables,
    target: Arc<Mutex<Tables>>,
    locks: Arc<Mutex<Vec<Uuid>>>,
}

#[async_trait]
impl RequestTransaction for InMemoryTransaction {
    async fn insert_request(&mut self, request: &Request) -> Result<(), DomainError> {
        if self.working.requests.iter().any(|r| r.id == request.id) {
            return Err(DomainError::Internal(format!(
                "duplicate request id {}",
                request.id
            )));
        }
        self.working.requests.push(request.clone());
        Ok(())
    }

    async fn load_request(&mut self, request_id: Uuid) -> Result<Option<Request>, DomainError> {
        self.locks.lock().unwrap().push(request_id);
        self.find_request(request_id).await
    }

    async fn find_request(&mut self, request_id: Uuid) -> Result<Option<Request>, DomainError> {
        Ok(self
            .working
            .requests
            .iter()
            .find(|r| r.id == request_id)
            .cloned())
    }

    async fn update_request(
        &mut self,
        request: &Request,
        expected_version: i64,
    ) -> Result<(), DomainError> {
        let stored = self
            .working
            .requests
            .iter_mut()
            .find(|r| r.id == request.id)
            .ok_or_else(|| DomainError::not_found("request", request.id))?;
        if stored.version != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                request_id: request.id,
                expected: expected_version,
                actual: stored.version,
            });
        }
        *stored = request.clone();
        Ok(())
    }

    async fn list_requests_for_owner(
        &mut self,
        owner_id: Uuid,
    ) -> Result<Vec<Request>, DomainError> {
        Ok(self
            .working
            .requests
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn list_requests_with_status(
        &mut self,
        statuses: &[RequestStatus],
    ) -> Result<Vec<Request>, DomainError> {
        Ok(self
            .working
            .requests
            .iter()
            .filter(|r| statuses.contains(&r.status))
            .cloned()
            .collect())
    }

    async fn insert_field(&mut self, field: &Field) -> Result<(), DomainError> {
        self.working.fields.push(field.clone());
        Ok(())
    }

    async fn load_field(&mut self, field_id: Uuid) -> Result<Option<Field>, DomainError> {
        Ok(self
            .working
            .fields
            .iter()
            .find(|f| f.id == field_id)
            .cloned())
    }

    async fn list_fields(&mut self, request_id: Uuid) -> Result<Vec<Field>, DomainError> {
        Ok(self
            .working
            .fields
            .iter()
            .filter(|f| f.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn update_field(&mut self, field: &Field) -> Result<(), DomainError> {
        let stored = self
            .working
            .fields
            .iter_mut()
            .find(|f| f.id == field.id)
            .ok_or_else(|| DomainError::not_found("field", field.id))?;
        stored.value.clone_from(&field.value);
        stored.status = field.status;
        Ok(())
    }

    async fn insert_subfield(&mut self, subfield: &Subfield) -> Result<(), DomainError> {
        self.working.subfields.push(subfield.clone());
        Ok(())
    }

    async fn load_subfield(&mut self, subfield_id: Uuid) -> Result<Option<Subfield>, DomainError> {
        Ok(self
            .working
            .subfields
            .iter()
            .find(|s| s.id == subfield_id)
            .cloned())
    }

    async fn list_subfields(&mut self, field_id: Uuid) -> Result<Vec<Subfield>, DomainError> {
        let mut subfields: Vec<Subfield> = self
            .working
            .subfields
            .iter()
            .filter(|s| s.field_id == field_id)
            .cloned()
            .collect();
        subfields.sort_by_key(|s| s.position);
        Ok(subfields)
    }

    async fn update_subfield(&mut self, subfield: &Subfield) -> Result<(), DomainError> {
        let stored = self
            .working
            .subfields
            .iter_mut()
            .find(|s| s.id == subfield.id)
            .ok_or_else(|| DomainError::not_found("subfield", subfield.id))?;
        stored.value.clone_from(&subfield.value);
        Ok(())
    }

    async fn delete_subfield(&mut self, subfield_id: Uuid) -> Result<(), DomainError> {
        let before = self.working.subfields.len();
        self.working.subfields.retain(|s| s.id != subfield_id);
        if self.working.subfields.len() == before {
            return Err(DomainError::not_found("subfield", subfield_id));
        }
        Ok(())
    }

    async fn insert_change_request(
        &mut self,
        shape: ChangeRequestShape,
        change_request: &ChangeRequest,
    ) -> Result<(), DomainError> {
        let set = self.working.change_requests_mut(shape);
        if set.iter().any(|c| c.id == change_request.id) {
            return Err(DomainError::Internal(format!(
                "duplicate {shape} change request id {}",
                change_request.id
            )));
        }
        set.push(change_request.clone());
        Ok(())
    }

    async fn load_change_request(
        &mut self,
        shape: ChangeRequestShape,
        change_request_id: Uuid,
    ) -> Result<Option<ChangeRequest>, DomainError> {
        Ok(self
            .working
            .change_requests(shape)
            .iter()
            .find(|c| c.id == change_request_id)
            .cloned())
    }

    async fn list_change_requests_for_field(
        &mut self,
        shape: ChangeRequestShape,
        field_id: Uuid,
    ) -> Result<Vec<ChangeRequest>, DomainError> {
        Ok(self
            .working
            .change_requests(shape)
            .iter()
            .filter(|c| c.field_id == field_id)
            .cloned()
            .collect())
    }

    async fn list_change_requests(
        &mut self,
        shape: ChangeRequestShape,
        request_id: Uuid,
    ) -> Result<Vec<ChangeRequest>, DomainError> {
        Ok(self
            .working
            .change_requests(shape)
            .iter()
            .filter(|c| c.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn update_change_request(
        &mut self,
        shape: ChangeRequestShape,
        change_request: &ChangeRequest,
    ) -> Result<(), DomainError> {
        let stored = self
            .working
            .change_requests_mut(shape)
            .iter_mut()
            .find(|c| c.id == change_request.id)
            .ok_or_else(|| DomainError::not_found("change request", change_request.id))?;
        stored.text.clone_from(&change_request.text);
        stored.updated_at = change_request.updated_at;
        Ok(())
    }

    async fn delete_change_request(
        &mut self,
        shape: ChangeRequestShape,
        change_request_id: Uuid,
    ) -> Result<(), DomainError> {
        let set = self.working.change_requests_mut(shape);
        let before = set.len();
        set.retain(|c| c.id != change_request_id);
        if set.len() == before {
            return Err(DomainError::not_found("change request", change_request_id));
        }
        Ok(())
    }

    async fn insert_comment(&mut self, comment: &Comment) -> Result<(), DomainError> {
        self.working.comments.push(comment.clone());
        Ok(())
    }

    async fn load_comment(&mut self, comment_id: Uuid) -> Result<Option<Comment>, DomainError> {
        Ok(self
            .working
            .comments
            .iter()
            .find(|c| c.id == comment_id)
            .cloned())
    }

    async fn list_comments(
        &mut self,
        request_id: Uuid,
        field_type: FieldType,
    ) -> Result<Vec<Comment>, DomainError> {
        Ok(self
            .working
            .comments
            .iter()
            .filter(|c| c.request_id == request_id && c.field_type == field_type)
            .cloned()
            .collect())
    }

    async fn append_history(&mut self, entries: &[HistoryEntry]) -> Result<(), DomainError> {
        self.working.history.extend_from_slice(entries);
        Ok(())
    }

    async fn list_history(&mut self, request_id: Uuid) -> Result<Vec<HistoryEntry>, DomainError> {
        Ok(self
            .working
            .history
            .iter()
            .filter(|h| h.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let Self { working, target, .. } = *self;
        *target.lock().unwrap() = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        Ok(())
    }
}

/// A store that cannot open transactions. Useful for testing error-handling
/// paths.
#[derive(Debug)]
pub struct FailingRequestStore;

#[async_trait]
impl RequestStore for FailingRequestStore {
    async fn begin(&self) -> Result<Box<dyn RequestTransaction>, DomainError> {
        Err(DomainError::Internal("connection refused".into()))
    }
}
