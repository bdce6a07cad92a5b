//! Test fulfillers — mock `Fulfiller` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use mudgate_core::error::DomainError;
use mudgate_core::fulfillment::Fulfiller;
use mudgate_core::model::Request;
use mudgate_core::repository::RequestTransaction;
use uuid::Uuid;

/// A fulfiller that records every request it is asked to fulfill and
/// always succeeds.
#[derive(Debug, Default)]
pub struct RecordingFulfiller {
    fulfilled: Mutex<Vec<Uuid>>,
}

impl RecordingFulfiller {
    /// Creates an empty recording fulfiller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ids of every fulfilled request, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fulfilled(&self) -> Vec<Uuid> {
        self.fulfilled.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fulfiller for RecordingFulfiller {
    async fn fulfill(
        &self,
        tx: &mut dyn RequestTransaction,
        request: &Request,
    ) -> Result<(), DomainError> {
        // Touch the store the way a real fulfiller reads the approved fields.
        tx.list_fields(request.id).await?;
        self.fulfilled.lock().unwrap().push(request.id);
        Ok(())
    }
}

/// A fulfiller that always fails, as when the owner already has a current
/// character.
#[derive(Debug)]
pub struct FailingFulfiller;

#[async_trait]
impl Fulfiller for FailingFulfiller {
    async fn fulfill(
        &self,
        _tx: &mut dyn RequestTransaction,
        _request: &Request,
    ) -> Result<(), DomainError> {
        Err(DomainError::Conflict(
            "player already has a current character".into(),
        ))
    }
}
