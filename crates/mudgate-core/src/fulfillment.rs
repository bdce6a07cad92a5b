//! Fulfillment abstraction.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::model::Request;
use crate::repository::RequestTransaction;

/// Materializes the effect of an approved request (for a character
/// application, instantiating the character).
///
/// Runs inside the caller's transaction; an error aborts fulfillment and
/// leaves the request `Approved`.
#[async_trait]
pub trait Fulfiller: Send + Sync {
    /// Applies the request's effect.
    async fn fulfill(
        &self,
        tx: &mut dyn RequestTransaction,
        request: &Request,
    ) -> Result<(), DomainError>;
}
