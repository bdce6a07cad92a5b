//! Application layer: command and query handlers.
//!
//! Every handler runs inside a caller-opened [`RequestTransaction`]; the
//! caller commits on `Ok` and rolls back on `Err`.
//!
//! [`RequestTransaction`]: mudgate_core::repository::RequestTransaction

pub mod change_requests;
pub mod comments;
pub mod fields;
pub mod query_handlers;
pub mod status;
mod support;

pub use support::is_editable;

#[cfg(test)]
pub(crate) mod fixtures;
