//! Mudgate — Request Review bounded context.
//!
//! Drives a multi-field submission (a character application) from drafting
//! through field-level review to a terminal resolution: the field definition
//! registry, the field and subfield manager, the change request ledger, the
//! comment thread, the request state machine and the navigation helpers that
//! resume a submission or review at the right field.

pub mod application;
pub mod domain;
