//! Mudgate Core — shared domain model and abstractions.
//!
//! This crate defines the persisted request model, the error taxonomy and
//! the collaborator traits (storage, permissions, fulfillment) that the
//! review engine depends on. It contains no infrastructure code.

pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod fulfillment;
pub mod model;
pub mod permission;
pub mod repository;
