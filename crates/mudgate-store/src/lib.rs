//! Mudgate Store — `PostgreSQL` persistence for the request review engine.

pub mod config;
pub mod error;
pub mod pg_request_store;
