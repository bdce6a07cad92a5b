//! Shared test doubles and utilities for the Mudgate request review engine.

mod clock;
mod fulfiller;
mod logging;
mod permissions;
mod store;

pub use clock::FixedClock;
pub use fulfiller::{FailingFulfiller, RecordingFulfiller};
pub use logging::init_test_tracing;
pub use permissions::StaticPermissions;
pub use store::{FailingRequestStore, InMemoryRequestStore};
