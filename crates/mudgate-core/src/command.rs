//! Command abstractions.

use uuid::Uuid;

/// Trait that all commands implement.
///
/// The acting player is always carried on the command itself; nothing in the
/// engine reads it from ambient session state.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;

    /// The player issuing the command.
    fn actor_id(&self) -> Uuid;
}
