//! Permission capability consumed by the engine.

use uuid::Uuid;

/// Yes/no capability check backed by the permission-grant store.
pub trait PermissionChecker: Send + Sync {
    /// Returns whether `actor_id` holds the permission named `permission`.
    fn has_permission(&self, actor_id: Uuid, permission: &str) -> bool;
}
