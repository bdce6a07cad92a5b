//! Test permissions — an in-memory `PermissionChecker`.

use std::collections::HashSet;

use mudgate_core::permission::PermissionChecker;
use uuid::Uuid;

/// A permission checker backed by a fixed set of grants.
#[derive(Debug, Default, Clone)]
pub struct StaticPermissions {
    grants: HashSet<(Uuid, String)>,
}

impl StaticPermissions {
    /// Creates a checker with no grants.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this checker that also grants `permission` to
    /// `actor_id`.
    #[must_use]
    pub fn grant(mut self, actor_id: Uuid, permission: &str) -> Self {
        self.grants.insert((actor_id, permission.to_owned()));
        self
    }
}

impl PermissionChecker for StaticPermissions {
    fn has_permission(&self, actor_id: Uuid, permission: &str) -> bool {
        self.grants.contains(&(actor_id, permission.to_owned()))
    }
}
