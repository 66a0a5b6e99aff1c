//! Govern Policy - role-based access decisions for governed operations
//!
//! The policy is pure and stateless. It answers one question for the workflow
//! engine: may this role carry out this mutation right away, or must it be
//! deferred into a task for an administrator?
//!
//! Reads are never gated by the self-execution check.

#![deny(unsafe_code)]

use govern_types::{EntityKind, Role, TaskType};
use serde::{Deserialize, Serialize};

/// A mutating operation against one entity kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    pub action: TaskType,
    pub entity: EntityKind,
}

impl Operation {
    pub fn new(action: TaskType, entity: EntityKind) -> Self {
        Self { action, entity }
    }

    /// Every mutating operation the workspace knows about.
    pub fn all() -> impl Iterator<Item = Operation> {
        TaskType::ALL.into_iter().flat_map(|action| {
            [EntityKind::Account, EntityKind::LookupEntry]
                .into_iter()
                .map(move |entity| Operation::new(action, entity))
        })
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.action, self.entity)
    }
}

/// What the engine should do with a submitted operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Apply the mutation now.
    Execute,
    /// Record a pending task for an administrator.
    Defer,
}

/// Access decisions consumed by the workflow engine.
pub trait AccessPolicy: Send + Sync {
    /// Whether `role` may apply `operation` without approval.
    fn may_self_execute(&self, role: Role, operation: Operation) -> bool;

    /// Whether `role` may propose `operation` at all.
    fn may_submit(&self, role: Role, operation: Operation) -> bool;

    /// Whether `role` may read accounts, lookup entries and tasks.
    fn may_view_entities(&self, role: Role) -> bool;

    /// Whether `role` may approve or reject pending tasks.
    fn may_resolve_tasks(&self, role: Role) -> bool;

    fn disposition(&self, role: Role, operation: Operation) -> Disposition {
        if self.may_self_execute(role, operation) {
            Disposition::Execute
        } else {
            Disposition::Defer
        }
    }
}

/// The two-role policy: administrators act directly, analysts propose.
#[derive(Clone, Copy, Debug, Default)]
pub struct RoleAccessPolicy;

impl RoleAccessPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl AccessPolicy for RoleAccessPolicy {
    fn may_self_execute(&self, role: Role, _operation: Operation) -> bool {
        match role {
            Role::Administrator => true,
            Role::Analyst => false,
        }
    }

    fn may_submit(&self, role: Role, _operation: Operation) -> bool {
        matches!(role, Role::Administrator | Role::Analyst)
    }

    fn may_view_entities(&self, role: Role) -> bool {
        matches!(role, Role::Administrator | Role::Analyst)
    }

    fn may_resolve_tasks(&self, role: Role) -> bool {
        matches!(role, Role::Administrator)
    }
}
