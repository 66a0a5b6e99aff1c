use govern_types::{Account, AccountId, EntityKind, LookupEntry, LookupEntryId, TaskId};
use serde::{Deserialize, Serialize};

/// Per-record tally of a bulk replay.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReport {
    pub source: String,
    pub created: usize,
    /// Rows skipped because the natural key already existed.
    pub conflicts: usize,
    /// Rows skipped because they could not be read.
    pub malformed: usize,
}

impl BulkReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn processed(&self) -> usize {
        self.created + self.conflicts + self.malformed
    }
}

/// The change a successful mutation made to the entity store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    AccountCreated { account: Account },
    AccountUpdated { id: AccountId },
    AccountDeleted { id: AccountId },
    LookupEntryCreated { entry: LookupEntry },
    LookupEntryUpdated { id: LookupEntryId },
    LookupEntryDeleted { id: LookupEntryId },
    BulkUpload { entity: EntityKind, report: BulkReport },
}

/// Result of `submit`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// The actor was allowed to act directly; no task exists.
    Executed { effect: Effect },
    /// The intent was recorded for approval.
    Pending { task_id: TaskId },
}

impl SubmitOutcome {
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            SubmitOutcome::Pending { task_id } => Some(*task_id),
            SubmitOutcome::Executed { .. } => None,
        }
    }
}

/// Result of `resolve`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolveOutcome {
    Approved { task_id: TaskId, effect: Effect },
    Rejected { task_id: TaskId },
    /// Replay did not take effect; the task is now `failed`.
    Failed { task_id: TaskId, detail: String },
}

impl ResolveOutcome {
    pub fn task_id(&self) -> TaskId {
        match self {
            ResolveOutcome::Approved { task_id, .. }
            | ResolveOutcome::Rejected { task_id }
            | ResolveOutcome::Failed { task_id, .. } => *task_id,
        }
    }

    /// `true` when the decision was carried out as asked.
    pub fn is_success(&self) -> bool {
        !matches!(self, ResolveOutcome::Failed { .. })
    }
}
