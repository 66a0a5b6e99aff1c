//! Govern Ledger - durable record of deferred mutations.
//!
//! The ledger is the only place tasks are created and the only place their
//! status changes. Creation is append-only; resolution is a single conditional
//! transition out of `pending`, delegated to the storage adapter so concurrent
//! resolvers cannot both win.

#![deny(unsafe_code)]

use chrono::Utc;
use govern_storage::memory::InMemoryGovernanceStorage;
use govern_storage::{QueryWindow, StorageError, TaskStore};
use govern_types::{NewTask, Resolution, Task, TaskId, TaskPayload, TaskStatus, TaskType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Number of tasks reported as "recent" in statistics.
pub const RECENT_TASKS: usize = 5;

/// The task ledger facade.
pub struct TaskLedger {
    storage: Arc<dyn TaskStore>,
}

impl TaskLedger {
    /// Create a new ledger backed by in-memory storage.
    pub fn new() -> Self {
        Self {
            storage: Arc::new(InMemoryGovernanceStorage::new()),
        }
    }

    /// Create a ledger backed by an explicit storage adapter.
    pub fn with_storage(storage: Arc<dyn TaskStore>) -> Self {
        Self { storage }
    }

    /// Record a deferred intent as a pending task.
    pub async fn create(
        &self,
        entity_id: Option<i64>,
        payload: TaskPayload,
        created_by: &str,
    ) -> LedgerResult<TaskId> {
        let task = self
            .storage
            .insert_task(NewTask::new(entity_id, payload, created_by), Utc::now())
            .await?;
        tracing::debug!(
            task_id = %task.id,
            task_type = %task.task_type,
            entity_type = %task.entity_kind,
            created_by = %task.created_by,
            "task recorded"
        );
        Ok(task.id)
    }

    pub async fn get(&self, id: TaskId) -> LedgerResult<Task> {
        self.storage
            .get_task(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("task {id}")))
    }

    /// Tasks newest first, optionally restricted to one status.
    pub async fn list(&self, status: Option<TaskStatus>) -> LedgerResult<Vec<Task>> {
        Ok(self.storage.list_tasks(status, QueryWindow::all()).await?)
    }

    pub async fn recent(&self, count: usize) -> LedgerResult<Vec<Task>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        Ok(self
            .storage
            .list_tasks(None, QueryWindow::first(count))
            .await?)
    }

    /// Move a pending task to its terminal status.
    ///
    /// Returns `Ok(false)` when the task had already left `pending`; the stored
    /// record is untouched in that case.
    pub async fn mark_resolved(
        &self,
        id: TaskId,
        resolution: Resolution,
        approved_by: &str,
        failure_detail: Option<String>,
    ) -> LedgerResult<bool> {
        match self
            .storage
            .resolve_task(id, resolution, approved_by, Utc::now(), failure_detail)
            .await
        {
            Ok(()) => Ok(true),
            Err(StorageError::InvariantViolation(msg)) => {
                tracing::debug!(task_id = %id, reason = %msg, "task already resolved");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Get statistics about the ledger.
    pub async fn statistics(&self) -> LedgerResult<TaskStatistics> {
        let tasks = self.list(None).await?;

        let mut by_status: BTreeMap<TaskStatus, usize> =
            TaskStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        let mut by_type: BTreeMap<TaskType, usize> = BTreeMap::new();
        for task in &tasks {
            *by_status.entry(task.status).or_insert(0) += 1;
            *by_type.entry(task.task_type).or_insert(0) += 1;
        }

        Ok(TaskStatistics {
            total: tasks.len(),
            by_status,
            by_type,
            recent: tasks.into_iter().take(RECENT_TASKS).collect(),
        })
    }
}

impl Default for TaskLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskStatistics {
    pub total: usize,
    pub by_status: BTreeMap<TaskStatus, usize>,
    pub by_type: BTreeMap<TaskType, usize>,
    pub recent: Vec<Task>,
}

impl TaskStatistics {
    pub fn count(&self, status: TaskStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-related errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task already resolved: {0}")]
    AlreadyResolved(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StorageError> for LedgerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(msg) => Self::NotFound(msg),
            StorageError::InvariantViolation(msg) => Self::AlreadyResolved(msg),
            StorageError::Conflict(msg)
            | StorageError::InvalidInput(msg)
            | StorageError::Serialization(msg)
            | StorageError::Backend(msg) => Self::Backend(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn create_then_get() {
        let ledger = TaskLedger::new();
        let id = ledger
            .create(Some(5), TaskPayload::DeleteAccount, "analyst")
            .await
            .unwrap();

        let task = ledger.get(id).await.unwrap();
        assert_eq!(task.task_type, TaskType::Delete);
        assert_eq!(task.entity_id, Some(5));
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.approved_by.is_none());
        assert!(task.approved_at.is_none());
    }

    #[tokio::test]
    async fn missing_task_is_not_found() {
        let ledger = TaskLedger::new();
        assert!(matches!(
            ledger.get(TaskId(7)).await,
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            ledger
                .mark_resolved(TaskId(7), Resolution::Rejected, "admin", None)
                .await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn second_resolution_reports_false_and_keeps_first() {
        let ledger = TaskLedger::new();
        let id = ledger
            .create(Some(1), TaskPayload::DeleteLookupEntry, "analyst")
            .await
            .unwrap();

        assert!(ledger
            .mark_resolved(id, Resolution::Rejected, "admin", None)
            .await
            .unwrap());
        assert!(!ledger
            .mark_resolved(id, Resolution::Approved, "other-admin", None)
            .await
            .unwrap());

        let task = ledger.get(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Rejected);
        assert_eq!(task.approved_by.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn list_filters_and_orders_newest_first() {
        let ledger = TaskLedger::new();
        let first = ledger
            .create(Some(1), TaskPayload::DeleteAccount, "a")
            .await
            .unwrap();
        let second = ledger
            .create(Some(2), TaskPayload::DeleteAccount, "a")
            .await
            .unwrap();
        ledger
            .mark_resolved(first, Resolution::Approved, "admin", None)
            .await
            .unwrap();

        let all = ledger.list(None).await.unwrap();
        assert_eq!(
            all.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![second, first]
        );
        let pending = ledger.list(Some(TaskStatus::Pending)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second);
    }

    #[tokio::test]
    async fn statistics_count_statuses_and_types() {
        let ledger = TaskLedger::new();
        for entity in 0..7 {
            ledger
                .create(Some(entity), TaskPayload::DeleteAccount, "a")
                .await
                .unwrap();
        }
        ledger
            .mark_resolved(TaskId(1), Resolution::Failed, "admin", Some("gone".into()))
            .await
            .unwrap();

        let stats = ledger.statistics().await.unwrap();
        assert_eq!(stats.total, 7);
        assert_eq!(stats.count(TaskStatus::Pending), 6);
        assert_eq!(stats.count(TaskStatus::Failed), 1);
        assert_eq!(stats.count(TaskStatus::Approved), 0);
        assert_eq!(stats.by_type.get(&TaskType::Delete), Some(&7));
        assert_eq!(stats.recent.len(), RECENT_TASKS);
        assert_eq!(stats.recent[0].id, TaskId(7));
    }

    fn resolution_strategy() -> impl Strategy<Value = Vec<Resolution>> {
        proptest::collection::vec(
            prop_oneof![
                Just(Resolution::Approved),
                Just(Resolution::Rejected),
                Just(Resolution::Failed),
            ],
            0..8,
        )
    }

    proptest! {
        #[test]
        fn property_only_the_first_resolution_lands(ops in resolution_strategy()) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");

            rt.block_on(async move {
                let ledger = TaskLedger::new();
                let id = ledger
                    .create(None, TaskPayload::DeleteAccount, "prop")
                    .await
                    .expect("task");

                let mut accepted = 0;
                for (index, resolution) in ops.iter().enumerate() {
                    let landed = ledger
                        .mark_resolved(id, *resolution, &format!("admin-{index}"), None)
                        .await
                        .expect("resolve");
                    if landed {
                        accepted += 1;
                    }
                }

                let task = ledger.get(id).await.expect("task");
                match ops.first() {
                    None => {
                        assert_eq!(accepted, 0);
                        assert_eq!(task.status, TaskStatus::Pending);
                        assert!(task.approved_by.is_none() && task.approved_at.is_none());
                    }
                    Some(first) => {
                        assert_eq!(accepted, 1);
                        assert_eq!(task.status, TaskStatus::from(*first));
                        assert_eq!(task.approved_by.as_deref(), Some("admin-0"));
                        assert!(task.approved_at.is_some());
                    }
                }
            });
        }
    }
}
