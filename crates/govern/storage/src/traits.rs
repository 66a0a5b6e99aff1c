use crate::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use govern_types::{
    Account, AccountChanges, AccountId, LookupEntry, LookupEntryId, LookupPatch, NewAccount,
    NewLookupEntry, NewTask, Resolution, Role, Task, TaskId, TaskStatus,
};

/// Generic query window for paged reads. A zero limit means "no limit".
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

impl QueryWindow {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn first(limit: usize) -> Self {
        Self { limit, offset: 0 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Default)]
pub struct LookupFilter {
    pub data_type: Option<String>,
}

impl LookupFilter {
    pub fn data_type(data_type: impl Into<String>) -> Self {
        Self {
            data_type: Some(data_type.into()),
        }
    }
}

/// Storage interface for accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert an account. Fails with `Conflict` when the username is taken.
    async fn create_account(
        &self,
        account: NewAccount,
        created_at: DateTime<Utc>,
    ) -> StorageResult<Account>;

    /// Apply column changes and refresh `updated_at`. `false` if the id is unknown.
    async fn update_account(
        &self,
        id: AccountId,
        changes: AccountChanges,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Hard delete. `false` if the id is unknown.
    async fn delete_account(&self, id: AccountId) -> StorageResult<bool>;

    async fn get_account(&self, id: AccountId) -> StorageResult<Option<Account>>;

    async fn find_account_by_username(&self, username: &str) -> StorageResult<Option<Account>>;

    /// List accounts ordered by id.
    async fn list_accounts(&self, filter: AccountFilter) -> StorageResult<Vec<Account>>;
}

/// Storage interface for reference-data lookup entries.
#[async_trait]
pub trait LookupStore: Send + Sync {
    /// Insert an entry. Fails with `Conflict` when `(data_type, code)` is taken.
    async fn create_lookup_entry(
        &self,
        entry: NewLookupEntry,
        created_at: DateTime<Utc>,
    ) -> StorageResult<LookupEntry>;

    async fn update_lookup_entry(
        &self,
        id: LookupEntryId,
        patch: LookupPatch,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<bool>;

    async fn delete_lookup_entry(&self, id: LookupEntryId) -> StorageResult<bool>;

    async fn get_lookup_entry(&self, id: LookupEntryId) -> StorageResult<Option<LookupEntry>>;

    /// List entries ordered by `(data_type, code)`.
    async fn list_lookup_entries(&self, filter: LookupFilter) -> StorageResult<Vec<LookupEntry>>;

    /// Distinct categories, sorted.
    async fn distinct_data_types(&self) -> StorageResult<Vec<String>>;
}

/// Storage interface for ledger rows. Payloads are stored, never interpreted.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Append a pending task and return the stored record.
    async fn insert_task(&self, task: NewTask, created_at: DateTime<Utc>) -> StorageResult<Task>;

    async fn get_task(&self, id: TaskId) -> StorageResult<Option<Task>>;

    /// List tasks newest-first; ties are broken by id, newest first.
    async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        window: QueryWindow,
    ) -> StorageResult<Vec<Task>>;

    /// Move a task out of `Pending` as one conditional write.
    ///
    /// Fails with `NotFound` when the id is unknown and with
    /// `InvariantViolation` when the task is no longer pending.
    async fn resolve_task(
        &self,
        id: TaskId,
        resolution: Resolution,
        resolved_by: &str,
        resolved_at: DateTime<Utc>,
        failure_detail: Option<String>,
    ) -> StorageResult<()>;
}

/// Unified storage bundle used by the workflow engine.
pub trait GovernanceStorage: AccountStore + LookupStore + TaskStore + Send + Sync {}

impl<T> GovernanceStorage for T where T: AccountStore + LookupStore + TaskStore + Send + Sync {}
