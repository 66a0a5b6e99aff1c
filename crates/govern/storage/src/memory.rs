//! In-memory reference implementation of the governance storage traits.
//!
//! This adapter is deterministic and test-friendly. Deployments that need the
//! data to outlive the process should use the SQLite adapter.

use crate::traits::{
    AccountFilter, AccountStore, LookupFilter, LookupStore, QueryWindow, TaskStore,
};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use govern_types::{
    Account, AccountChanges, AccountId, LookupEntry, LookupEntryId, LookupPatch, NewAccount,
    NewLookupEntry, NewTask, Resolution, Task, TaskId, TaskStatus,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

/// Rows keyed by sequential id, like an autoincrement table.
struct Table<T> {
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// In-memory governance storage adapter.
#[derive(Default)]
pub struct InMemoryGovernanceStorage {
    accounts: RwLock<Table<Account>>,
    lookups: RwLock<Table<LookupEntry>>,
    tasks: RwLock<Table<Task>>,
}

impl InMemoryGovernanceStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryGovernanceStorage {
    async fn create_account(
        &self,
        account: NewAccount,
        created_at: DateTime<Utc>,
    ) -> StorageResult<Account> {
        let mut guard = self
            .accounts
            .write()
            .map_err(|_| StorageError::Backend("accounts lock poisoned".to_string()))?;

        if guard
            .rows
            .values()
            .any(|existing| existing.username == account.username)
        {
            return Err(StorageError::Conflict(format!(
                "username {} already exists",
                account.username
            )));
        }

        let id = guard.allocate_id();
        let record = Account {
            id: AccountId(id),
            username: account.username,
            secret: account.secret,
            role: account.role,
            email: account.email,
            full_name: account.full_name,
            department: account.department,
            created_by: account.created_by,
            created_at,
            updated_at: created_at,
        };
        guard.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn update_account(
        &self,
        id: AccountId,
        changes: AccountChanges,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let mut guard = self
            .accounts
            .write()
            .map_err(|_| StorageError::Backend("accounts lock poisoned".to_string()))?;
        let Some(record) = guard.rows.get_mut(&id.0) else {
            return Ok(false);
        };

        if let Some(secret) = changes.secret {
            record.secret = secret;
        }
        if let Some(role) = changes.role {
            record.role = role;
        }
        if let Some(email) = changes.email {
            record.email = email;
        }
        if let Some(full_name) = changes.full_name {
            record.full_name = full_name;
        }
        if let Some(department) = changes.department {
            record.department = department;
        }
        record.updated_at = updated_at;
        Ok(true)
    }

    async fn delete_account(&self, id: AccountId) -> StorageResult<bool> {
        let mut guard = self
            .accounts
            .write()
            .map_err(|_| StorageError::Backend("accounts lock poisoned".to_string()))?;
        Ok(guard.rows.remove(&id.0).is_some())
    }

    async fn get_account(&self, id: AccountId) -> StorageResult<Option<Account>> {
        let guard = self
            .accounts
            .read()
            .map_err(|_| StorageError::Backend("accounts lock poisoned".to_string()))?;
        Ok(guard.rows.get(&id.0).cloned())
    }

    async fn find_account_by_username(&self, username: &str) -> StorageResult<Option<Account>> {
        let guard = self
            .accounts
            .read()
            .map_err(|_| StorageError::Backend("accounts lock poisoned".to_string()))?;
        Ok(guard
            .rows
            .values()
            .find(|account| account.username == username)
            .cloned())
    }

    async fn list_accounts(&self, filter: AccountFilter) -> StorageResult<Vec<Account>> {
        let guard = self
            .accounts
            .read()
            .map_err(|_| StorageError::Backend("accounts lock poisoned".to_string()))?;
        Ok(guard
            .rows
            .values()
            .filter(|account| filter.role.map_or(true, |role| account.role == role))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LookupStore for InMemoryGovernanceStorage {
    async fn create_lookup_entry(
        &self,
        entry: NewLookupEntry,
        created_at: DateTime<Utc>,
    ) -> StorageResult<LookupEntry> {
        let mut guard = self
            .lookups
            .write()
            .map_err(|_| StorageError::Backend("lookup lock poisoned".to_string()))?;

        if guard
            .rows
            .values()
            .any(|existing| existing.data_type == entry.data_type && existing.code == entry.code)
        {
            return Err(StorageError::Conflict(format!(
                "lookup entry {}-{} already exists",
                entry.data_type, entry.code
            )));
        }

        let id = guard.allocate_id();
        let record = LookupEntry {
            id: LookupEntryId(id),
            data_type: entry.data_type,
            code: entry.code,
            value: entry.value,
            description: entry.description,
            status: entry.status,
            created_by: entry.created_by,
            created_at,
            updated_at: created_at,
        };
        guard.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn update_lookup_entry(
        &self,
        id: LookupEntryId,
        patch: LookupPatch,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let mut guard = self
            .lookups
            .write()
            .map_err(|_| StorageError::Backend("lookup lock poisoned".to_string()))?;
        let Some(record) = guard.rows.get_mut(&id.0) else {
            return Ok(false);
        };

        if let Some(value) = patch.value {
            record.value = value;
        }
        if let Some(description) = patch.description {
            record.description = description;
        }
        if let Some(status) = patch.status {
            record.status = status;
        }
        record.updated_at = updated_at;
        Ok(true)
    }

    async fn delete_lookup_entry(&self, id: LookupEntryId) -> StorageResult<bool> {
        let mut guard = self
            .lookups
            .write()
            .map_err(|_| StorageError::Backend("lookup lock poisoned".to_string()))?;
        Ok(guard.rows.remove(&id.0).is_some())
    }

    async fn get_lookup_entry(&self, id: LookupEntryId) -> StorageResult<Option<LookupEntry>> {
        let guard = self
            .lookups
            .read()
            .map_err(|_| StorageError::Backend("lookup lock poisoned".to_string()))?;
        Ok(guard.rows.get(&id.0).cloned())
    }

    async fn list_lookup_entries(&self, filter: LookupFilter) -> StorageResult<Vec<LookupEntry>> {
        let guard = self
            .lookups
            .read()
            .map_err(|_| StorageError::Backend("lookup lock poisoned".to_string()))?;
        let mut values = guard
            .rows
            .values()
            .filter(|entry| {
                filter
                    .data_type
                    .as_deref()
                    .map_or(true, |data_type| entry.data_type == data_type)
            })
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| (&a.data_type, &a.code).cmp(&(&b.data_type, &b.code)));
        Ok(values)
    }

    async fn distinct_data_types(&self) -> StorageResult<Vec<String>> {
        let guard = self
            .lookups
            .read()
            .map_err(|_| StorageError::Backend("lookup lock poisoned".to_string()))?;
        let types = guard
            .rows
            .values()
            .map(|entry| entry.data_type.clone())
            .collect::<BTreeSet<_>>();
        Ok(types.into_iter().collect())
    }
}

#[async_trait]
impl TaskStore for InMemoryGovernanceStorage {
    async fn insert_task(&self, task: NewTask, created_at: DateTime<Utc>) -> StorageResult<Task> {
        let mut guard = self
            .tasks
            .write()
            .map_err(|_| StorageError::Backend("tasks lock poisoned".to_string()))?;

        let id = guard.allocate_id();
        let record = Task {
            id: TaskId(id),
            task_type: task.task_type(),
            entity_kind: task.entity_kind(),
            entity_id: task.entity_id,
            payload: task.payload,
            status: TaskStatus::Pending,
            created_by: task.created_by,
            created_at,
            updated_at: created_at,
            approved_by: None,
            approved_at: None,
            failure_detail: None,
        };
        guard.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn get_task(&self, id: TaskId) -> StorageResult<Option<Task>> {
        let guard = self
            .tasks
            .read()
            .map_err(|_| StorageError::Backend("tasks lock poisoned".to_string()))?;
        Ok(guard.rows.get(&id.0).cloned())
    }

    async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        window: QueryWindow,
    ) -> StorageResult<Vec<Task>> {
        let guard = self
            .tasks
            .read()
            .map_err(|_| StorageError::Backend("tasks lock poisoned".to_string()))?;
        let mut values = guard
            .rows
            .values()
            .filter(|task| status.map_or(true, |status| task.status == status))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(apply_window(values, window))
    }

    async fn resolve_task(
        &self,
        id: TaskId,
        resolution: Resolution,
        resolved_by: &str,
        resolved_at: DateTime<Utc>,
        failure_detail: Option<String>,
    ) -> StorageResult<()> {
        let mut guard = self
            .tasks
            .write()
            .map_err(|_| StorageError::Backend("tasks lock poisoned".to_string()))?;
        let record = guard
            .rows
            .get_mut(&id.0)
            .ok_or_else(|| StorageError::NotFound(format!("task {id} not found")))?;

        if record.status != TaskStatus::Pending {
            return Err(StorageError::InvariantViolation(format!(
                "task {id} already resolved as {}",
                record.status
            )));
        }

        record.status = resolution.into();
        record.approved_by = Some(resolved_by.to_string());
        record.approved_at = Some(resolved_at);
        record.updated_at = resolved_at;
        record.failure_detail = failure_detail;
        Ok(())
    }
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}
