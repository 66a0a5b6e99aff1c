//! Resolution edge cases: repeated decisions, undecodable tasks and a flaky ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use govern_storage::memory::InMemoryGovernanceStorage;
use govern_storage::{
    AccountFilter, AccountStore, LookupFilter, LookupStore, QueryWindow, StorageError,
    StorageResult, TaskStore,
};
use govern_types::{
    Account, AccountChanges, AccountId, Actor, EntityKind, FieldMap, LookupEntry, LookupEntryId,
    LookupPatch, NewAccount, NewLookupEntry, NewTask, Resolution, Task, TaskId, TaskPayload,
    TaskStatus, TaskType,
};
use govern_workflow::{Decision, ResolveOutcome, SubmitRequest, WorkflowEngine, WorkflowError};
use proptest::prelude::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn admin() -> Actor {
    Actor::administrator("admin")
}

fn country(code: &str) -> SubmitRequest {
    let fields: FieldMap = json!({"data_type": "country", "code": code, "value": "Norway"})
        .as_object()
        .cloned()
        .expect("object");
    SubmitRequest::create(EntityKind::LookupEntry, &fields).unwrap()
}

async fn defer(engine: &WorkflowEngine, request: SubmitRequest) -> TaskId {
    engine
        .submit(&Actor::analyst("analyst"), request)
        .await
        .unwrap()
        .task_id()
        .expect("deferred")
}

// ---------------------------------------------------------------------------
// Undecodable tasks
// ---------------------------------------------------------------------------

fn legacy_update() -> TaskPayload {
    TaskPayload::decode_stored(TaskType::Update, EntityKind::Account, r#"{"department":"Y"}"#)
}

#[tokio::test]
async fn test_approving_unreadable_task_marks_it_failed() {
    let storage = Arc::new(InMemoryGovernanceStorage::new());
    let engine = WorkflowEngine::new(storage.clone());
    let id = engine
        .ledger()
        .create(Some(5), legacy_update(), "analyst")
        .await
        .unwrap();

    assert_eq!(engine.list_tasks(None).await.unwrap().len(), 1);

    let outcome = engine.resolve(id, Decision::Approve, &admin()).await.unwrap();
    let ResolveOutcome::Failed { detail, .. } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(detail.contains("could not be decoded"), "{detail}");

    let task = engine.get_task(id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.failure_detail.as_deref(), Some(detail.as_str()));
    assert!(storage
        .list_accounts(AccountFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_rejecting_unreadable_task() {
    let engine = WorkflowEngine::in_memory();
    let id = engine
        .ledger()
        .create(Some(5), legacy_update(), "analyst")
        .await
        .unwrap();

    let outcome = engine.resolve(id, Decision::Reject, &admin()).await.unwrap();
    assert_eq!(outcome, ResolveOutcome::Rejected { task_id: id });
    assert_eq!(engine.get_task(id).await.unwrap().status, TaskStatus::Rejected);
}

// ---------------------------------------------------------------------------
// Ledger writes that fail transiently
// ---------------------------------------------------------------------------

/// In-memory storage whose next `failures` task resolutions fail.
struct FlakyLedgerStorage {
    inner: InMemoryGovernanceStorage,
    failures: AtomicUsize,
}

impl FlakyLedgerStorage {
    fn failing(failures: usize) -> Self {
        Self {
            inner: InMemoryGovernanceStorage::new(),
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl AccountStore for FlakyLedgerStorage {
    async fn create_account(
        &self,
        account: NewAccount,
        created_at: DateTime<Utc>,
    ) -> StorageResult<Account> {
        self.inner.create_account(account, created_at).await
    }

    async fn update_account(
        &self,
        id: AccountId,
        changes: AccountChanges,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        self.inner.update_account(id, changes, updated_at).await
    }

    async fn delete_account(&self, id: AccountId) -> StorageResult<bool> {
        self.inner.delete_account(id).await
    }

    async fn get_account(&self, id: AccountId) -> StorageResult<Option<Account>> {
        self.inner.get_account(id).await
    }

    async fn find_account_by_username(&self, username: &str) -> StorageResult<Option<Account>> {
        self.inner.find_account_by_username(username).await
    }

    async fn list_accounts(&self, filter: AccountFilter) -> StorageResult<Vec<Account>> {
        self.inner.list_accounts(filter).await
    }
}

#[async_trait]
impl LookupStore for FlakyLedgerStorage {
    async fn create_lookup_entry(
        &self,
        entry: NewLookupEntry,
        created_at: DateTime<Utc>,
    ) -> StorageResult<LookupEntry> {
        self.inner.create_lookup_entry(entry, created_at).await
    }

    async fn update_lookup_entry(
        &self,
        id: LookupEntryId,
        patch: LookupPatch,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        self.inner.update_lookup_entry(id, patch, updated_at).await
    }

    async fn delete_lookup_entry(&self, id: LookupEntryId) -> StorageResult<bool> {
        self.inner.delete_lookup_entry(id).await
    }

    async fn get_lookup_entry(&self, id: LookupEntryId) -> StorageResult<Option<LookupEntry>> {
        self.inner.get_lookup_entry(id).await
    }

    async fn list_lookup_entries(&self, filter: LookupFilter) -> StorageResult<Vec<LookupEntry>> {
        self.inner.list_lookup_entries(filter).await
    }

    async fn distinct_data_types(&self) -> StorageResult<Vec<String>> {
        self.inner.distinct_data_types().await
    }
}

#[async_trait]
impl TaskStore for FlakyLedgerStorage {
    async fn insert_task(&self, task: NewTask, created_at: DateTime<Utc>) -> StorageResult<Task> {
        self.inner.insert_task(task, created_at).await
    }

    async fn get_task(&self, id: TaskId) -> StorageResult<Option<Task>> {
        self.inner.get_task(id).await
    }

    async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        window: QueryWindow,
    ) -> StorageResult<Vec<Task>> {
        self.inner.list_tasks(status, window).await
    }

    async fn resolve_task(
        &self,
        id: TaskId,
        resolution: Resolution,
        resolved_by: &str,
        resolved_at: DateTime<Utc>,
        failure_detail: Option<String>,
    ) -> StorageResult<()> {
        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(StorageError::Backend("disk I/O error".to_string()));
        }
        self.inner
            .resolve_task(id, resolution, resolved_by, resolved_at, failure_detail)
            .await
    }
}

#[tokio::test]
async fn test_transient_ledger_failure_is_retried() {
    let storage = Arc::new(FlakyLedgerStorage::failing(1));
    let engine = WorkflowEngine::new(storage.clone());
    let id = defer(&engine, country("NO")).await;

    let outcome = engine.resolve(id, Decision::Approve, &admin()).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(engine.get_task(id).await.unwrap().status, TaskStatus::Approved);
    assert_eq!(
        storage
            .list_lookup_entries(LookupFilter::default())
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_persistent_ledger_failure_is_reported() {
    let storage = Arc::new(FlakyLedgerStorage::failing(2));
    let engine = WorkflowEngine::new(storage.clone());
    let id = defer(&engine, country("NO")).await;

    let err = engine
        .resolve(id, Decision::Approve, &admin())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Storage(_)));
    assert_eq!(engine.get_task(id).await.unwrap().status, TaskStatus::Pending);

    // The effect already landed, so a later approval cannot apply it twice.
    let outcome = engine.resolve(id, Decision::Approve, &admin()).await.unwrap();
    assert!(matches!(outcome, ResolveOutcome::Failed { .. }));
    assert_eq!(
        storage
            .list_lookup_entries(LookupFilter::default())
            .await
            .unwrap()
            .len(),
        1
    );
}

// ---------------------------------------------------------------------------
// Repeated decisions
// ---------------------------------------------------------------------------

fn decisions() -> impl Strategy<Value = Vec<Decision>> {
    proptest::collection::vec(
        prop_oneof![Just(Decision::Approve), Just(Decision::Reject)],
        1..6,
    )
}

proptest! {
    #[test]
    fn property_first_decision_wins_and_replays_once(sequence in decisions()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        rt.block_on(async move {
            let storage = Arc::new(InMemoryGovernanceStorage::new());
            let engine = WorkflowEngine::new(storage.clone());
            let id = defer(&engine, country("NO")).await;

            for (step, decision) in sequence.iter().enumerate() {
                let result = engine.resolve(id, *decision, &admin()).await;
                if step == 0 {
                    assert!(result.is_ok());
                } else {
                    assert!(matches!(result, Err(WorkflowError::AlreadyResolved(_))));
                }
            }

            let expected = match sequence[0] {
                Decision::Approve => (TaskStatus::Approved, 1),
                Decision::Reject => (TaskStatus::Rejected, 0),
            };
            let entries = storage
                .list_lookup_entries(LookupFilter::default())
                .await
                .unwrap();
            assert_eq!(engine.get_task(id).await.unwrap().status, expected.0);
            assert_eq!(entries.len(), expected.1);
        });
    }
}
