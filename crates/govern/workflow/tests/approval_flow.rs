//! End-to-end behaviour of the approval workflow against in-memory storage.

use govern_storage::memory::InMemoryGovernanceStorage;
use govern_storage::{AccountFilter, AccountStore, LookupFilter, LookupStore};
use govern_types::{
    AccountId, Actor, BulkUpload, Credential, EntityKind, EntryStatus, FieldMap, Role,
    SecretHash, TaskPayload, TaskStatus,
};
use govern_workflow::{
    Decision, Effect, ResolveOutcome, SubmitOutcome, SubmitRequest, WorkflowEngine, WorkflowError,
};
use serde_json::json;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fields(value: serde_json::Value) -> FieldMap {
    value.as_object().cloned().expect("object")
}

fn admin() -> Actor {
    Actor::administrator("admin")
}

fn analyst() -> Actor {
    Actor::analyst("analyst")
}

fn setup() -> (Arc<InMemoryGovernanceStorage>, WorkflowEngine) {
    let storage = Arc::new(InMemoryGovernanceStorage::new());
    let engine = WorkflowEngine::new(storage.clone());
    (storage, engine)
}

fn account_fields(username: &str) -> FieldMap {
    fields(json!({"username": username, "password": "pw", "role": "data_analyst"}))
}

async fn create_account_directly(engine: &WorkflowEngine, username: &str) -> AccountId {
    let outcome = engine
        .submit(
            &admin(),
            SubmitRequest::create(EntityKind::Account, &account_fields(username)).unwrap(),
        )
        .await
        .unwrap();
    match outcome {
        SubmitOutcome::Executed {
            effect: Effect::AccountCreated { account },
        } => account.id,
        other => panic!("unexpected outcome {other:?}"),
    }
}

async fn defer(engine: &WorkflowEngine, request: SubmitRequest) -> govern_types::TaskId {
    engine
        .submit(&analyst(), request)
        .await
        .unwrap()
        .task_id()
        .expect("analyst submissions are deferred")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn double_approve_applies_once() {
    let (storage, engine) = setup();
    let task_id = defer(
        &engine,
        SubmitRequest::create(EntityKind::Account, &account_fields("ana")).unwrap(),
    )
    .await;

    let first = engine
        .resolve(task_id, Decision::Approve, &admin())
        .await
        .unwrap();
    assert!(matches!(first, ResolveOutcome::Approved { .. }));

    let second = engine.resolve(task_id, Decision::Approve, &admin()).await;
    assert!(matches!(second, Err(WorkflowError::AlreadyResolved(_))));

    let task = engine.get_task(task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Approved);
    assert_eq!(task.approved_by.as_deref(), Some("admin"));
    assert_eq!(
        storage
            .list_accounts(AccountFilter::default())
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn username_uniqueness_spans_direct_and_replayed_creates() {
    let (storage, engine) = setup();
    let task_id = defer(
        &engine,
        SubmitRequest::create(EntityKind::Account, &account_fields("ana")).unwrap(),
    )
    .await;
    create_account_directly(&engine, "ana").await;

    let direct_again = engine
        .submit(
            &admin(),
            SubmitRequest::create(EntityKind::Account, &account_fields("ana")).unwrap(),
        )
        .await;
    assert!(matches!(
        direct_again,
        Err(WorkflowError::UniquenessConflict(_))
    ));

    let replayed = engine
        .resolve(task_id, Decision::Approve, &admin())
        .await
        .unwrap();
    match replayed {
        ResolveOutcome::Failed { detail, .. } => assert!(detail.contains("conflict")),
        other => panic!("unexpected outcome {other:?}"),
    }

    let task = engine.get_task(task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.failure_detail.is_some());
    assert_eq!(
        storage
            .list_accounts(AccountFilter::default())
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn reject_never_touches_the_store() {
    let (storage, engine) = setup();
    let id = create_account_directly(&engine, "ana").await;
    let before = storage.get_account(id).await.unwrap();

    let delete = defer(&engine, SubmitRequest::delete(EntityKind::Account, id.0)).await;
    let update = defer(
        &engine,
        SubmitRequest::update(EntityKind::Account, id.0, &fields(json!({"department": "X"})))
            .unwrap(),
    )
    .await;

    for task_id in [delete, update] {
        let outcome = engine
            .resolve(task_id, Decision::Reject, &admin())
            .await
            .unwrap();
        assert!(matches!(outcome, ResolveOutcome::Rejected { .. }));
        let task = engine.get_task(task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Rejected);
        assert!(task.approved_at.is_some());
    }

    assert_eq!(storage.get_account(id).await.unwrap(), before);
}

#[tokio::test]
async fn bulk_upload_skips_duplicates_and_still_approves() {
    let (storage, engine) = setup();
    create_account_directly(&engine, "ana").await;

    let records = vec![
        account_fields("bo"),
        account_fields("ana"),
        account_fields("cy"),
    ];
    let task_id = defer(
        &engine,
        SubmitRequest::bulk_upload(EntityKind::Account, "users.xlsx", records).unwrap(),
    )
    .await;
    let task = engine.get_task(task_id).await.unwrap();
    assert_eq!(task.entity_id, None);
    assert_eq!(
        task.describe(),
        "Bulk upload Account (3 records from users.xlsx)"
    );

    let outcome = engine
        .resolve(task_id, Decision::Approve, &admin())
        .await
        .unwrap();
    match outcome {
        ResolveOutcome::Approved {
            effect: Effect::BulkUpload { report, .. },
            ..
        } => {
            assert_eq!(report.created, 2);
            assert_eq!(report.conflicts, 1);
            assert_eq!(report.malformed, 0);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let accounts = storage
        .list_accounts(AccountFilter::default())
        .await
        .unwrap();
    assert_eq!(accounts.len(), 3);
    let bo = accounts.iter().find(|a| a.username == "bo").unwrap();
    assert_eq!(bo.created_by.as_deref(), Some("analyst"));
    assert!(bo.secret.matches("pw"));
}

#[tokio::test]
async fn bulk_upload_where_every_row_conflicts_is_still_approved() {
    let (storage, engine) = setup();
    create_account_directly(&engine, "ana").await;

    let task_id = defer(
        &engine,
        SubmitRequest::bulk_upload(EntityKind::Account, "dup.csv", vec![account_fields("ana")])
            .unwrap(),
    )
    .await;
    let outcome = engine
        .resolve(task_id, Decision::Approve, &admin())
        .await
        .unwrap();
    assert!(outcome.is_success());
    assert_eq!(
        engine.get_task(task_id).await.unwrap().status,
        TaskStatus::Approved
    );
    assert_eq!(
        storage
            .list_accounts(AccountFilter::default())
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn bulk_upload_counts_unreadable_rows() {
    let (storage, engine) = setup();
    let records = vec![
        fields(json!({"data_type": "Country", "code": "US", "value": "United States"})),
        fields(json!({"data_type": "Country", "value": "No code"})),
        fields(json!({"data_type": "Country", "code": "FR", "value": "France", "status": "inactive"})),
    ];
    let task_id = defer(
        &engine,
        SubmitRequest::bulk_upload(EntityKind::LookupEntry, "countries.csv", records).unwrap(),
    )
    .await;

    let outcome = engine
        .resolve(task_id, Decision::Approve, &admin())
        .await
        .unwrap();
    match outcome {
        ResolveOutcome::Approved {
            effect: Effect::BulkUpload { entity, report },
            ..
        } => {
            assert_eq!(entity, EntityKind::LookupEntry);
            assert_eq!(report.created, 2);
            assert_eq!(report.malformed, 1);
            assert_eq!(report.processed(), 3);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let entries = storage
        .list_lookup_entries(LookupFilter::data_type("Country"))
        .await
        .unwrap();
    assert_eq!(
        entries.iter().map(|e| e.code.as_str()).collect::<Vec<_>>(),
        vec!["FR", "US"]
    );
    assert_eq!(entries[0].status, EntryStatus::Inactive);
}

#[tokio::test]
async fn empty_bulk_task_fails_on_approval() {
    let (_storage, engine) = setup();
    let task_id = engine
        .ledger()
        .create(
            None,
            TaskPayload::BulkLookupEntries(BulkUpload::new("empty.csv", vec![])),
            "analyst",
        )
        .await
        .unwrap();

    let outcome = engine
        .resolve(task_id, Decision::Approve, &admin())
        .await
        .unwrap();
    assert!(!outcome.is_success());
    assert_eq!(
        engine.get_task(task_id).await.unwrap().status,
        TaskStatus::Failed
    );
}

#[tokio::test]
async fn analyst_delete_is_deferred_and_administrator_delete_is_direct() {
    let (storage, engine) = setup();
    for name in ["a", "b", "c", "d", "e"] {
        create_account_directly(&engine, name).await;
    }

    let outcome = engine
        .submit(&analyst(), SubmitRequest::delete(EntityKind::Account, 5))
        .await
        .unwrap();
    let task_id = outcome.task_id().expect("pending task");
    let task = engine.get_task(task_id).await.unwrap();
    assert_eq!(task.entity_id, Some(5));
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.approved_by.is_none() && task.approved_at.is_none());
    assert_eq!(task.describe(), "Delete Account (ID: 5)");
    assert!(storage.get_account(AccountId(5)).await.unwrap().is_some());

    let outcome = engine
        .submit(&admin(), SubmitRequest::delete(EntityKind::Account, 5))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        SubmitOutcome::Executed {
            effect: Effect::AccountDeleted { .. }
        }
    ));
    assert!(storage.get_account(AccountId(5)).await.unwrap().is_none());
    assert_eq!(engine.list_tasks(None).await.unwrap().len(), 1);

    // The deferred delete now has nothing to act on.
    let replay = engine
        .resolve(task_id, Decision::Approve, &admin())
        .await
        .unwrap();
    assert!(matches!(replay, ResolveOutcome::Failed { .. }));
}

#[tokio::test]
async fn update_through_task_ignores_identity_keys() {
    let (storage, engine) = setup();
    let id = create_account_directly(&engine, "ana").await;

    let task_id = defer(
        &engine,
        SubmitRequest::update(
            EntityKind::Account,
            id.0,
            &fields(json!({"username": "x", "department": "Y"})),
        )
        .unwrap(),
    )
    .await;
    engine
        .resolve(task_id, Decision::Approve, &admin())
        .await
        .unwrap();

    let account = storage.get_account(id).await.unwrap().unwrap();
    assert_eq!(account.username, "ana");
    assert_eq!(account.department.as_deref(), Some("Y"));
    assert_eq!(account.role, Role::Analyst);
    assert!(account.secret.matches("pw"));
}

#[tokio::test]
async fn password_updates_are_sealed_before_persisting() {
    let (storage, engine) = setup();
    let id = create_account_directly(&engine, "ana").await;

    let task_id = defer(
        &engine,
        SubmitRequest::update(EntityKind::Account, id.0, &fields(json!({"password": "n3w"})))
            .unwrap(),
    )
    .await;
    let task = engine.get_task(task_id).await.unwrap();
    match &task.payload {
        TaskPayload::UpdateAccount(patch) => {
            assert_eq!(
                patch.password,
                Some(Credential::Hashed(SecretHash::from_password("n3w")))
            );
        }
        other => panic!("unexpected payload {other:?}"),
    }

    engine
        .resolve(task_id, Decision::Approve, &admin())
        .await
        .unwrap();
    let account = storage.get_account(id).await.unwrap().unwrap();
    assert!(account.secret.matches("n3w"));
}

#[tokio::test]
async fn lookup_entry_round_trip_defaults_to_active() {
    let (storage, engine) = setup();
    let task_id = defer(
        &engine,
        SubmitRequest::create(
            EntityKind::LookupEntry,
            &fields(json!({"data_type": "Country", "code": "US", "value": "United States"})),
        )
        .unwrap(),
    )
    .await;
    let outcome = engine
        .resolve(task_id, Decision::Approve, &admin())
        .await
        .unwrap();
    let entry = match outcome {
        ResolveOutcome::Approved {
            effect: Effect::LookupEntryCreated { entry },
            ..
        } => entry,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(entry.status, EntryStatus::Active);
    assert_eq!(entry.created_by.as_deref(), Some("analyst"));

    let stored = storage.get_lookup_entry(entry.id).await.unwrap().unwrap();
    assert_eq!(stored, entry);
    assert_eq!(
        engine.distinct_data_types().await.unwrap(),
        vec!["Country".to_string()]
    );
}

#[tokio::test]
async fn lookup_update_cannot_change_category_or_code() {
    let (storage, engine) = setup();
    let created = engine
        .submit(
            &admin(),
            SubmitRequest::create(
                EntityKind::LookupEntry,
                &fields(json!({"data_type": "Country", "code": "US", "value": "USA"})),
            )
            .unwrap(),
        )
        .await
        .unwrap();
    let id = match created {
        SubmitOutcome::Executed {
            effect: Effect::LookupEntryCreated { entry },
        } => entry.id,
        other => panic!("unexpected outcome {other:?}"),
    };

    engine
        .submit(
            &admin(),
            SubmitRequest::update(
                EntityKind::LookupEntry,
                id.0,
                &fields(json!({"data_type": "Currency", "code": "USD", "value": "United States"})),
            )
            .unwrap(),
        )
        .await
        .unwrap();

    let entry = storage.get_lookup_entry(id).await.unwrap().unwrap();
    assert_eq!(entry.data_type, "Country");
    assert_eq!(entry.code, "US");
    assert_eq!(entry.value, "United States");
}

#[tokio::test]
async fn direct_update_of_missing_row_is_not_found() {
    let (_storage, engine) = setup();
    let result = engine
        .submit(
            &admin(),
            SubmitRequest::update(EntityKind::LookupEntry, 77, &fields(json!({"value": "x"})))
                .unwrap(),
        )
        .await;
    assert!(matches!(result, Err(WorkflowError::NotFound(_))));
    assert!(engine.list_tasks(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn analysts_cannot_resolve_tasks() {
    let (_storage, engine) = setup();
    let task_id = defer(&engine, SubmitRequest::delete(EntityKind::LookupEntry, 1)).await;

    let result = engine.resolve(task_id, Decision::Approve, &analyst()).await;
    assert!(matches!(result, Err(WorkflowError::Unauthorized { .. })));
    assert!(engine.get_task(task_id).await.unwrap().is_pending());
}

#[tokio::test]
async fn resolving_unknown_task_is_not_found() {
    let (_storage, engine) = setup();
    let result = engine
        .resolve(govern_types::TaskId(404), Decision::Reject, &admin())
        .await;
    assert!(matches!(result, Err(WorkflowError::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_have_a_single_winner() {
    let (storage, engine) = setup();
    let engine = Arc::new(engine);
    let task_id = defer(
        &engine,
        SubmitRequest::create(EntityKind::Account, &account_fields("ana")).unwrap(),
    )
    .await;

    let mut handles = Vec::new();
    for n in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .resolve(
                    task_id,
                    Decision::Approve,
                    &Actor::administrator(format!("admin-{n}")),
                )
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                assert!(outcome.is_success());
                winners += 1;
            }
            Err(err) => assert!(matches!(err, WorkflowError::AlreadyResolved(_))),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(
        storage
            .list_accounts(AccountFilter::default())
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn bootstrap_is_idempotent_and_actors_resolve_from_store() {
    let (_storage, engine) = setup();
    let drafts = vec![
        govern_types::AccountDraft::from_fields(&fields(
            json!({"username": "admin", "password": "admin123", "role": "super_admin"}),
        ))
        .unwrap(),
        govern_types::AccountDraft::from_fields(&account_fields("analyst")).unwrap(),
    ];

    assert_eq!(engine.bootstrap_accounts(drafts.clone()).await.unwrap(), 2);
    assert_eq!(engine.bootstrap_accounts(drafts).await.unwrap(), 0);

    let actor = engine.actor_for("admin").await.unwrap();
    assert_eq!(actor, Actor::administrator("admin"));
    assert!(matches!(
        engine.actor_for("nobody").await,
        Err(WorkflowError::NotFound(_))
    ));
}

#[tokio::test]
async fn overview_counts_entities_and_tasks() {
    let (_storage, engine) = setup();
    create_account_directly(&engine, "ana").await;
    engine
        .bootstrap_accounts(vec![govern_types::AccountDraft::from_fields(&fields(
            json!({"username": "root", "password": "pw", "role": "administrator"}),
        ))
        .unwrap()])
        .await
        .unwrap();
    defer(&engine, SubmitRequest::delete(EntityKind::Account, 1)).await;

    let overview = engine.overview().await.unwrap();
    assert_eq!(overview.accounts_total, 2);
    assert_eq!(overview.accounts_by_role.get(&Role::Administrator), Some(&1));
    assert_eq!(overview.accounts_by_role.get(&Role::Analyst), Some(&1));
    assert_eq!(overview.lookups_total, 0);
    assert_eq!(overview.tasks.total, 1);
    assert_eq!(overview.tasks.count(TaskStatus::Pending), 1);
}
