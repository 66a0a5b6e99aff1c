//! Workflow Engine: the entry point for every governed mutation.
//!
//! The engine:
//! 1. Asks the access policy whether the actor may act directly
//! 2. Applies permitted mutations to the entity store immediately
//! 3. Records everything else as a pending task in the ledger
//! 4. Replays a task's payload when an administrator approves it
//!
//! Resolutions in one process are serialized, and the ledger's conditional
//! update guards against resolvers elsewhere, so a task is replayed at most once.

use crate::error::{ReplayFailure, WorkflowError, WorkflowResult};
use crate::outcome::{ResolveOutcome, SubmitOutcome};
use crate::replay;
use crate::request::{Decision, SubmitRequest};
use govern_ledger::{LedgerError, TaskLedger};
use govern_policy::{AccessPolicy, Disposition, RoleAccessPolicy};
use govern_storage::memory::InMemoryGovernanceStorage;
use govern_storage::{
    AccountFilter, AccountStore, GovernanceStorage, LookupFilter, LookupStore,
};
use govern_types::{
    Account, AccountDraft, Actor, LookupEntry, Resolution, Task, TaskId, TaskStatus,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// The workflow engine.
pub struct WorkflowEngine {
    storage: Arc<dyn GovernanceStorage>,
    ledger: TaskLedger,
    policy: Arc<dyn AccessPolicy>,
    resolve_gate: Mutex<()>,
}

impl WorkflowEngine {
    /// Create an engine over a storage adapter with the two-role policy.
    pub fn new<S>(storage: Arc<S>) -> Self
    where
        S: GovernanceStorage + 'static,
    {
        let ledger = TaskLedger::with_storage(storage.clone());
        Self {
            storage,
            ledger,
            policy: Arc::new(RoleAccessPolicy::new()),
            resolve_gate: Mutex::new(()),
        }
    }

    /// Create an engine backed by in-memory storage.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryGovernanceStorage::new()))
    }

    /// Replace the access policy.
    pub fn with_policy(mut self, policy: Arc<dyn AccessPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn ledger(&self) -> &TaskLedger {
        &self.ledger
    }

    pub fn policy(&self) -> &dyn AccessPolicy {
        self.policy.as_ref()
    }

    // ── Submission ───────────────────────────────────────────────────

    /// Submit a mutation on behalf of `actor`.
    ///
    /// Returns the applied effect when the policy lets the actor act directly,
    /// otherwise the id of the newly recorded pending task.
    pub async fn submit(
        &self,
        actor: &Actor,
        request: SubmitRequest,
    ) -> WorkflowResult<SubmitOutcome> {
        let operation = request.operation();
        if !self.policy.may_submit(actor.role, operation) {
            return Err(WorkflowError::Unauthorized {
                actor: actor.to_string(),
                action: format!("submit {operation}"),
            });
        }

        let (entity_id, payload) = request.into_parts();
        match self.policy.disposition(actor.role, operation) {
            Disposition::Execute => {
                let effect = replay::apply(
                    self.storage.as_ref(),
                    entity_id,
                    payload,
                    Some(actor.identity.as_str()),
                )
                .await
                .map_err(|failure| {
                    tracing::warn!(
                        actor = %actor,
                        operation = %operation,
                        error = %failure,
                        "direct mutation rejected"
                    );
                    WorkflowError::from(failure)
                })?;

                tracing::info!(
                    actor = %actor,
                    operation = %operation,
                    entity_id = ?entity_id,
                    "mutation applied directly"
                );
                Ok(SubmitOutcome::Executed { effect })
            }
            Disposition::Defer => {
                let task_id = self
                    .ledger
                    .create(entity_id, payload.seal_credentials(), &actor.identity)
                    .await?;

                tracing::info!(
                    task_id = %task_id,
                    actor = %actor,
                    operation = %operation,
                    entity_id = ?entity_id,
                    "mutation deferred for approval"
                );
                Ok(SubmitOutcome::Pending { task_id })
            }
        }
    }

    // ── Resolution ───────────────────────────────────────────────────

    /// Approve or reject a pending task.
    ///
    /// A replay that does not take effect is not an error: the task is marked
    /// `failed` and the outcome carries the reason.
    pub async fn resolve(
        &self,
        task_id: TaskId,
        decision: Decision,
        actor: &Actor,
    ) -> WorkflowResult<ResolveOutcome> {
        if !self.policy.may_resolve_tasks(actor.role) {
            return Err(WorkflowError::Unauthorized {
                actor: actor.to_string(),
                action: format!("{decision} task {task_id}"),
            });
        }

        let _gate = self.resolve_gate.lock().await;

        let task = self.ledger.get(task_id).await?;
        if !task.is_pending() {
            return Err(already_resolved(task_id, task.status));
        }

        match decision {
            Decision::Reject => {
                self.finish(task_id, Resolution::Rejected, actor, None)
                    .await?;
                tracing::info!(task_id = %task_id, actor = %actor, "task rejected");
                Ok(ResolveOutcome::Rejected { task_id })
            }
            Decision::Approve => {
                let description = task.describe();
                let replayed = replay::apply(
                    self.storage.as_ref(),
                    task.entity_id,
                    task.payload,
                    Some(task.created_by.as_str()),
                )
                .await;

                match replayed {
                    Ok(effect) => {
                        if let Err(err) = self
                            .finish(task_id, Resolution::Approved, actor, None)
                            .await
                        {
                            if matches!(err, WorkflowError::Storage(_)) {
                                tracing::error!(
                                    task_id = %task_id,
                                    effect = ?effect,
                                    error = %err,
                                    "replayed effect applied but task left pending"
                                );
                            }
                            return Err(err);
                        }
                        tracing::info!(
                            task_id = %task_id,
                            actor = %actor,
                            task = %description,
                            "task approved and applied"
                        );
                        Ok(ResolveOutcome::Approved { task_id, effect })
                    }
                    Err(failure) => self.fail(task_id, actor, &description, failure).await,
                }
            }
        }
    }

    async fn fail(
        &self,
        task_id: TaskId,
        actor: &Actor,
        description: &str,
        failure: ReplayFailure,
    ) -> WorkflowResult<ResolveOutcome> {
        let detail = failure.to_string();
        tracing::warn!(
            task_id = %task_id,
            actor = %actor,
            task = %description,
            reason = %detail,
            "task replay failed"
        );
        self.finish(task_id, Resolution::Failed, actor, Some(detail.clone()))
            .await?;
        Ok(ResolveOutcome::Failed { task_id, detail })
    }

    /// Record the resolution. A backend failure is retried once.
    async fn finish(
        &self,
        task_id: TaskId,
        resolution: Resolution,
        actor: &Actor,
        detail: Option<String>,
    ) -> WorkflowResult<()> {
        let landed = match self
            .ledger
            .mark_resolved(task_id, resolution, &actor.identity, detail.clone())
            .await
        {
            Err(LedgerError::Backend(first)) => {
                tracing::warn!(task_id = %task_id, error = %first, "retrying task resolution");
                self.ledger
                    .mark_resolved(task_id, resolution, &actor.identity, detail)
                    .await
            }
            other => other,
        }
        .map_err(|err| {
            tracing::error!(task_id = %task_id, error = %err, "failed to record task resolution");
            WorkflowError::from(err)
        })?;
        if landed {
            return Ok(());
        }

        let status = self.ledger.get(task_id).await?.status;
        tracing::warn!(task_id = %task_id, status = %status, "task resolved concurrently");
        Err(already_resolved(task_id, status))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub async fn get_task(&self, task_id: TaskId) -> WorkflowResult<Task> {
        Ok(self.ledger.get(task_id).await?)
    }

    pub async fn list_tasks(&self, status: Option<TaskStatus>) -> WorkflowResult<Vec<Task>> {
        Ok(self.ledger.list(status).await?)
    }

    pub async fn list_accounts(&self, filter: AccountFilter) -> WorkflowResult<Vec<Account>> {
        Ok(self.storage.list_accounts(filter).await?)
    }

    pub async fn list_lookup_entries(
        &self,
        filter: LookupFilter,
    ) -> WorkflowResult<Vec<LookupEntry>> {
        Ok(self.storage.list_lookup_entries(filter).await?)
    }

    pub async fn distinct_data_types(&self) -> WorkflowResult<Vec<String>> {
        Ok(self.storage.distinct_data_types().await?)
    }

    pub async fn find_account(&self, username: &str) -> WorkflowResult<Option<Account>> {
        Ok(self.storage.find_account_by_username(username).await?)
    }

    /// Build the actor for a stored account.
    pub async fn actor_for(&self, username: &str) -> WorkflowResult<Actor> {
        self.find_account(username)
            .await?
            .map(|account| Actor::new(account.username, account.role))
            .ok_or_else(|| WorkflowError::NotFound(format!("account {username}")))
    }

    /// Fails with `Unauthorized` unless `actor` may read governed data.
    pub fn authorize_view(&self, actor: &Actor) -> WorkflowResult<()> {
        if self.policy.may_view_entities(actor.role) {
            Ok(())
        } else {
            Err(WorkflowError::Unauthorized {
                actor: actor.to_string(),
                action: "view governed data".to_string(),
            })
        }
    }

    // ── Bootstrap ────────────────────────────────────────────────────

    /// Create any of `accounts` that do not exist yet, bypassing the ledger.
    ///
    /// Returns the number of accounts created.
    pub async fn bootstrap_accounts(&self, accounts: Vec<AccountDraft>) -> WorkflowResult<usize> {
        let mut created = 0;
        for draft in accounts {
            let username = draft.username.clone();
            match self
                .storage
                .create_account(draft.into_new_account(None), chrono::Utc::now())
                .await
            {
                Ok(account) => {
                    tracing::info!(username = %account.username, role = %account.role, "seeded account");
                    created += 1;
                }
                Err(err) if err.is_conflict() => {
                    tracing::debug!(username = %username, "seed account already present");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(created)
    }
}

fn already_resolved(task_id: TaskId, status: TaskStatus) -> WorkflowError {
    WorkflowError::AlreadyResolved(format!("task {task_id} is {status}"))
}
