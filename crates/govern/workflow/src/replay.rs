//! Applies a typed payload to the entity store.
//!
//! The same code runs for an administrator's direct mutation and for an
//! approved task, so both paths share one set of semantics.

use crate::error::ReplayFailure;
use crate::outcome::{BulkReport, Effect};
use chrono::Utc;
use govern_storage::{AccountStore, GovernanceStorage, LookupStore};
use govern_types::{
    AccountDraft, AccountId, BulkUpload, EntityKind, LookupDraft, LookupEntryId, PayloadError,
    TaskPayload,
};

pub(crate) async fn apply(
    storage: &dyn GovernanceStorage,
    entity_id: Option<i64>,
    payload: TaskPayload,
    created_by: Option<&str>,
) -> Result<Effect, ReplayFailure> {
    let now = Utc::now();
    let created_by = created_by.map(str::to_string);

    match payload {
        TaskPayload::CreateAccount(draft) => {
            let account = storage
                .create_account(draft.into_new_account(created_by), now)
                .await?;
            Ok(Effect::AccountCreated { account })
        }
        TaskPayload::CreateLookupEntry(draft) => {
            let entry = storage
                .create_lookup_entry(draft.into_new_entry(created_by), now)
                .await?;
            Ok(Effect::LookupEntryCreated { entry })
        }
        TaskPayload::UpdateAccount(patch) => {
            let id = AccountId(target(entity_id, EntityKind::Account)?);
            if storage
                .update_account(id, patch.into_changes(), now)
                .await?
            {
                Ok(Effect::AccountUpdated { id })
            } else {
                Err(missing(EntityKind::Account, id.0))
            }
        }
        TaskPayload::UpdateLookupEntry(patch) => {
            let id = LookupEntryId(target(entity_id, EntityKind::LookupEntry)?);
            if storage.update_lookup_entry(id, patch, now).await? {
                Ok(Effect::LookupEntryUpdated { id })
            } else {
                Err(missing(EntityKind::LookupEntry, id.0))
            }
        }
        TaskPayload::DeleteAccount => {
            let id = AccountId(target(entity_id, EntityKind::Account)?);
            if storage.delete_account(id).await? {
                Ok(Effect::AccountDeleted { id })
            } else {
                Err(missing(EntityKind::Account, id.0))
            }
        }
        TaskPayload::DeleteLookupEntry => {
            let id = LookupEntryId(target(entity_id, EntityKind::LookupEntry)?);
            if storage.delete_lookup_entry(id).await? {
                Ok(Effect::LookupEntryDeleted { id })
            } else {
                Err(missing(EntityKind::LookupEntry, id.0))
            }
        }
        TaskPayload::BulkAccounts(batch) => {
            let report = bulk(storage, EntityKind::Account, batch, created_by).await?;
            Ok(Effect::BulkUpload {
                entity: EntityKind::Account,
                report,
            })
        }
        TaskPayload::BulkLookupEntries(batch) => {
            let report = bulk(storage, EntityKind::LookupEntry, batch, created_by).await?;
            Ok(Effect::BulkUpload {
                entity: EntityKind::LookupEntry,
                report,
            })
        }
        TaskPayload::Unreadable { reason, .. } => {
            Err(ReplayFailure::Malformed(PayloadError::Undecodable(reason)))
        }
    }
}

/// Create each row independently.
///
/// Conflicting and unreadable rows are skipped and counted. A backend failure
/// stops the batch; rows created before it stay committed.
async fn bulk(
    storage: &dyn GovernanceStorage,
    entity: EntityKind,
    batch: BulkUpload,
    created_by: Option<String>,
) -> Result<BulkReport, ReplayFailure> {
    if !batch.is_well_formed() {
        return Err(ReplayFailure::EmptyBatch);
    }

    let mut report = BulkReport::new(batch.source.clone());
    for (row, record) in batch.records.iter().enumerate() {
        let now = Utc::now();
        let created = match entity {
            EntityKind::Account => match AccountDraft::from_fields(record) {
                Ok(draft) => storage
                    .create_account(draft.into_new_account(created_by.clone()), now)
                    .await
                    .map(|_| ()),
                Err(err) => {
                    tracing::warn!(source = %batch.source, row, error = %err, "skipping malformed bulk row");
                    report.malformed += 1;
                    continue;
                }
            },
            EntityKind::LookupEntry => match LookupDraft::from_fields(record) {
                Ok(draft) => storage
                    .create_lookup_entry(draft.into_new_entry(created_by.clone()), now)
                    .await
                    .map(|_| ()),
                Err(err) => {
                    tracing::warn!(source = %batch.source, row, error = %err, "skipping malformed bulk row");
                    report.malformed += 1;
                    continue;
                }
            },
        };

        match created {
            Ok(()) => report.created += 1,
            Err(err) if err.is_conflict() => {
                tracing::info!(source = %batch.source, row, reason = %err, "skipping duplicate bulk row");
                report.conflicts += 1;
            }
            Err(err) => {
                tracing::error!(
                    source = %batch.source,
                    row,
                    created = report.created,
                    error = %err,
                    "bulk upload aborted"
                );
                return Err(err.into());
            }
        }
    }

    tracing::info!(
        source = %report.source,
        entity_type = %entity,
        created = report.created,
        conflicts = report.conflicts,
        malformed = report.malformed,
        "bulk upload applied"
    );
    Ok(report)
}

fn target(entity_id: Option<i64>, entity: EntityKind) -> Result<i64, ReplayFailure> {
    entity_id.ok_or(ReplayFailure::MissingTarget(entity))
}

fn missing(entity: EntityKind, id: i64) -> ReplayFailure {
    ReplayFailure::MissingEntity { entity, id }
}
