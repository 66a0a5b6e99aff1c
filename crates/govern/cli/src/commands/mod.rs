//! Command families

pub mod account;
pub mod bulk;
pub mod lookup;
pub mod stats;
pub mod task;

use crate::error::CliResult;
use crate::{output, Context};
use govern_workflow::{Effect, SubmitOutcome, SubmitRequest};

/// Submit a mutation as the acting account and report what happened.
pub(crate) async fn submit(ctx: &Context, request: SubmitRequest) -> CliResult<()> {
    let actor = ctx.actor().await?;
    let outcome = ctx.engine.submit(&actor, request).await?;
    let summary = match &outcome {
        SubmitOutcome::Executed { effect } => format!("Applied: {}", describe_effect(effect)),
        SubmitOutcome::Pending { task_id } => {
            format!("Task {task_id} created; awaiting administrator approval")
        }
    };
    output::render_value(ctx.format, &outcome, &summary)
}

pub(crate) fn describe_effect(effect: &Effect) -> String {
    match effect {
        Effect::AccountCreated { account } => {
            format!("created account {} (ID: {})", account.username, account.id)
        }
        Effect::AccountUpdated { id } => format!("updated account {id}"),
        Effect::AccountDeleted { id } => format!("deleted account {id}"),
        Effect::LookupEntryCreated { entry } => format!(
            "created lookup entry {}-{} (ID: {})",
            entry.data_type, entry.code, entry.id
        ),
        Effect::LookupEntryUpdated { id } => format!("updated lookup entry {id}"),
        Effect::LookupEntryDeleted { id } => format!("deleted lookup entry {id}"),
        Effect::BulkUpload { entity, report } => format!(
            "{} {} records created from {} ({} duplicates, {} unreadable rows skipped)",
            report.created,
            entity.label(),
            report.source,
            report.conflicts,
            report.malformed
        ),
    }
}
