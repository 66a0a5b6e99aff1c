//! Task review commands

use crate::commands::describe_effect;
use crate::error::CliResult;
use crate::output::{self, or_dash};
use crate::Context;
use clap::Subcommand;
use colored::Colorize;
use govern_types::{Task, TaskId, TaskStatus};
use govern_workflow::{Decision, ResolveOutcome};
use serde::Serialize;
use tabled::Tabled;

/// Task subcommands
#[derive(Subcommand)]
pub enum TaskCommands {
    /// List tasks, newest first
    List {
        /// Only tasks in this status (pending, approved, rejected, failed)
        #[arg(long)]
        status: Option<String>,
    },

    /// Show one task including its payload
    Show { id: i64 },

    /// Approve a pending task and apply it
    Approve { id: i64 },

    /// Reject a pending task
    Reject { id: i64 },
}

#[derive(Serialize, Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Type")]
    task_type: String,
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Target")]
    entity_id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Created by")]
    created_by: String,
    #[tabled(rename = "Created")]
    created_at: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Resolved by")]
    approved_by: String,
    #[tabled(rename = "Failure")]
    failure_detail: String,
}

impl From<Task> for TaskRow {
    fn from(task: Task) -> Self {
        Self {
            id: task.id.get(),
            task_type: task.task_type.to_string(),
            entity: task.entity_kind.label().to_string(),
            entity_id: task
                .entity_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            status: task.status.to_string(),
            description: task.describe(),
            created_by: task.created_by,
            created_at: task.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            approved_by: or_dash(task.approved_by.as_deref()),
            failure_detail: or_dash(task.failure_detail.as_deref()),
        }
    }
}

/// Execute task command
pub(crate) async fn execute(command: TaskCommands, ctx: &Context) -> CliResult<()> {
    match command {
        TaskCommands::List { status } => {
            ctx.viewer().await?;
            let status = status
                .map(|raw| raw.parse::<TaskStatus>())
                .transpose()?;
            let tasks = ctx.engine.list_tasks(status).await?;
            output::render_rows(ctx.format, tasks.into_iter().map(TaskRow::from).collect())
        }
        TaskCommands::Show { id } => show(ctx, TaskId::new(id)).await,
        TaskCommands::Approve { id } => resolve(ctx, TaskId::new(id), Decision::Approve).await,
        TaskCommands::Reject { id } => resolve(ctx, TaskId::new(id), Decision::Reject).await,
    }
}

async fn show(ctx: &Context, id: TaskId) -> CliResult<()> {
    ctx.viewer().await?;
    let task = ctx.engine.get_task(id).await?;
    let payload = serde_json::to_string_pretty(&task.payload)?;
    let json = serde_json::to_value(&task)?;
    output::render(ctx.format, &json, vec![TaskRow::from(task)])?;
    if matches!(ctx.format, output::OutputFormat::Table) {
        println!();
        println!("{}", "Payload".bold());
        println!("{payload}");
    }
    Ok(())
}

async fn resolve(ctx: &Context, id: TaskId, decision: Decision) -> CliResult<()> {
    let actor = ctx.actor().await?;
    let outcome = ctx.engine.resolve(id, decision, &actor).await?;

    match &outcome {
        ResolveOutcome::Approved { task_id, effect } => output::render_value(
            ctx.format,
            &outcome,
            &format!("Task {task_id} approved: {}", describe_effect(effect)),
        ),
        ResolveOutcome::Rejected { task_id } => {
            output::render_value(ctx.format, &outcome, &format!("Task {task_id} rejected"))
        }
        // The task is resolved either way; a failed replay is reported, not raised.
        ResolveOutcome::Failed { task_id, detail } => match ctx.format {
            output::OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                Ok(())
            }
            output::OutputFormat::Table => {
                println!("{}", format!("Task {task_id} failed: {detail}").red());
                Ok(())
            }
        },
    }
}
