//! Lookup entry commands

use crate::commands::submit;
use crate::error::CliResult;
use crate::fields::field_map;
use crate::output::{self, or_dash};
use crate::Context;
use clap::Subcommand;
use govern_storage::LookupFilter;
use govern_types::{EntityKind, LookupEntry};
use govern_workflow::SubmitRequest;
use serde::Serialize;
use tabled::Tabled;

/// Lookup subcommands
#[derive(Subcommand)]
pub enum LookupCommands {
    /// Create a lookup entry (keys: data_type, code, value, description, status)
    Create {
        /// Field assignment, repeatable
        #[arg(long = "set", value_name = "KEY=VALUE", required = true)]
        set: Vec<String>,
    },

    /// Update value, description or status of a lookup entry
    Update {
        id: i64,
        /// Field assignment, repeatable
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Field to clear, repeatable
        #[arg(long = "clear", value_name = "KEY")]
        clear: Vec<String>,
    },

    /// Delete a lookup entry
    Delete { id: i64 },

    /// List lookup entries
    List {
        /// Only entries of this data type
        #[arg(long)]
        data_type: Option<String>,
    },

    /// List the distinct data types
    Types,
}

#[derive(Serialize, Tabled)]
struct LookupRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Data type")]
    data_type: String,
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<LookupEntry> for LookupRow {
    fn from(entry: LookupEntry) -> Self {
        Self {
            id: entry.id.get(),
            data_type: entry.data_type,
            code: entry.code,
            value: entry.value,
            description: or_dash(entry.description.as_deref()),
            status: entry.status.to_string(),
        }
    }
}

#[derive(Serialize, Tabled)]
struct TypeRow {
    #[tabled(rename = "Data type")]
    data_type: String,
}

/// Execute lookup command
pub(crate) async fn execute(command: LookupCommands, ctx: &Context) -> CliResult<()> {
    match command {
        LookupCommands::Create { set } => {
            let fields = field_map(&set, &[])?;
            submit(ctx, SubmitRequest::create(EntityKind::LookupEntry, &fields)?).await
        }
        LookupCommands::Update { id, set, clear } => {
            let fields = field_map(&set, &clear)?;
            submit(
                ctx,
                SubmitRequest::update(EntityKind::LookupEntry, id, &fields)?,
            )
            .await
        }
        LookupCommands::Delete { id } => {
            submit(ctx, SubmitRequest::delete(EntityKind::LookupEntry, id)).await
        }
        LookupCommands::List { data_type } => {
            ctx.viewer().await?;
            let filter = LookupFilter { data_type };
            let entries = ctx.engine.list_lookup_entries(filter).await?;
            output::render_rows(ctx.format, entries.into_iter().map(LookupRow::from).collect())
        }
        LookupCommands::Types => {
            ctx.viewer().await?;
            let types = ctx.engine.distinct_data_types().await?;
            output::render_rows(
                ctx.format,
                types
                    .into_iter()
                    .map(|data_type| TypeRow { data_type })
                    .collect(),
            )
        }
    }
}
