//! Bulk upload commands

use crate::commands::submit;
use crate::error::{CliError, CliResult};
use crate::fields::parse_rows;
use crate::Context;
use clap::Subcommand;
use govern_types::EntityKind;
use govern_workflow::SubmitRequest;
use std::path::{Path, PathBuf};

/// Bulk upload subcommands
#[derive(Subcommand)]
pub enum BulkCommands {
    /// Upload accounts from a JSON array of objects
    Accounts {
        /// Input file
        file: PathBuf,
        /// Source label recorded on the task (defaults to the file name)
        #[arg(long)]
        source: Option<String>,
    },

    /// Upload lookup entries from a JSON array of objects
    Lookups {
        /// Input file
        file: PathBuf,
        /// Source label recorded on the task (defaults to the file name)
        #[arg(long)]
        source: Option<String>,
    },
}

/// Execute bulk command
pub(crate) async fn execute(command: BulkCommands, ctx: &Context) -> CliResult<()> {
    let (entity, file, source) = match command {
        BulkCommands::Accounts { file, source } => (EntityKind::Account, file, source),
        BulkCommands::Lookups { file, source } => (EntityKind::LookupEntry, file, source),
    };

    let raw = std::fs::read_to_string(&file)?;
    let records = parse_rows(&raw)?;
    let source = source.unwrap_or_else(|| source_label(&file));
    tracing::debug!(file = %file.display(), rows = records.len(), "read bulk file");

    let request = SubmitRequest::bulk_upload(entity, source, records)
        .map_err(|err| CliError::InvalidArgument(format!("{}: {err}", file.display())))?;
    submit(ctx, request).await
}

fn source_label(file: &Path) -> String {
    file.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string())
}
