//! Account commands

use crate::commands::submit;
use crate::error::{CliError, CliResult};
use crate::fields::field_map;
use crate::output::{self, or_dash};
use crate::Context;
use clap::Subcommand;
use govern_storage::AccountFilter;
use govern_types::{Account, EntityKind, Role};
use govern_workflow::SubmitRequest;
use serde::Serialize;
use tabled::Tabled;

/// Account subcommands
#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create an account (keys: username, password, role, email, full_name, department)
    Create {
        /// Field assignment, repeatable
        #[arg(long = "set", value_name = "KEY=VALUE", required = true)]
        set: Vec<String>,
    },

    /// Update fields of an account
    Update {
        id: i64,
        /// Field assignment, repeatable
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Field to clear, repeatable
        #[arg(long = "clear", value_name = "KEY")]
        clear: Vec<String>,
    },

    /// Delete an account
    Delete { id: i64 },

    /// List accounts
    List {
        /// Only accounts with this role
        #[arg(long)]
        role: Option<String>,
    },
}

#[derive(Serialize, Tabled)]
struct AccountRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Username")]
    username: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Full name")]
    full_name: String,
    #[tabled(rename = "Department")]
    department: String,
    #[tabled(rename = "Created by")]
    created_by: String,
}

impl From<Account> for AccountRow {
    fn from(account: Account) -> Self {
        Self {
            id: account.id.get(),
            username: account.username,
            role: account.role.to_string(),
            email: or_dash(account.email.as_deref()),
            full_name: or_dash(account.full_name.as_deref()),
            department: or_dash(account.department.as_deref()),
            created_by: or_dash(account.created_by.as_deref()),
        }
    }
}

/// Execute account command
pub(crate) async fn execute(command: AccountCommands, ctx: &Context) -> CliResult<()> {
    match command {
        AccountCommands::Create { set } => {
            let fields = field_map(&set, &[])?;
            submit(ctx, SubmitRequest::create(EntityKind::Account, &fields)?).await
        }
        AccountCommands::Update { id, set, clear } => {
            let fields = field_map(&set, &clear)?;
            submit(ctx, SubmitRequest::update(EntityKind::Account, id, &fields)?).await
        }
        AccountCommands::Delete { id } => {
            submit(ctx, SubmitRequest::delete(EntityKind::Account, id)).await
        }
        AccountCommands::List { role } => list(ctx, role.as_deref()).await,
    }
}

async fn list(ctx: &Context, role: Option<&str>) -> CliResult<()> {
    ctx.viewer().await?;
    let role = role
        .map(|raw| {
            Role::parse(raw).ok_or_else(|| CliError::InvalidArgument(format!("unknown role `{raw}`")))
        })
        .transpose()?;

    let accounts = ctx.engine.list_accounts(AccountFilter { role }).await?;
    let rows = accounts.into_iter().map(AccountRow::from).collect();
    output::render_rows(ctx.format, rows)
}
