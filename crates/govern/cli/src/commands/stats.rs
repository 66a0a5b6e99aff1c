//! Dashboard statistics

use crate::error::CliResult;
use crate::output::{self, heading, OutputFormat};
use crate::Context;
use colored::Colorize;
use govern_types::TaskStatus;

/// Execute stats command
pub(crate) async fn execute(ctx: &Context) -> CliResult<()> {
    ctx.viewer().await?;
    let overview = ctx.engine.overview().await?;

    if let OutputFormat::Json = ctx.format {
        return output::render_value(ctx.format, &overview, "");
    }

    heading("Accounts");
    println!("  {:<24} {}", "Total", overview.accounts_total);
    for (role, count) in &overview.accounts_by_role {
        println!("  {:<24} {}", role.to_string(), count);
    }
    println!();

    heading("Lookup entries");
    println!("  {:<24} {}", "Total", overview.lookups_total);
    for (data_type, count) in &overview.lookups_by_type {
        println!("  {:<24} {}", data_type, count);
    }
    println!();

    let tasks = &overview.tasks;
    heading("Tasks");
    println!("  {:<24} {}", "Total", tasks.total);
    for status in TaskStatus::ALL {
        let line = format!("  {:<24} {}", status.to_string(), tasks.count(status));
        if status == TaskStatus::Pending && tasks.count(status) > 0 {
            println!("{}", line.yellow());
        } else {
            println!("{line}");
        }
    }
    for (task_type, count) in &tasks.by_type {
        println!("  {:<24} {}", task_type.to_string(), count);
    }

    if !tasks.recent.is_empty() {
        println!();
        heading("Recent tasks");
        for task in &tasks.recent {
            println!(
                "  #{:<5} {:<10} {:<8} {}",
                task.id,
                task.status.to_string(),
                task.created_by,
                task.describe()
            );
        }
    }
    Ok(())
}
