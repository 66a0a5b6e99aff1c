//! Output formatting for CLI

use crate::error::CliResult;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print `rows` as a table, or `value` as JSON.
pub fn render<T, R>(format: OutputFormat, value: &T, rows: Vec<R>) -> CliResult<()>
where
    T: Serialize + ?Sized,
    R: Tabled,
{
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Table if rows.is_empty() => println!("{}", "(none)".dimmed()),
        OutputFormat::Table => println!("{}", Table::new(rows)),
    }
    Ok(())
}

/// Print `value` as JSON, or a one-line summary.
pub fn render_value<T: Serialize + ?Sized>(
    format: OutputFormat,
    value: &T,
    summary: &str,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Table => println!("{}", summary.green()),
    }
    Ok(())
}

/// Section heading for table output.
pub fn heading(title: &str) {
    println!("{}", title.bold().cyan());
    println!("{}", "=".repeat(50));
}

pub fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

/// Print serializable rows as a table or a JSON array.
pub fn render_rows<R>(format: OutputFormat, rows: Vec<R>) -> CliResult<()>
where
    R: Serialize + Tabled,
{
    let json = match format {
        OutputFormat::Json => serde_json::to_value(&rows)?,
        OutputFormat::Table => serde_json::Value::Null,
    };
    render(format, &json, rows)
}
