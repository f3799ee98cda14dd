//! `/database:table`, `/database:column` and `/database:query`.
//!
//! `table` and `column` take an optional list of table names as their text,
//! either `users, orders` or `[users, orders]`; `query` takes the SQL.

use itertools::Itertools;

use crate::collab::{Column, DatabaseGateway, QueryResult, Table};

use super::{CommandContext, CommandFailure, CommandResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DatabaseFunction {
    Table,
    Column,
    Query,
}

impl DatabaseFunction {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "table" => Some(Self::Table),
            "column" => Some(Self::Column),
            "query" | "execute" => Some(Self::Query),
            _ => None,
        }
    }
}

#[tracing::instrument(skip(text, ctx))]
pub fn execute(argument: &str, text: Option<&str>, ctx: &CommandContext<'_>) -> CommandResult {
    let function = DatabaseFunction::from_name(argument.trim()).ok_or_else(|| {
        CommandFailure::new("Database", format!("Unknown database function: {argument}"))
    })?;
    let no_database = || CommandFailure::new("Database", "No database found");
    let gateway = ctx.collaborators.database.as_ref().ok_or_else(no_database)?;

    let connections = gateway.connections();
    let connection = ctx
        .settings
        .database
        .as_ref()
        .filter(|preferred| connections.contains(*preferred))
        .or_else(|| connections.first())
        .ok_or_else(no_database)?;

    let fail = |e: color_eyre::eyre::Report| CommandFailure::from_report("Database", e);
    let text = text.map(str::trim).unwrap_or_default();
    let output = match function {
        DatabaseFunction::Table => {
            let tables = gateway.list_tables(connection).map_err(fail)?;
            let names = table_names(text);
            let tables = tables
                .into_iter()
                .filter(|t| names.is_empty() || names.contains(&t.name.as_str()))
                .collect::<Vec<_>>();
            render_tables(&tables)
        }
        DatabaseFunction::Column => {
            let mut names = table_names(text)
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>();
            if names.is_empty() {
                names = gateway
                    .list_tables(connection)
                    .map_err(fail)?
                    .into_iter()
                    .map(|t| t.name)
                    .collect();
            }
            let tables = names
                .into_iter()
                .map(|name| columns_of(gateway.as_ref(), connection, name))
                .collect::<Result<Vec<_>, _>>()?;
            render_tables(&tables)
        }
        DatabaseFunction::Query => {
            if text.is_empty() {
                return Err(CommandFailure::new("Database", "Query requires SQL"));
            }
            render_rows(&gateway.execute_query(connection, text).map_err(fail)?)
        }
    };
    Ok(Some(output))
}

fn columns_of(gateway: &dyn DatabaseGateway, connection: &str, name: String) -> Result<Table, CommandFailure> {
    let columns = gateway
        .list_columns(connection, &name)
        .map_err(|e| CommandFailure::new("Database", format!("Table not found: {name}: {e:#}")))?;
    Ok(Table { name, columns })
}

fn table_names(text: &str) -> Vec<&str> {
    let text = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(text);
    text.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

fn render_tables(tables: &[Table]) -> String {
    tables
        .iter()
        .map(|table| {
            let columns = table
                .columns
                .iter()
                .map(|Column { name, data_type }| format!("  - {name}: {data_type}"))
                .join("\n");
            if columns.is_empty() {
                format!("Table: {}", table.name)
            } else {
                format!("Table: {}\n{columns}", table.name)
            }
        })
        .join("\n")
}

/// Rows as a Markdown table.
fn render_rows(result: &QueryResult) -> String {
    let mut out = format!("| {} |\n", result.columns.join(" | "));
    out.push_str(&format!(
        "|{}\n",
        result.columns.iter().map(|_| " --- |").collect::<String>()
    ));
    for row in &result.rows {
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}
