use serde_json::Value;

use crate::cli::OutputFormat;
use crate::commands::CommandReport;
use crate::error::CliError;

pub fn render(report: &CommandReport, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(report)?
            } else {
                serde_json::to_string(report)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => render_table(report)?,
    }

    Ok(())
}

fn render_table(report: &CommandReport) -> Result<(), CliError> {
    println!("command   : {}", report.command);
    println!("latency_ms: {}", report.latency_ms);

    if !report.warnings.is_empty() {
        println!("warnings:");
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }

    if let Some(lines) = grid(&report.data) {
        for line in lines {
            println!("{line}");
        }
    } else if let Some(queries) = report.data.get("queries").and_then(Value::as_array) {
        for query in queries {
            render_query(query);
        }
    } else {
        println!("data:");
        let pretty_data = serde_json::to_string_pretty(&report.data)?;
        for line in pretty_data.lines() {
            println!("  {line}");
        }
    }

    if !report.errors.is_empty() {
        println!("errors:");
        for error in &report.errors {
            println!("  - {error}");
        }
    }

    Ok(())
}

fn render_query(query: &Value) {
    let name = query.get("name").and_then(Value::as_str).unwrap_or_default();
    if let Some(error) = query.get("error").and_then(Value::as_str) {
        println!("[{name}] failed: {error}");
        return;
    }

    let row_count = query.get("row_count").and_then(Value::as_u64).unwrap_or(0);
    let result_path = query
        .get("result_path")
        .and_then(Value::as_str)
        .unwrap_or_default();
    println!("[{name}] {row_count} rows -> {result_path}");

    let columns = query.get("columns").and_then(Value::as_array);
    let preview = query.get("preview").and_then(Value::as_array);
    if let (Some(columns), Some(preview)) = (columns, preview) {
        for line in grid_lines(columns, preview) {
            println!("  {line}");
        }
    }
}

/// Column-aligned lines for a `{columns, rows}` result set, if `data` is one.
fn grid(data: &Value) -> Option<Vec<String>> {
    let columns = data.get("columns")?.as_array()?;
    let rows = data.get("rows")?.as_array()?;
    Some(grid_lines(columns, rows))
}

fn grid_lines(columns: &[Value], rows: &[Value]) -> Vec<String> {

    let header: Vec<String> = columns
        .iter()
        .map(|column| {
            column
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        })
        .collect();
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            row.as_array()
                .map(|cells| cells.iter().map(cell_text).collect())
                .unwrap_or_default()
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(String::len).collect();
    for row in &body {
        for (index, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(index) {
                *width = (*width).max(cell.len());
            }
        }
    }

    let mut lines = vec![join_padded(&header, &widths)];
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    lines.extend(body.iter().map(|row| join_padded(row, &widths)));
    lines
}

fn join_padded(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
