// Writing report artifacts and printing console previews.
//
// Typed rows go through `csv::Writer::serialize`; the revenue table has
// dynamic period columns and is written record by record. Previews are
// markdown tables rendered with `tabled`.
use crate::error::ReportResult;
use crate::types::ReportTable;
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};
use tracing::info;

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> ReportResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    info!(path = %path.display(), rows = rows.len(), "wrote csv");
    Ok(())
}

/// Period columns vary per report, so the table is written record by record.
pub fn write_table_csv(path: &Path, table: &ReportTable) -> ReportResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    info!(path = %path.display(), rows = table.rows.len(), "wrote report table");
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> ReportResult<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    info!(path = %path.display(), "wrote json");
    Ok(())
}

pub fn render_table(table: &ReportTable, max_rows: usize) -> String {
    let mut builder = Builder::default();
    builder.push_record(table.headers.iter().cloned());
    for row in table.rows.iter().take(max_rows) {
        builder.push_record(row.iter().cloned());
    }
    let mut rendered = builder.build();
    rendered.with(Style::markdown());
    rendered.to_string()
}

pub fn preview_table(table: &ReportTable, max_rows: usize) {
    if table.rows.is_empty() {
        println!("(no rows)\n");
        return;
    }
    println!("{}\n", render_table(table, max_rows));
}

/// Markdown rendering of at most `max_rows` typed rows, or `None` if there
/// is nothing to show.
pub fn render_rows<T: Tabled>(rows: &[T], max_rows: usize) -> Option<String> {
    if rows.is_empty() || max_rows == 0 {
        return None;
    }
    let mut rendered = Table::new(rows.iter().take(max_rows));
    rendered.with(Style::markdown());
    Some(rendered.to_string())
}

pub fn preview_table_rows<T: Tabled>(rows: &[T], max_rows: usize) {
    match render_rows(rows, max_rows) {
        Some(text) => println!("{}\n", text),
        None => println!("(no rows)\n"),
    }
}
