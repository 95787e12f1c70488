//! Rendering of decisions, diagnostics, and query results for the CLI.
//!
//! Text tables are the default; `inspect` can also serialize the per-column
//! summaries as JSON or YAML for scripting.

use serde::Serialize;

use crate::{
    classify::ColumnTypeDecision,
    normalize::{ColumnValues, render_amount, render_date},
    patterns::DateLayout,
    query::AggregateValue,
    table::Table,
};

/// Serializable per-column diagnostics, the unit of `inspect` output.
#[derive(Debug, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub semantic: String,
    pub confidence: f64,
    pub non_blank_cells: usize,
    pub blank_cells: usize,
    pub ambiguous_cells: usize,
    pub unparsed_cells: usize,
    pub unparsed_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_layout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub index: String,
}

pub fn summarize(table: &Table) -> Vec<ColumnSummary> {
    table
        .columns()
        .iter()
        .map(|column| {
            let decision = &column.data.decision;
            let currency = match &column.data.values {
                ColumnValues::Amount { currency, .. } => Some(currency.clone()),
                _ => None,
            };
            ColumnSummary {
                name: column.data.name.clone(),
                semantic: decision.semantic.to_string(),
                confidence: decision.confidence,
                non_blank_cells: decision.non_blank_cells,
                blank_cells: decision.blank_cells,
                ambiguous_cells: decision.ambiguous_cells,
                unparsed_cells: column.data.unparsed_cells(),
                unparsed_rate: column.data.unparsed_rate(),
                date_layout: decision.date_layout.map(|l| l.to_string()),
                currency,
                index: column.index.describe(),
            }
        })
        .collect()
}

/// Left-aligned text table with a dashed header rule.
pub fn render_text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    render_row(&mut out, headers.iter().map(|h| h.to_string()), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    render_row(&mut out, rule.into_iter(), &widths);
    for row in rows {
        render_row(&mut out, row.iter().cloned(), &widths);
    }
    out
}

fn render_row(out: &mut String, cells: impl Iterator<Item = String>, widths: &[usize]) {
    let padded: Vec<String> = cells
        .enumerate()
        .map(|(i, cell)| {
            let width = widths.get(i).copied().unwrap_or(cell.len());
            format!("{cell:<width$}")
        })
        .collect();
    out.push_str(padded.join("  ").trim_end());
    out.push('\n');
}

pub const SUMMARY_HEADERS: [&str; 8] = [
    "column",
    "type",
    "confidence",
    "unparsed",
    "blank",
    "layout",
    "currency",
    "index",
];

/// Rows for the `load` and `inspect` reports.
pub fn summary_rows(summaries: &[ColumnSummary]) -> Vec<Vec<String>> {
    summaries
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                s.semantic.clone(),
                format!("{:.2}", s.confidence),
                format!("{} ({:.0}%)", s.unparsed_cells, s.unparsed_rate * 100.0),
                s.blank_cells.to_string(),
                s.date_layout.clone().unwrap_or_else(|| "-".to_string()),
                s.currency.clone().unwrap_or_else(|| "-".to_string()),
                s.index.clone(),
            ]
        })
        .collect()
}

/// Rows for the `classify` report.
pub fn decision_rows(decisions: &[(String, ColumnTypeDecision)]) -> Vec<Vec<String>> {
    decisions
        .iter()
        .map(|(name, decision)| {
            vec![
                name.clone(),
                decision.semantic.to_string(),
                format!("{:.2}", decision.confidence),
                decision.non_blank_cells.to_string(),
                decision.blank_cells.to_string(),
                decision.ambiguous_cells.to_string(),
                decision
                    .date_layout
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect()
}

pub const DECISION_HEADERS: [&str; 7] = [
    "column",
    "type",
    "confidence",
    "non-blank",
    "blank",
    "ambiguous",
    "date layout",
];

/// Renders the selected rows of a table in display form, at most `limit`.
pub fn result_rows(table: &Table, rows: &[u32], limit: Option<usize>) -> Vec<Vec<String>> {
    let take = limit.unwrap_or(rows.len());
    rows.iter()
        .take(take)
        .map(|&row| {
            let mut rendered = vec![row.to_string()];
            rendered.extend(
                table
                    .columns()
                    .iter()
                    .map(|column| column.data.render(row as usize)),
            );
            rendered
        })
        .collect()
}

pub fn result_headers(table: &Table) -> Vec<&str> {
    let mut headers = vec!["row"];
    headers.extend(table.columns().iter().map(|c| c.data.name.as_str()));
    headers
}

/// Display form of an aggregate scalar.
pub fn render_aggregate(value: &AggregateValue) -> String {
    match value {
        AggregateValue::Count(n) => n.to_string(),
        AggregateValue::Amount(v) => render_amount(v),
        AggregateValue::Date(v) => render_date(v, DateLayout::Iso),
        AggregateValue::Text(s) => s.clone(),
        AggregateValue::Empty => "(empty)".to_string(),
    }
}
