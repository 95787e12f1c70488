//! Canonical typed columnar storage.
//!
//! Given raw cells and the column's [`ColumnTypeDecision`], normalization is
//! a total function: every cell lands in a [`Slot`]: a canonical value, an
//! explicit blank, or an explicit unparsed marker. A bad cell never fails
//! the column; it raises the column's unparsed rate instead.

use chrono::{DateTime, NaiveDateTime, Utc};
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    cell::RawCell,
    classify::ColumnTypeDecision,
    patterns::{CellMatch, DateLayout, ExtractedValue, SemanticType, best_match},
};

/// Currency assigned when no cell carries one and none is inferable.
pub const UNKNOWN_CURRENCY: &str = "UNK";

/// One normalized cell. `Unparsed` is distinct from `Blank`: the cell held
/// content that failed to convert under the column's winning type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Slot<T> {
    Value(T),
    Blank,
    Unparsed,
}

impl<T> Slot<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Slot::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_unparsed(&self) -> bool {
        matches!(self, Slot::Unparsed)
    }
}

/// Canonical date cell: epoch seconds, day granularity unless the source
/// carried a time component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateValue {
    pub epoch_seconds: i64,
    pub has_time: bool,
}

impl DateValue {
    pub fn from_timestamp(timestamp: NaiveDateTime, has_time: bool) -> Self {
        let canonical = if has_time {
            timestamp
        } else {
            timestamp.date().and_hms_opt(0, 0, 0).unwrap_or(timestamp)
        };
        Self {
            epoch_seconds: canonical.and_utc().timestamp(),
            has_time,
        }
    }

    pub fn as_naive(&self) -> Option<NaiveDateTime> {
        DateTime::<Utc>::from_timestamp(self.epoch_seconds, 0).map(|dt| dt.naive_utc())
    }
}

/// Typed backing storage for one column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ColumnValues {
    Amount {
        cells: Vec<Slot<Decimal>>,
        currency: String,
    },
    Date {
        cells: Vec<Slot<DateValue>>,
        /// Detected source layout, retained for round-trip display.
        layout: DateLayout,
    },
    Identifier {
        cells: Vec<Slot<String>>,
    },
    Text {
        cells: Vec<Slot<String>>,
    },
}

/// A normalized column: canonical values plus the decision that produced
/// them. Never mutated in place; a reload replaces the whole column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedColumn {
    pub name: String,
    pub decision: ColumnTypeDecision,
    pub values: ColumnValues,
    unparsed_cells: usize,
}

impl NormalizedColumn {
    pub fn len(&self) -> usize {
        match &self.values {
            ColumnValues::Amount { cells, .. } => cells.len(),
            ColumnValues::Date { cells, .. } => cells.len(),
            ColumnValues::Identifier { cells } => cells.len(),
            ColumnValues::Text { cells } => cells.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn semantic(&self) -> SemanticType {
        self.decision.semantic
    }

    pub fn unparsed_cells(&self) -> usize {
        self.unparsed_cells
    }

    /// Unparsed cells over non-blank cells, in [0, 1].
    pub fn unparsed_rate(&self) -> f64 {
        if self.decision.non_blank_cells == 0 {
            0.0
        } else {
            self.unparsed_cells as f64 / self.decision.non_blank_cells as f64
        }
    }

    pub fn amount_at(&self, row: usize) -> Option<Decimal> {
        match &self.values {
            ColumnValues::Amount { cells, .. } => cells.get(row)?.value().copied(),
            _ => None,
        }
    }

    pub fn date_at(&self, row: usize) -> Option<DateValue> {
        match &self.values {
            ColumnValues::Date { cells, .. } => cells.get(row)?.value().copied(),
            _ => None,
        }
    }

    pub fn token_at(&self, row: usize) -> Option<&str> {
        match &self.values {
            ColumnValues::Identifier { cells } | ColumnValues::Text { cells } => {
                cells.get(row)?.value().map(String::as_str)
            }
            _ => None,
        }
    }

    /// Display form of one cell, converting from the canonical encoding only
    /// at this boundary.
    pub fn render(&self, row: usize) -> String {
        match &self.values {
            ColumnValues::Amount { cells, .. } => match cells.get(row) {
                Some(Slot::Value(v)) => render_amount(v),
                Some(Slot::Unparsed) => "<unparsed>".to_string(),
                _ => String::new(),
            },
            ColumnValues::Date { cells, layout } => match cells.get(row) {
                Some(Slot::Value(v)) => render_date(v, *layout),
                Some(Slot::Unparsed) => "<unparsed>".to_string(),
                _ => String::new(),
            },
            ColumnValues::Identifier { cells } | ColumnValues::Text { cells } => {
                match cells.get(row) {
                    Some(Slot::Value(v)) => v.clone(),
                    Some(Slot::Unparsed) => "<unparsed>".to_string(),
                    _ => String::new(),
                }
            }
        }
    }
}

/// Converts raw cells into a [`NormalizedColumn`] under the decided type.
pub fn normalize_column(
    name: &str,
    cells: &[RawCell],
    matches: &[Vec<CellMatch>],
    decision: &ColumnTypeDecision,
) -> NormalizedColumn {
    debug_assert_eq!(cells.len(), matches.len());
    let mut unparsed_cells = 0usize;

    let values = match decision.semantic {
        SemanticType::Amount => {
            let mut out = Vec::with_capacity(cells.len());
            let mut currencies: Vec<&'static str> = Vec::new();
            for (cell, cell_matches) in cells.iter().zip(matches) {
                if cell.is_blank() || matches!(cell, RawCell::Error(_)) {
                    out.push(Slot::Blank);
                    continue;
                }
                match best_match(cell_matches, SemanticType::Amount).map(|m| &m.value) {
                    Some(ExtractedValue::Amount { value, currency }) => {
                        if let Some(code) = *currency {
                            currencies.push(code);
                        }
                        out.push(Slot::Value(*value));
                    }
                    _ => {
                        unparsed_cells += 1;
                        out.push(Slot::Unparsed);
                    }
                }
            }
            ColumnValues::Amount {
                cells: out,
                currency: majority_currency(&currencies),
            }
        }
        SemanticType::Date => {
            let layout = decision.date_layout.unwrap_or(DateLayout::DayFirst);
            let mut out = Vec::with_capacity(cells.len());
            for (cell, cell_matches) in cells.iter().zip(matches) {
                if cell.is_blank() || matches!(cell, RawCell::Error(_)) {
                    out.push(Slot::Blank);
                    continue;
                }
                let chosen = cell_matches.iter().find_map(|m| match &m.value {
                    ExtractedValue::Date {
                        timestamp,
                        layout: cell_layout,
                        has_time,
                    } if layout_accepts(layout, *cell_layout) => Some((*timestamp, *has_time)),
                    _ => None,
                });
                match chosen {
                    Some((timestamp, has_time)) => {
                        out.push(Slot::Value(DateValue::from_timestamp(timestamp, has_time)));
                    }
                    None => {
                        unparsed_cells += 1;
                        out.push(Slot::Unparsed);
                    }
                }
            }
            ColumnValues::Date { cells: out, layout }
        }
        SemanticType::Identifier => {
            let mut out = Vec::with_capacity(cells.len());
            for (cell, cell_matches) in cells.iter().zip(matches) {
                if cell.is_blank() || matches!(cell, RawCell::Error(_)) {
                    out.push(Slot::Blank);
                    continue;
                }
                match best_match(cell_matches, SemanticType::Identifier).map(|m| &m.value) {
                    Some(ExtractedValue::Identifier(token)) => {
                        out.push(Slot::Value(token.clone()));
                    }
                    _ => {
                        unparsed_cells += 1;
                        out.push(Slot::Unparsed);
                    }
                }
            }
            ColumnValues::Identifier { cells: out }
        }
        SemanticType::Text | SemanticType::Unknown => {
            let out = cells
                .iter()
                .map(|cell| match cell.as_text() {
                    Some(text) => Slot::Value(text),
                    None => Slot::Blank,
                })
                .collect();
            ColumnValues::Text { cells: out }
        }
    };

    NormalizedColumn {
        name: name.to_string(),
        decision: decision.clone(),
        values,
        unparsed_cells,
    }
}

/// Whether a cell-level layout is usable in a column resolved to `winner`.
/// Only the slashed day/month layouts compete; everything else is
/// layout-neutral, and in a column that resolved to a non-slashed layout the
/// stray slashed cell keeps its catalog-order reading.
pub(crate) fn layout_accepts(winner: DateLayout, candidate: DateLayout) -> bool {
    !winner.competes_with(candidate)
}

fn majority_currency(observed: &[&'static str]) -> String {
    observed
        .iter()
        .counts()
        .into_iter()
        .max_by_key(|(code, count)| (*count, *code))
        .map(|(code, _)| code.to_string())
        .unwrap_or_else(|| UNKNOWN_CURRENCY.to_string())
}

/// Renders a fixed-point amount with thousands grouping, preserving sign and
/// scale exactly.
pub fn render_amount(value: &Decimal) -> String {
    let text = value.abs().to_string();
    let (integral, fraction) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let digits: Vec<char> = integral.chars().collect();
    let mut grouped = String::with_capacity(text.len() + digits.len() / 3 + 1);
    for (idx, ch) in digits.iter().enumerate() {
        if idx > 0 && (digits.len() - idx).is_multiple_of(3) {
            grouped.push(',');
        }
        grouped.push(*ch);
    }

    let mut out = String::new();
    if value.is_sign_negative() && !value.is_zero() {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

/// Renders a canonical date back in its detected source layout.
pub fn render_date(value: &DateValue, layout: DateLayout) -> String {
    let Some(naive) = value.as_naive() else {
        return String::new();
    };
    let date_part = match layout {
        DateLayout::Iso | DateLayout::Serial => naive.format("%Y-%m-%d").to_string(),
        DateLayout::DayFirst => naive.format("%d/%m/%Y").to_string(),
        DateLayout::MonthFirst => naive.format("%m/%d/%Y").to_string(),
        DateLayout::MonthYear => naive.format("%b %Y").to_string(),
        DateLayout::Quarter => {
            use chrono::Datelike;
            let quarter = naive.date().month0() / 3 + 1;
            format!("Q{} {}", quarter, naive.format("%Y"))
        }
    };
    if value.has_time {
        format!("{} {}", date_part, naive.format("%H:%M:%S"))
    } else {
        date_part
    }
}
