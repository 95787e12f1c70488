//! Raw input boundary: the rectangular, column-oriented view of cell values
//! supplied by a spreadsheet-decoding collaborator.
//!
//! Nothing in this module parses file formats. The CLI feeds it through
//! [`crate::ingest`]; library callers construct [`RawTable`] directly.

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

/// One spreadsheet cell value as originally read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawCell {
    Blank,
    Text(String),
    Number(f64),
    /// Error marker carried through from the source (e.g. `#DIV/0!`).
    Error(String),
}

impl RawCell {
    /// Text form handed to the pattern matchers. Numbers are rendered without
    /// exponent notation so the fixed-point parser sees plain digits.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawCell::Blank | RawCell::Error(_) => None,
            RawCell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            RawCell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    Some(format!("{:.0}", n))
                } else {
                    Some(n.to_string())
                }
            }
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            RawCell::Blank => true,
            RawCell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// A named column of raw cells, owned by the source until classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawColumn {
    pub name: String,
    pub cells: Vec<RawCell>,
}

impl RawColumn {
    pub fn new(name: impl Into<String>, cells: Vec<RawCell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    pub fn from_strings<S: AsRef<str>>(name: impl Into<String>, values: &[S]) -> Self {
        let cells = values
            .iter()
            .map(|value| {
                let text = value.as_ref();
                if text.trim().is_empty() {
                    RawCell::Blank
                } else {
                    RawCell::Text(text.to_string())
                }
            })
            .collect();
        Self::new(name, cells)
    }
}

/// Rectangular column-oriented input for one load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTable {
    pub columns: Vec<RawColumn>,
}

impl RawTable {
    pub fn new(columns: Vec<RawColumn>) -> Result<Self> {
        let table = Self { columns };
        table.validate()?;
        Ok(table)
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.cells.len())
    }

    /// Rejects ragged input: every column must hold the same number of rows.
    pub fn validate(&self) -> Result<()> {
        let expected = self.row_count();
        for column in &self.columns {
            ensure!(
                column.cells.len() == expected,
                "Column '{}' has {} row(s), expected {}",
                column.name,
                column.cells.len(),
                expected
            );
        }
        Ok(())
    }
}
