//! Load pipeline: classify → normalize → index, fanned out per column.
//!
//! Columns are independent until the final merge, so the per-column stages
//! run on the rayon pool with no shared mutable state. The pattern catalog
//! is built once and borrowed read-only by every worker.

use anyhow::{Context, Result};
use log::{debug, info};
use rayon::prelude::*;

use crate::{
    cell::{RawColumn, RawTable},
    classify::{ClassifierConfig, ColumnTypeDecision, classify_column},
    index::{IndexConfig, build_index},
    normalize::normalize_column,
    patterns::PatternCatalog,
    table::{Table, TableColumn},
};

/// Everything a load needs beyond the raw cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    pub classifier: ClassifierConfig,
    pub index: IndexConfig,
}

/// Classifies every column without normalizing or indexing. Used by the
/// dry-run `classify` command; `build_table` repeats the work cheaply.
pub fn classify_table(
    raw: &RawTable,
    config: &ClassifierConfig,
) -> Result<Vec<(String, ColumnTypeDecision)>> {
    raw.validate()?;
    let catalog = PatternCatalog::new();
    Ok(raw
        .columns
        .par_iter()
        .map(|column| {
            let matches: Vec<_> = column.cells.iter().map(|c| catalog.match_cell(c)).collect();
            let decision = classify_column(&column.cells, &matches, config);
            (column.name.clone(), decision)
        })
        .collect())
}

/// Runs the full pipeline over `raw` and merges the results into a [`Table`].
///
/// Cell-level problems never fail the load; they surface as unparsed counts
/// on the affected columns.
pub fn build_table(name: &str, raw: RawTable, options: &LoadOptions) -> Result<Table> {
    raw.validate()
        .with_context(|| format!("Cannot load table '{name}'"))?;
    let catalog = PatternCatalog::new();
    let columns: Vec<TableColumn> = raw
        .columns
        .par_iter()
        .map(|column| load_column(column, &catalog, options))
        .collect();

    let table = Table::new(name, columns)?;
    info!(
        "Built table '{}': {} column(s), {} row(s)",
        table.name(),
        table.columns().len(),
        table.row_count()
    );
    Ok(table)
}

fn load_column(column: &RawColumn, catalog: &PatternCatalog, options: &LoadOptions) -> TableColumn {
    let matches: Vec<_> = column.cells.iter().map(|c| catalog.match_cell(c)).collect();
    let decision = classify_column(&column.cells, &matches, &options.classifier);
    let data = normalize_column(&column.name, &column.cells, &matches, &decision);
    let index = build_index(&data, &options.index);
    debug!(
        "Column '{}': {} (confidence {:.2}), {} unparsed, index: {}",
        data.name,
        decision.semantic,
        decision.confidence,
        data.unparsed_cells(),
        index.describe()
    );
    TableColumn { data, index }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::RawColumn;
    use crate::patterns::SemanticType;

    #[test]
    fn mixed_table_loads_every_column_type() {
        let raw = RawTable::new(vec![
            RawColumn::from_strings("amount", &["$1,234.56", "(45.00)", "1.2K", "99.95"]),
            RawColumn::from_strings("booked", &["13/01/2024", "02/05/2024", "28/02/2024", ""]),
            RawColumn::from_strings("invoice", &["INV-00123", "INV-00124", "INV-00125", "INV-00126"]),
            RawColumn::from_strings("status", &["open", "open", "closed", "open"]),
        ])
        .unwrap();
        let table = build_table("ledger", raw, &LoadOptions::default()).unwrap();

        assert_eq!(table.row_count(), 4);
        assert_eq!(table.column("amount").unwrap().data.semantic(), SemanticType::Amount);
        assert_eq!(table.column("booked").unwrap().data.semantic(), SemanticType::Date);
        assert_eq!(
            table.column("invoice").unwrap().data.semantic(),
            SemanticType::Identifier
        );
        assert!(table.columns().iter().all(|c| c.index.is_indexed()));
    }

    #[test]
    fn ragged_input_fails_the_load_with_context() {
        let raw = RawTable {
            columns: vec![
                RawColumn::from_strings("a", &["1", "2"]),
                RawColumn::from_strings("b", &["1"]),
            ],
        };
        let err = build_table("bad", raw, &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("bad"), "{err:#}");
    }

    #[test]
    fn classify_table_matches_build_table_decisions() {
        let raw = RawTable::new(vec![
            RawColumn::from_strings("amount", &["$10.00", "$20.00"]),
            RawColumn::from_strings("note", &["alpha", "beta"]),
        ])
        .unwrap();
        let decisions = classify_table(&raw, &ClassifierConfig::default()).unwrap();
        let table = build_table("t", raw, &LoadOptions::default()).unwrap();
        for (name, decision) in decisions {
            let column = table.column(&name).unwrap();
            assert_eq!(column.data.semantic(), decision.semantic);
            assert_eq!(column.data.decision.confidence, decision.confidence);
        }
    }
}
