//! Per-column lookup indexes built after normalization.
//!
//! Amount and Date columns get ordered maps so range predicates can walk a
//! key interval; Identifier and Text columns get hash maps for equality.
//! High-cardinality token columns skip indexing, and queries against them
//! fall back to a scan with identical results.

use std::collections::{BTreeMap, HashMap};

use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    normalize::{ColumnValues, NormalizedColumn, Slot},
    patterns::SemanticType,
};

/// Tunable indexing constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Token columns whose distinct-value ratio exceeds this are left
    /// unindexed; the index would be as large as the column itself.
    pub max_distinct_ratio: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_distinct_ratio: 0.5,
        }
    }
}

/// Why a column carries no index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnindexedReason {
    HighCardinality,
    UnknownType,
}

impl UnindexedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnindexedReason::HighCardinality => "high cardinality",
            UnindexedReason::UnknownType => "unknown type",
        }
    }
}

/// One column's index. Row offsets within each key are kept in ascending
/// order so query output is deterministic.
#[derive(Debug, Clone)]
pub enum ColumnIndex {
    /// Ordered by canonical value; keys are normalized so equal amounts at
    /// different scales share one entry.
    Amount(BTreeMap<Decimal, Vec<u32>>),
    /// Ordered by epoch seconds.
    Date(BTreeMap<i64, Vec<u32>>),
    /// Equality-only token lookup.
    Equality(HashMap<String, Vec<u32>>),
    Unindexed(UnindexedReason),
}

impl ColumnIndex {
    pub fn is_indexed(&self) -> bool {
        !matches!(self, ColumnIndex::Unindexed(_))
    }

    pub fn describe(&self) -> String {
        match self {
            ColumnIndex::Amount(map) => format!("ordered, {} distinct amount(s)", map.len()),
            ColumnIndex::Date(map) => format!("ordered, {} distinct date(s)", map.len()),
            ColumnIndex::Equality(map) => format!("equality, {} distinct token(s)", map.len()),
            ColumnIndex::Unindexed(reason) => format!("unindexed ({})", reason.as_str()),
        }
    }
}

/// Builds the index for one normalized column. Blank and unparsed cells are
/// never indexed; they are unreachable through any predicate.
pub fn build_index(column: &NormalizedColumn, config: &IndexConfig) -> ColumnIndex {
    match &column.values {
        ColumnValues::Amount { cells, .. } => {
            let mut map: BTreeMap<Decimal, Vec<u32>> = BTreeMap::new();
            for (row, slot) in cells.iter().enumerate() {
                if let Slot::Value(value) = slot {
                    map.entry(value.normalize()).or_default().push(row as u32);
                }
            }
            ColumnIndex::Amount(map)
        }
        ColumnValues::Date { cells, .. } => {
            let mut map: BTreeMap<i64, Vec<u32>> = BTreeMap::new();
            for (row, slot) in cells.iter().enumerate() {
                if let Slot::Value(value) = slot {
                    map.entry(value.epoch_seconds).or_default().push(row as u32);
                }
            }
            ColumnIndex::Date(map)
        }
        ColumnValues::Identifier { cells } | ColumnValues::Text { cells } => {
            if column.semantic() == SemanticType::Unknown {
                return ColumnIndex::Unindexed(UnindexedReason::UnknownType);
            }
            let mut map: HashMap<String, Vec<u32>> = HashMap::new();
            let mut populated = 0usize;
            for (row, slot) in cells.iter().enumerate() {
                if let Slot::Value(token) = slot {
                    populated += 1;
                    map.entry(token.clone()).or_default().push(row as u32);
                }
            }
            if populated == 0 {
                return ColumnIndex::Unindexed(UnindexedReason::UnknownType);
            }
            let distinct_ratio = map.len() as f64 / populated as f64;
            if distinct_ratio > config.max_distinct_ratio {
                warn!(
                    "Column '{}': distinct ratio {:.2} exceeds {:.2}; equality queries will scan",
                    column.name, distinct_ratio, config.max_distinct_ratio
                );
                return ColumnIndex::Unindexed(UnindexedReason::HighCardinality);
            }
            ColumnIndex::Equality(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::RawColumn;
    use crate::classify::{ClassifierConfig, classify_column};
    use crate::normalize::normalize_column;
    use crate::patterns::PatternCatalog;

    fn indexed(values: &[&str], config: &IndexConfig) -> (NormalizedColumn, ColumnIndex) {
        let column = RawColumn::from_strings("col", values);
        let catalog = PatternCatalog::new();
        let matches: Vec<_> = column.cells.iter().map(|c| catalog.match_cell(c)).collect();
        let decision = classify_column(&column.cells, &matches, &ClassifierConfig::default());
        let normalized = normalize_column(&column.name, &column.cells, &matches, &decision);
        let index = build_index(&normalized, config);
        (normalized, index)
    }

    #[test]
    fn amount_index_orders_keys_and_rows() {
        let (_, index) = indexed(&["$30.00", "$10.00", "$20.00", "$10.00"], &IndexConfig::default());
        match index {
            ColumnIndex::Amount(map) => {
                let rows: Vec<Vec<u32>> = map.values().cloned().collect();
                assert_eq!(rows, vec![vec![1, 3], vec![2], vec![0]]);
            }
            other => panic!("unexpected index: {other:?}"),
        }
    }

    #[test]
    fn blank_and_unparsed_cells_are_excluded() {
        let (column, index) = indexed(
            &["$10.00", "", "oops", "$10.00", "$20.00"],
            &IndexConfig::default(),
        );
        assert_eq!(column.unparsed_cells(), 1);
        match index {
            ColumnIndex::Amount(map) => {
                let total: usize = map.values().map(Vec::len).sum();
                assert_eq!(total, 3);
            }
            other => panic!("unexpected index: {other:?}"),
        }
    }

    #[test]
    fn high_cardinality_text_skips_indexing() {
        let values: Vec<String> = (0..40).map(|i| format!("free-form note number {i}")).collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let (_, index) = indexed(&refs, &IndexConfig::default());
        assert_eq!(
            match index {
                ColumnIndex::Unindexed(reason) => Some(reason),
                _ => None,
            },
            Some(UnindexedReason::HighCardinality)
        );
    }

    #[test]
    fn low_cardinality_text_gets_equality_index() {
        let (_, index) = indexed(
            &["shipped", "pending", "shipped", "shipped", "shipped", "shipped", "pending", "shipped"],
            &IndexConfig::default(),
        );
        match index {
            ColumnIndex::Equality(map) => {
                assert_eq!(map["shipped"], vec![0, 2, 3, 4, 5, 7]);
                assert_eq!(map["pending"], vec![1, 6]);
            }
            other => panic!("unexpected index: {other:?}"),
        }
    }

    #[test]
    fn all_blank_column_is_unindexed() {
        let (_, index) = indexed(&["", "", ""], &IndexConfig::default());
        assert_eq!(
            match index {
                ColumnIndex::Unindexed(reason) => Some(reason),
                _ => None,
            },
            Some(UnindexedReason::UnknownType)
        );
    }

    #[test]
    fn scale_variants_share_one_amount_key() {
        let (_, index) = indexed(&["1.2K", "1200.00", "1200"], &IndexConfig::default());
        match index {
            ColumnIndex::Amount(map) => {
                assert_eq!(map.len(), 1);
                assert_eq!(map.values().next().unwrap(), &vec![0, 1, 2]);
            }
            other => panic!("unexpected index: {other:?}"),
        }
    }
}
