//! Predicate and aggregate evaluation over loaded tables.
//!
//! Every predicate has two result-identical paths: an index walk and a full
//! scan. [`evaluate`] prefers the index when the column has one;
//! [`full_scan`] forces the scan and exists so equivalence stays testable.
//! Malformed queries fail with a typed [`QueryError`] naming the offending
//! column; an empty result always means no rows matched.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    cell::RawCell,
    index::ColumnIndex,
    normalize::{ColumnValues, DateValue, NormalizedColumn, Slot, layout_accepts},
    patterns::{ExtractedValue, PatternCatalog, SemanticType, best_match},
    table::{Table, TableColumn},
};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("column '{0}' does not exist")]
    ColumnNotFound(String),
    #[error("column '{0}' has unknown type and cannot be queried")]
    UnknownColumnType(String),
    #[error("column '{column}' holds {found} values but the predicate supplies {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: SemanticType,
    },
    #[error("cannot read '{raw}' as {expected} for column '{column}'")]
    BadLiteral {
        column: String,
        expected: &'static str,
        raw: String,
    },
    #[error("invalid filter '{0}', expected COLUMN OP VALUE with OP in = != > >= < <=")]
    BadFilter(String),
    #[error("aggregate '{op}' is not supported on {semantic} column '{column}'")]
    UnsupportedAggregate {
        op: AggregateOp,
        column: String,
        semantic: SemanticType,
    },
    #[error("fixed-point overflow aggregating column '{0}'")]
    Overflow(String),
    #[error(
        "relational delegate disagreed on table '{table}': {direct} direct row(s) vs {delegated} delegated"
    )]
    DelegateMismatch {
        table: String,
        direct: usize,
        delegated: usize,
    },
}

/// A typed comparison value. Filters coerce their raw text into the variant
/// the target column expects before evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Amount(Decimal),
    Date(NaiveDate),
    Text(String),
}

static CATALOG: LazyLock<PatternCatalog> = LazyLock::new(PatternCatalog::new);

impl Literal {
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Amount(_) => "an amount",
            Literal::Date(_) => "a date",
            Literal::Text(_) => "text",
        }
    }

    /// Reads `raw` the way cells of `column` were read, so `--filter
    /// "amount > 1.2K"` and `"booked = 02/05/2024"` mean what the loaded
    /// data means.
    pub fn coerce(raw: &str, column: &NormalizedColumn) -> Result<Self, QueryError> {
        let cell = RawCell::Text(raw.to_string());
        match &column.values {
            ColumnValues::Amount { .. } => {
                let matches = CATALOG.match_cell(&cell);
                match best_match(&matches, SemanticType::Amount).map(|m| &m.value) {
                    Some(ExtractedValue::Amount { value, .. }) => Ok(Literal::Amount(*value)),
                    _ => Err(QueryError::BadLiteral {
                        column: column.name.clone(),
                        expected: "an amount",
                        raw: raw.to_string(),
                    }),
                }
            }
            ColumnValues::Date { layout, .. } => {
                let matches = CATALOG.match_cell(&cell);
                let date = matches.iter().find_map(|m| match &m.value {
                    ExtractedValue::Date {
                        timestamp,
                        layout: cell_layout,
                        ..
                    } if layout_accepts(*layout, *cell_layout) => Some(timestamp.date()),
                    _ => None,
                });
                date.map(Literal::Date).ok_or_else(|| QueryError::BadLiteral {
                    column: column.name.clone(),
                    expected: "a date",
                    raw: raw.to_string(),
                })
            }
            ColumnValues::Identifier { .. } | ColumnValues::Text { .. } => {
                if column.semantic() == SemanticType::Unknown {
                    Err(QueryError::UnknownColumnType(column.name.clone()))
                } else {
                    Ok(Literal::Text(raw.to_string()))
                }
            }
        }
    }
}

fn literal_cmp(a: &Literal, b: &Literal) -> Option<Ordering> {
    match (a, b) {
        (Literal::Amount(x), Literal::Amount(y)) => Some(x.cmp(y)),
        (Literal::Date(x), Literal::Date(y)) => Some(x.cmp(y)),
        (Literal::Text(x), Literal::Text(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// The predicate taxonomy. `All` is conjunction; planning merges its
/// same-column range bounds so a single index walk can serve them.
#[derive(Debug, Clone)]
pub enum Predicate {
    Equals {
        column: String,
        value: Literal,
    },
    NotEquals {
        column: String,
        value: Literal,
    },
    Range {
        column: String,
        lo: Bound<Literal>,
        hi: Bound<Literal>,
    },
    All(Vec<Predicate>),
}

/// Evaluates a predicate, using indexes where the columns carry them.
/// Equality results are in ascending row order; range results in ascending
/// value order (ties by row).
pub fn evaluate(table: &Table, predicate: &Predicate) -> Result<Vec<u32>, QueryError> {
    eval(table, predicate, true)
}

/// Scan-only evaluation, result-identical to [`evaluate`].
pub fn full_scan(table: &Table, predicate: &Predicate) -> Result<Vec<u32>, QueryError> {
    eval(table, predicate, false)
}

fn eval(table: &Table, predicate: &Predicate, use_index: bool) -> Result<Vec<u32>, QueryError> {
    match predicate {
        Predicate::Equals { column, value } => eval_equals(table, column, value, use_index),
        Predicate::NotEquals { column, value } => eval_not_equals(table, column, value),
        Predicate::Range { column, lo, hi } => eval_range(table, column, lo, hi, use_index),
        Predicate::All(predicates) => {
            let planned = plan(predicates);
            match planned.len() {
                0 => Ok((0..table.row_count() as u32).collect()),
                1 => eval(table, &planned[0], use_index),
                _ => {
                    let mut iter = planned.iter();
                    let mut rows: BTreeSet<u32> = eval(table, iter.next().unwrap_or(&planned[0]), use_index)?
                        .into_iter()
                        .collect();
                    for predicate in iter {
                        let next: BTreeSet<u32> =
                            eval(table, predicate, use_index)?.into_iter().collect();
                        rows = rows.intersection(&next).copied().collect();
                    }
                    Ok(rows.into_iter().collect())
                }
            }
        }
    }
}

fn lookup<'t>(table: &'t Table, column: &str) -> Result<&'t TableColumn, QueryError> {
    let found = table
        .column(column)
        .ok_or_else(|| QueryError::ColumnNotFound(column.to_string()))?;
    if found.data.semantic() == SemanticType::Unknown {
        return Err(QueryError::UnknownColumnType(column.to_string()));
    }
    Ok(found)
}

fn mismatch(column: &str, value: &Literal, found: SemanticType) -> QueryError {
    QueryError::TypeMismatch {
        column: column.to_string(),
        expected: value.kind(),
        found,
    }
}

fn eval_equals(
    table: &Table,
    column: &str,
    value: &Literal,
    use_index: bool,
) -> Result<Vec<u32>, QueryError> {
    let col = lookup(table, column)?;
    match (&col.data.values, value) {
        (ColumnValues::Amount { cells, .. }, Literal::Amount(target)) => {
            let key = target.normalize();
            if use_index && let ColumnIndex::Amount(map) = &col.index {
                return Ok(map.get(&key).cloned().unwrap_or_default());
            }
            Ok(amount_rows(cells, |v| v == &key))
        }
        (ColumnValues::Date { cells, .. }, Literal::Date(target)) => {
            let key = midnight_epoch(*target);
            if use_index && let ColumnIndex::Date(map) = &col.index {
                return Ok(map.get(&key).cloned().unwrap_or_default());
            }
            Ok(date_rows(cells, |v| v.epoch_seconds == key))
        }
        (
            ColumnValues::Identifier { cells } | ColumnValues::Text { cells },
            Literal::Text(target),
        ) => {
            if use_index && let ColumnIndex::Equality(map) = &col.index {
                return Ok(map.get(target).cloned().unwrap_or_default());
            }
            Ok(token_rows(cells, |v| v == target.as_str()))
        }
        _ => Err(mismatch(column, value, col.data.semantic())),
    }
}

/// `!=` is scan-only on every column type; it matches parsed cells whose
/// value differs. Blank and unparsed cells never match.
fn eval_not_equals(table: &Table, column: &str, value: &Literal) -> Result<Vec<u32>, QueryError> {
    let col = lookup(table, column)?;
    match (&col.data.values, value) {
        (ColumnValues::Amount { cells, .. }, Literal::Amount(target)) => {
            let key = target.normalize();
            Ok(amount_rows(cells, |v| v != &key))
        }
        (ColumnValues::Date { cells, .. }, Literal::Date(target)) => {
            let key = midnight_epoch(*target);
            Ok(date_rows(cells, |v| v.epoch_seconds != key))
        }
        (
            ColumnValues::Identifier { cells } | ColumnValues::Text { cells },
            Literal::Text(target),
        ) => Ok(token_rows(cells, |v| v != target.as_str())),
        _ => Err(mismatch(column, value, col.data.semantic())),
    }
}

fn eval_range(
    table: &Table,
    column: &str,
    lo: &Bound<Literal>,
    hi: &Bound<Literal>,
    use_index: bool,
) -> Result<Vec<u32>, QueryError> {
    let col = lookup(table, column)?;
    match &col.data.values {
        ColumnValues::Amount { cells, .. } => {
            let lo = amount_bound(lo, column, col.data.semantic())?;
            let hi = amount_bound(hi, column, col.data.semantic())?;
            if bounds_empty(&lo, &hi) {
                return Ok(Vec::new());
            }
            if use_index && let ColumnIndex::Amount(map) = &col.index {
                return Ok(map.range((lo, hi)).flat_map(|(_, rows)| rows.iter().copied()).collect());
            }
            let mut hits: Vec<(Decimal, u32)> = cells
                .iter()
                .enumerate()
                .filter_map(|(row, slot)| slot.value().map(|v| (v.normalize(), row as u32)))
                .filter(|(v, _)| in_bounds(&lo, &hi, v))
                .collect();
            hits.sort();
            Ok(hits.into_iter().map(|(_, row)| row).collect())
        }
        ColumnValues::Date { cells, .. } => {
            let lo = date_bound(lo, column)?;
            let hi = date_bound(hi, column)?;
            if bounds_empty(&lo, &hi) {
                return Ok(Vec::new());
            }
            if use_index && let ColumnIndex::Date(map) = &col.index {
                return Ok(map.range((lo, hi)).flat_map(|(_, rows)| rows.iter().copied()).collect());
            }
            let mut hits: Vec<(i64, u32)> = cells
                .iter()
                .enumerate()
                .filter_map(|(row, slot)| slot.value().map(|v| (v.epoch_seconds, row as u32)))
                .filter(|(v, _)| in_bounds(&lo, &hi, v))
                .collect();
            hits.sort();
            Ok(hits.into_iter().map(|(_, row)| row).collect())
        }
        _ => Err(QueryError::TypeMismatch {
            column: column.to_string(),
            expected: "an ordered (amount or date) range",
            found: col.data.semantic(),
        }),
    }
}

fn amount_rows(cells: &[Slot<Decimal>], keep: impl Fn(&Decimal) -> bool) -> Vec<u32> {
    cells
        .iter()
        .enumerate()
        .filter_map(|(row, slot)| {
            slot.value()
                .filter(|v| keep(&v.normalize()))
                .map(|_| row as u32)
        })
        .collect()
}

fn date_rows(cells: &[Slot<DateValue>], keep: impl Fn(&DateValue) -> bool) -> Vec<u32> {
    cells
        .iter()
        .enumerate()
        .filter_map(|(row, slot)| slot.value().filter(|v| keep(v)).map(|_| row as u32))
        .collect()
}

fn token_rows(cells: &[Slot<String>], keep: impl Fn(&str) -> bool) -> Vec<u32> {
    cells
        .iter()
        .enumerate()
        .filter_map(|(row, slot)| slot.value().filter(|v| keep(v)).map(|_| row as u32))
        .collect()
}

/// Day-granularity dates canonicalize to midnight; literals do the same.
fn midnight_epoch(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

fn amount_bound(
    bound: &Bound<Literal>,
    column: &str,
    found: SemanticType,
) -> Result<Bound<Decimal>, QueryError> {
    Ok(match bound {
        Bound::Unbounded => Bound::Unbounded,
        Bound::Included(Literal::Amount(v)) => Bound::Included(v.normalize()),
        Bound::Excluded(Literal::Amount(v)) => Bound::Excluded(v.normalize()),
        Bound::Included(other) | Bound::Excluded(other) => {
            return Err(mismatch(column, other, found));
        }
    })
}

fn date_bound(bound: &Bound<Literal>, column: &str) -> Result<Bound<i64>, QueryError> {
    Ok(match bound {
        Bound::Unbounded => Bound::Unbounded,
        Bound::Included(Literal::Date(v)) => Bound::Included(midnight_epoch(*v)),
        Bound::Excluded(Literal::Date(v)) => Bound::Excluded(midnight_epoch(*v)),
        Bound::Included(other) | Bound::Excluded(other) => {
            return Err(mismatch(column, other, SemanticType::Date));
        }
    })
}

/// True when no value can satisfy both bounds. `BTreeMap::range` panics on
/// inverted ranges, so this is checked first on both paths.
fn bounds_empty<T: Ord>(lo: &Bound<T>, hi: &Bound<T>) -> bool {
    match (lo, hi) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
        (Bound::Included(a), Bound::Included(b)) => a > b,
        (Bound::Included(a), Bound::Excluded(b))
        | (Bound::Excluded(a), Bound::Included(b))
        | (Bound::Excluded(a), Bound::Excluded(b)) => a >= b,
    }
}

fn in_bounds<T: Ord>(lo: &Bound<T>, hi: &Bound<T>, value: &T) -> bool {
    let above = match lo {
        Bound::Unbounded => true,
        Bound::Included(a) => value >= a,
        Bound::Excluded(a) => value > a,
    };
    let below = match hi {
        Bound::Unbounded => true,
        Bound::Included(b) => value <= b,
        Bound::Excluded(b) => value < b,
    };
    above && below
}

/// Flattens nested conjunctions and merges same-column range bounds into a
/// single `Range` so the ordered index can serve them in one walk. Bounds
/// that cannot be compared (mixed literal types) are left unmerged; the
/// type error surfaces during evaluation.
fn plan(predicates: &[Predicate]) -> Vec<Predicate> {
    let mut flat = Vec::new();
    flatten(predicates, &mut flat);

    let mut planned: Vec<Predicate> = Vec::new();
    let mut range_slots: HashMap<String, usize> = HashMap::new();
    for predicate in flat {
        match predicate {
            Predicate::Range { column, lo, hi } => {
                let merged = range_slots.get(&column).copied().and_then(|slot| {
                    let Predicate::Range {
                        lo: cur_lo, hi: cur_hi, ..
                    } = &mut planned[slot]
                    else {
                        return None;
                    };
                    let new_lo = tighter(cur_lo, &lo, Ordering::Greater)?;
                    let new_hi = tighter(cur_hi, &hi, Ordering::Less)?;
                    *cur_lo = new_lo;
                    *cur_hi = new_hi;
                    Some(())
                });
                if merged.is_none() {
                    range_slots.entry(column.clone()).or_insert(planned.len());
                    planned.push(Predicate::Range { column, lo, hi });
                }
            }
            other => planned.push(other),
        }
    }
    planned
}

fn flatten(predicates: &[Predicate], out: &mut Vec<Predicate>) {
    for predicate in predicates {
        match predicate {
            Predicate::All(inner) => flatten(inner, out),
            other => out.push(other.clone()),
        }
    }
}

/// Picks the tighter of two bounds; `prefer` is the ordering (of the
/// incoming value against the current one) that makes the incoming bound
/// win: `Greater` for lower bounds, `Less` for upper bounds.
fn tighter(
    current: &Bound<Literal>,
    incoming: &Bound<Literal>,
    prefer: Ordering,
) -> Option<Bound<Literal>> {
    match (current, incoming) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => Some(other.clone()),
        (
            Bound::Included(a) | Bound::Excluded(a),
            Bound::Included(b) | Bound::Excluded(b),
        ) => {
            let ordering = literal_cmp(b, a)?;
            if ordering == prefer {
                Some(incoming.clone())
            } else if ordering == Ordering::Equal
                && (matches!(current, Bound::Excluded(_)) || matches!(incoming, Bound::Excluded(_)))
            {
                Some(Bound::Excluded(a.clone()))
            } else {
                Some(current.clone())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Count,
    Sum,
    Min,
    Max,
    Average,
}

impl AggregateOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Average => "avg",
        }
    }
}

impl std::fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AggregateOp {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "count" => Ok(AggregateOp::Count),
            "sum" => Ok(AggregateOp::Sum),
            "min" => Ok(AggregateOp::Min),
            "max" => Ok(AggregateOp::Max),
            "avg" | "average" => Ok(AggregateOp::Average),
            other => Err(QueryError::BadFilter(format!("unknown aggregate '{other}'"))),
        }
    }
}

/// A scalar aggregate result, still in canonical encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateValue {
    Count(usize),
    Amount(Decimal),
    Date(DateValue),
    Text(String),
    /// Min/max/average over zero parsed values.
    Empty,
}

/// Computes one aggregate over `rows` (all rows when `None`). Only parsed
/// cells contribute; blanks and unparsed markers are skipped, including by
/// `count`. Amount arithmetic stays in fixed point; overflow is an error,
/// never a wrap or a float.
pub fn aggregate(
    table: &Table,
    op: AggregateOp,
    column: &str,
    rows: Option<&[u32]>,
) -> Result<AggregateValue, QueryError> {
    let col = lookup(table, column)?;
    let row_indices: Vec<usize> = match rows {
        Some(rows) => rows.iter().map(|&r| r as usize).collect(),
        None => (0..table.row_count()).collect(),
    };

    match op {
        AggregateOp::Count => {
            let parsed = row_indices
                .iter()
                .filter(|&&row| is_parsed(&col.data, row))
                .count();
            Ok(AggregateValue::Count(parsed))
        }
        AggregateOp::Sum | AggregateOp::Average => match &col.data.values {
            ColumnValues::Amount { cells, .. } => {
                let mut sum = Decimal::ZERO;
                let mut parsed = 0usize;
                for &row in &row_indices {
                    if let Some(Slot::Value(v)) = cells.get(row) {
                        sum = sum
                            .checked_add(*v)
                            .ok_or_else(|| QueryError::Overflow(column.to_string()))?;
                        parsed += 1;
                    }
                }
                if op == AggregateOp::Sum {
                    Ok(AggregateValue::Amount(sum))
                } else if parsed == 0 {
                    Ok(AggregateValue::Empty)
                } else {
                    sum.checked_div(Decimal::from(parsed))
                        .map(AggregateValue::Amount)
                        .ok_or_else(|| QueryError::Overflow(column.to_string()))
                }
            }
            _ => Err(QueryError::UnsupportedAggregate {
                op,
                column: column.to_string(),
                semantic: col.data.semantic(),
            }),
        },
        AggregateOp::Min | AggregateOp::Max => extreme(&col.data, op, &row_indices),
    }
}

fn extreme(
    column: &NormalizedColumn,
    op: AggregateOp,
    rows: &[usize],
) -> Result<AggregateValue, QueryError> {
    let want_max = op == AggregateOp::Max;
    match &column.values {
        ColumnValues::Amount { cells, .. } => {
            let values = rows.iter().filter_map(|&row| cells.get(row)?.value());
            let result = if want_max { values.max() } else { values.min() };
            Ok(result.map_or(AggregateValue::Empty, |v| AggregateValue::Amount(*v)))
        }
        ColumnValues::Date { cells, .. } => {
            let values = rows.iter().filter_map(|&row| cells.get(row)?.value());
            let result = if want_max {
                values.max_by_key(|v| v.epoch_seconds)
            } else {
                values.min_by_key(|v| v.epoch_seconds)
            };
            Ok(result.map_or(AggregateValue::Empty, |v| AggregateValue::Date(*v)))
        }
        ColumnValues::Identifier { cells } | ColumnValues::Text { cells } => {
            let values = rows.iter().filter_map(|&row| cells.get(row)?.value());
            let result = if want_max { values.max() } else { values.min() };
            Ok(result.map_or(AggregateValue::Empty, |v| AggregateValue::Text(v.clone())))
        }
    }
}

fn is_parsed(column: &NormalizedColumn, row: usize) -> bool {
    match &column.values {
        ColumnValues::Amount { cells, .. } => matches!(cells.get(row), Some(Slot::Value(_))),
        ColumnValues::Date { cells, .. } => matches!(cells.get(row), Some(Slot::Value(_))),
        ColumnValues::Identifier { cells } | ColumnValues::Text { cells } => {
            matches!(cells.get(row), Some(Slot::Value(_)))
        }
    }
}

/// One parsed `COLUMN OP VALUE` filter expression, still untyped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub raw: String,
}

impl Filter {
    /// Two-character operators are probed first so `>=` never reads as `>`.
    pub fn parse(text: &str) -> Result<Self, QueryError> {
        const OPS: [(&str, FilterOp); 6] = [
            (">=", FilterOp::Ge),
            ("<=", FilterOp::Le),
            ("!=", FilterOp::Ne),
            (">", FilterOp::Gt),
            ("<", FilterOp::Lt),
            ("=", FilterOp::Eq),
        ];
        for (token, op) in OPS {
            if let Some(pos) = text.find(token) {
                let column = text[..pos].trim();
                let raw = text[pos + token.len()..].trim();
                if column.is_empty() || raw.is_empty() {
                    return Err(QueryError::BadFilter(text.to_string()));
                }
                return Ok(Filter {
                    column: column.to_string(),
                    op,
                    raw: raw.to_string(),
                });
            }
        }
        Err(QueryError::BadFilter(text.to_string()))
    }

    /// Types the filter against `table` and lowers it to a [`Predicate`].
    pub fn to_predicate(&self, table: &Table) -> Result<Predicate, QueryError> {
        let col = lookup(table, &self.column)?;
        let value = Literal::coerce(&self.raw, &col.data)?;
        let column = self.column.clone();
        Ok(match self.op {
            FilterOp::Eq => Predicate::Equals { column, value },
            FilterOp::Ne => Predicate::NotEquals { column, value },
            FilterOp::Gt => Predicate::Range {
                column,
                lo: Bound::Excluded(value),
                hi: Bound::Unbounded,
            },
            FilterOp::Ge => Predicate::Range {
                column,
                lo: Bound::Included(value),
                hi: Bound::Unbounded,
            },
            FilterOp::Lt => Predicate::Range {
                column,
                lo: Bound::Unbounded,
                hi: Bound::Excluded(value),
            },
            FilterOp::Le => Predicate::Range {
                column,
                lo: Bound::Unbounded,
                hi: Bound::Included(value),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{RawColumn, RawTable};
    use crate::pipeline::{LoadOptions, build_table};
    use std::str::FromStr as _;

    fn ledger() -> Table {
        let raw = RawTable::new(vec![
            RawColumn::from_strings(
                "amount",
                &["$30.00", "$10.00", "(5.00)", "$10.00", "oops", ""],
            ),
            RawColumn::from_strings(
                "booked",
                &[
                    "2024-01-05",
                    "2024-01-02",
                    "2024-01-03",
                    "2024-01-02",
                    "2024-01-09",
                    "2024-01-10",
                ],
            ),
            RawColumn::from_strings(
                "status",
                &["open", "closed", "open", "open", "closed", "open"],
            ),
        ])
        .unwrap();
        build_table("ledger", raw, &LoadOptions::default()).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn indexed_equality_matches_full_scan() {
        let table = ledger();
        let predicate = Predicate::Equals {
            column: "amount".into(),
            value: Literal::Amount(dec("10.00")),
        };
        let indexed = evaluate(&table, &predicate).unwrap();
        assert_eq!(indexed, vec![1, 3]);
        assert_eq!(indexed, full_scan(&table, &predicate).unwrap());
    }

    #[test]
    fn range_results_come_back_in_value_order() {
        let table = ledger();
        let predicate = Predicate::Range {
            column: "amount".into(),
            lo: Bound::Included(Literal::Amount(dec("-5.00"))),
            hi: Bound::Excluded(Literal::Amount(dec("30.00"))),
        };
        let rows = evaluate(&table, &predicate).unwrap();
        // -5.00 first, then the two 10.00 rows in row order.
        assert_eq!(rows, vec![2, 1, 3]);
        assert_eq!(rows, full_scan(&table, &predicate).unwrap());
    }

    #[test]
    fn conjoined_bounds_merge_into_one_range() {
        let table = ledger();
        let conjunction = Predicate::All(vec![
            Predicate::Range {
                column: "amount".into(),
                lo: Bound::Included(Literal::Amount(dec("0"))),
                hi: Bound::Unbounded,
            },
            Predicate::Range {
                column: "amount".into(),
                lo: Bound::Unbounded,
                hi: Bound::Included(Literal::Amount(dec("10.00"))),
            },
        ]);
        let merged = Predicate::Range {
            column: "amount".into(),
            lo: Bound::Included(Literal::Amount(dec("0"))),
            hi: Bound::Included(Literal::Amount(dec("10.00"))),
        };
        assert_eq!(
            evaluate(&table, &conjunction).unwrap(),
            evaluate(&table, &merged).unwrap()
        );
    }

    #[test]
    fn inverted_range_is_empty_not_a_panic() {
        let table = ledger();
        let predicate = Predicate::Range {
            column: "amount".into(),
            lo: Bound::Included(Literal::Amount(dec("50"))),
            hi: Bound::Included(Literal::Amount(dec("10"))),
        };
        assert!(evaluate(&table, &predicate).unwrap().is_empty());
        assert!(full_scan(&table, &predicate).unwrap().is_empty());
    }

    #[test]
    fn conjunction_intersects_across_columns() {
        let table = ledger();
        let predicate = Predicate::All(vec![
            Predicate::Equals {
                column: "status".into(),
                value: Literal::Text("open".into()),
            },
            Predicate::Equals {
                column: "amount".into(),
                value: Literal::Amount(dec("10.00")),
            },
        ]);
        assert_eq!(evaluate(&table, &predicate).unwrap(), vec![3]);
    }

    #[test]
    fn missing_and_mistyped_columns_are_typed_errors() {
        let table = ledger();
        let missing = Predicate::Equals {
            column: "nope".into(),
            value: Literal::Text("x".into()),
        };
        assert!(matches!(
            evaluate(&table, &missing),
            Err(QueryError::ColumnNotFound(c)) if c == "nope"
        ));

        let mistyped = Predicate::Equals {
            column: "amount".into(),
            value: Literal::Text("open".into()),
        };
        assert!(matches!(
            evaluate(&table, &mistyped),
            Err(QueryError::TypeMismatch { column, .. }) if column == "amount"
        ));
    }

    #[test]
    fn unknown_type_column_cannot_be_queried() {
        let raw = RawTable::new(vec![RawColumn::from_strings("empty", &["", "", ""])]).unwrap();
        let table = build_table("t", raw, &LoadOptions::default()).unwrap();
        let predicate = Predicate::Equals {
            column: "empty".into(),
            value: Literal::Text("x".into()),
        };
        assert!(matches!(
            evaluate(&table, &predicate),
            Err(QueryError::UnknownColumnType(c)) if c == "empty"
        ));
    }

    #[test]
    fn unindexed_text_falls_back_to_an_equivalent_scan() {
        let values: Vec<String> = (0..40).map(|i| format!("unique note {i}")).collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let raw = RawTable::new(vec![RawColumn::from_strings("note", &refs)]).unwrap();
        let table = build_table("notes", raw, &LoadOptions::default()).unwrap();
        assert!(!table.column("note").unwrap().index.is_indexed());

        let predicate = Predicate::Equals {
            column: "note".into(),
            value: Literal::Text("unique note 7".into()),
        };
        assert_eq!(evaluate(&table, &predicate).unwrap(), vec![7]);
        assert_eq!(
            evaluate(&table, &predicate).unwrap(),
            full_scan(&table, &predicate).unwrap()
        );
    }

    #[test]
    fn aggregates_stay_in_fixed_point() {
        let table = ledger();
        assert_eq!(
            aggregate(&table, AggregateOp::Sum, "amount", None).unwrap(),
            AggregateValue::Amount(dec("45.00"))
        );
        assert_eq!(
            aggregate(&table, AggregateOp::Average, "amount", None).unwrap(),
            AggregateValue::Amount(dec("11.25"))
        );
        // Count skips the blank and the unparsed cell.
        assert_eq!(
            aggregate(&table, AggregateOp::Count, "amount", None).unwrap(),
            AggregateValue::Count(4)
        );
        assert_eq!(
            aggregate(&table, AggregateOp::Min, "amount", None).unwrap(),
            AggregateValue::Amount(dec("-5.00"))
        );
    }

    #[test]
    fn aggregates_respect_the_filtered_row_set() {
        let table = ledger();
        let rows = evaluate(
            &table,
            &Predicate::Equals {
                column: "status".into(),
                value: Literal::Text("open".into()),
            },
        )
        .unwrap();
        assert_eq!(
            aggregate(&table, AggregateOp::Sum, "amount", Some(&rows)).unwrap(),
            AggregateValue::Amount(dec("35.00"))
        );
    }

    #[test]
    fn sum_over_text_is_unsupported() {
        let table = ledger();
        assert!(matches!(
            aggregate(&table, AggregateOp::Sum, "status", None),
            Err(QueryError::UnsupportedAggregate { .. })
        ));
    }

    #[test]
    fn filters_parse_and_coerce_against_the_column() {
        let table = ledger();
        let filter = Filter::parse("amount >= $10.00").unwrap();
        assert_eq!(filter.op, FilterOp::Ge);
        let rows = evaluate(&table, &filter.to_predicate(&table).unwrap()).unwrap();
        assert_eq!(rows, vec![1, 3, 0]);

        let date_filter = Filter::parse("booked = 2024-01-02").unwrap();
        let rows = evaluate(&table, &date_filter.to_predicate(&table).unwrap()).unwrap();
        assert_eq!(rows, vec![1, 3]);

        assert!(matches!(
            Filter::parse("amount"),
            Err(QueryError::BadFilter(_))
        ));
        let bad = Filter::parse("amount = notmoney").unwrap();
        assert!(matches!(
            bad.to_predicate(&table),
            Err(QueryError::BadLiteral { .. })
        ));
    }

    #[test]
    fn aggregate_ops_parse_by_name() {
        assert_eq!(AggregateOp::from_str("sum").unwrap(), AggregateOp::Sum);
        assert_eq!(AggregateOp::from_str("AVG").unwrap(), AggregateOp::Average);
        assert!(AggregateOp::from_str("median").is_err());
    }
}
