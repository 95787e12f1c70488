//! Relational-delegate fallback.
//!
//! Some deployments keep a copy of the loaded data in a relational store and
//! want query results cross-checked against it. [`predicate_to_sql`] renders
//! predicates using the same canonical encodings the engine stores (exact
//! decimal literals for amounts, midnight epoch seconds for dates) so both
//! sides compare the same values. [`reconcile`] runs both and demands
//! row-for-row agreement.

use std::ops::Bound;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::debug;

use crate::{
    query::{Literal, Predicate, QueryError, evaluate},
    table::Table,
};

/// A relational store that can answer predicates rendered as SQL.
///
/// Implementations return zero-based row offsets in any order; callers sort.
pub trait RelationalDelegate {
    fn select_rows(&self, table: &str, predicate_sql: &str) -> Result<Vec<u32>>;
}

/// Renders a predicate as a SQL boolean expression over canonical encodings.
pub fn predicate_to_sql(predicate: &Predicate) -> String {
    match predicate {
        Predicate::Equals { column, value } => {
            format!("{} = {}", quote_ident(column), render_literal(value))
        }
        Predicate::NotEquals { column, value } => {
            format!("{} <> {}", quote_ident(column), render_literal(value))
        }
        Predicate::Range { column, lo, hi } => {
            let mut parts = Vec::new();
            match lo {
                Bound::Included(v) => {
                    parts.push(format!("{} >= {}", quote_ident(column), render_literal(v)));
                }
                Bound::Excluded(v) => {
                    parts.push(format!("{} > {}", quote_ident(column), render_literal(v)));
                }
                Bound::Unbounded => {}
            }
            match hi {
                Bound::Included(v) => {
                    parts.push(format!("{} <= {}", quote_ident(column), render_literal(v)));
                }
                Bound::Excluded(v) => {
                    parts.push(format!("{} < {}", quote_ident(column), render_literal(v)));
                }
                Bound::Unbounded => {}
            }
            if parts.is_empty() {
                "1 = 1".to_string()
            } else {
                parts.join(" AND ")
            }
        }
        Predicate::All(predicates) => {
            if predicates.is_empty() {
                "1 = 1".to_string()
            } else {
                predicates
                    .iter()
                    .map(|p| format!("({})", predicate_to_sql(p)))
                    .collect::<Vec<_>>()
                    .join(" AND ")
            }
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn render_literal(value: &Literal) -> String {
    match value {
        // Decimal's display form is the exact fixed-point value.
        Literal::Amount(v) => v.to_string(),
        Literal::Date(d) => midnight_epoch(*d).to_string(),
        Literal::Text(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

fn midnight_epoch(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Evaluates `predicate` directly and through `delegate`, then verifies the
/// two row sets agree. Returns the agreed row count.
pub fn reconcile(
    table: &Table,
    predicate: &Predicate,
    delegate: &dyn RelationalDelegate,
) -> Result<usize> {
    let mut direct = evaluate(table, predicate)?;
    direct.sort_unstable();

    let sql = predicate_to_sql(predicate);
    debug!("Reconciling table '{}' against delegate: {}", table.name(), sql);
    let mut delegated = delegate
        .select_rows(table.name(), &sql)
        .with_context(|| format!("Delegate query failed for table '{}'", table.name()))?;
    delegated.sort_unstable();

    if direct != delegated {
        return Err(QueryError::DelegateMismatch {
            table: table.name().to_string(),
            direct: direct.len(),
            delegated: delegated.len(),
        }
        .into());
    }
    Ok(direct.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{RawColumn, RawTable};
    use crate::pipeline::{LoadOptions, build_table};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    struct FixedDelegate(Vec<u32>);

    impl RelationalDelegate for FixedDelegate {
        fn select_rows(&self, _table: &str, _sql: &str) -> Result<Vec<u32>> {
            Ok(self.0.clone())
        }
    }

    fn sample() -> Table {
        let raw = RawTable::new(vec![
            RawColumn::from_strings("amount", &["$30.00", "$10.00", "$10.00"]),
            RawColumn::from_strings("booked", &["2024-01-05", "2024-01-02", "2024-01-03"]),
        ])
        .unwrap();
        build_table("ledger", raw, &LoadOptions::default()).unwrap()
    }

    #[test]
    fn predicates_render_with_canonical_encodings() {
        let equals = Predicate::Equals {
            column: "amount".into(),
            value: Literal::Amount(Decimal::from_str("1234.56").unwrap()),
        };
        assert_eq!(predicate_to_sql(&equals), "\"amount\" = 1234.56");

        let range = Predicate::Range {
            column: "booked".into(),
            lo: Bound::Included(Literal::Date(
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            )),
            hi: Bound::Excluded(Literal::Date(
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            )),
        };
        assert_eq!(
            predicate_to_sql(&range),
            "\"booked\" >= 1704153600 AND \"booked\" < 1704412800"
        );

        let text = Predicate::Equals {
            column: "status".into(),
            value: Literal::Text("it's open".into()),
        };
        assert_eq!(predicate_to_sql(&text), "\"status\" = 'it''s open'");
    }

    #[test]
    fn conjunctions_render_parenthesized() {
        let predicate = Predicate::All(vec![
            Predicate::Equals {
                column: "a".into(),
                value: Literal::Text("x".into()),
            },
            Predicate::NotEquals {
                column: "b".into(),
                value: Literal::Text("y".into()),
            },
        ]);
        assert_eq!(predicate_to_sql(&predicate), "(\"a\" = 'x') AND (\"b\" <> 'y')");
    }

    #[test]
    fn reconcile_accepts_agreement_and_rejects_divergence() {
        let table = sample();
        let predicate = Predicate::Equals {
            column: "amount".into(),
            value: Literal::Amount(Decimal::from(10)),
        };

        let agreeing = FixedDelegate(vec![2, 1]);
        assert_eq!(reconcile(&table, &predicate, &agreeing).unwrap(), 2);

        let diverging = FixedDelegate(vec![1]);
        let err = reconcile(&table, &predicate, &diverging).unwrap_err();
        assert!(err.to_string().contains("disagreed"), "{err:#}");
    }
}
