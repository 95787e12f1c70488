//! Column classification: aggregates per-cell pattern matches into one
//! [`ColumnTypeDecision`] with a quantified confidence.
//!
//! Classification is pure. All column-wide state (thresholds, locale-default
//! date layout) arrives through [`ClassifierConfig`], so columns can be
//! classified in parallel without shared mutable state.

use std::collections::BTreeSet;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    cell::RawCell,
    patterns::{CellMatch, DateLayout, ExtractedValue, SemanticType},
};

/// Tunable classification constants. Defaults follow the documented
/// recommendations; callers may override any field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Minimum match rate a candidate type needs to win; below it the column
    /// falls back to Text.
    pub min_type_threshold: f64,
    /// Scales how strongly multi-type cells reduce confidence.
    pub ambiguity_weight: f64,
    /// Layout assumed for slashed dates when no unambiguous evidence exists.
    pub default_date_layout: DateLayout,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_type_threshold: 0.6,
            ambiguity_weight: 0.5,
            default_date_layout: DateLayout::DayFirst,
        }
    }
}

/// Per-type match rates over non-blank cells, reported for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchRates {
    pub amount: f64,
    pub date: f64,
    pub identifier: f64,
}

impl MatchRates {
    pub fn rate(&self, semantic: SemanticType) -> f64 {
        match semantic {
            SemanticType::Amount => self.amount,
            SemanticType::Date => self.date,
            SemanticType::Identifier => self.identifier,
            SemanticType::Text | SemanticType::Unknown => 0.0,
        }
    }
}

/// The classifier's verdict for one column. Immutable once computed; a
/// reload recomputes it wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnTypeDecision {
    pub semantic: SemanticType,
    /// Confidence in [0, 1]: winning match rate discounted by ambiguity.
    pub confidence: f64,
    pub rates: MatchRates,
    pub non_blank_cells: usize,
    pub blank_cells: usize,
    /// Cells that matched more than one competing semantic type.
    pub ambiguous_cells: usize,
    /// Resolved layout for Date columns; None otherwise.
    pub date_layout: Option<DateLayout>,
}

impl ColumnTypeDecision {
    fn unknown(blank_cells: usize) -> Self {
        Self {
            semantic: SemanticType::Unknown,
            confidence: 0.0,
            rates: MatchRates::default(),
            non_blank_cells: 0,
            blank_cells,
            ambiguous_cells: 0,
            date_layout: None,
        }
    }
}

/// Classifies one column from its per-cell match sets.
///
/// `matches` must hold one entry per cell in `cells`, in order. Candidate
/// types are ranked by match rate; ties resolve in the fixed order Amount,
/// Date, Identifier so repeated runs agree.
pub fn classify_column(
    cells: &[RawCell],
    matches: &[Vec<CellMatch>],
    config: &ClassifierConfig,
) -> ColumnTypeDecision {
    debug_assert_eq!(cells.len(), matches.len());

    let blank_cells = cells.iter().filter(|c| c.is_blank()).count();
    let non_blank = cells.len() - blank_cells;
    if non_blank == 0 {
        return ColumnTypeDecision::unknown(blank_cells);
    }

    let mut amount_cells = 0usize;
    let mut date_cells = 0usize;
    let mut identifier_cells = 0usize;
    let mut ambiguous_cells = 0usize;

    for (cell, cell_matches) in cells.iter().zip(matches) {
        if cell.is_blank() {
            continue;
        }
        let semantics: BTreeSet<SemanticType> = cell_matches.iter().map(|m| m.semantic).collect();
        if semantics.contains(&SemanticType::Amount) {
            amount_cells += 1;
        }
        if semantics.contains(&SemanticType::Date) {
            date_cells += 1;
        }
        if semantics.contains(&SemanticType::Identifier) {
            identifier_cells += 1;
        }
        if semantics.len() > 1 {
            ambiguous_cells += 1;
        }
    }

    let denominator = non_blank as f64;
    let rates = MatchRates {
        amount: amount_cells as f64 / denominator,
        date: date_cells as f64 / denominator,
        identifier: identifier_cells as f64 / denominator,
    };

    // Fixed candidate order makes argmax ties deterministic.
    let (winner, winning_rate) = [
        (SemanticType::Amount, rates.amount),
        (SemanticType::Date, rates.date),
        (SemanticType::Identifier, rates.identifier),
    ]
    .into_iter()
    .fold((SemanticType::Amount, rates.amount), |best, candidate| {
        if candidate.1 > best.1 { candidate } else { best }
    });

    let ambiguity_penalty =
        (config.ambiguity_weight * ambiguous_cells as f64 / denominator).clamp(0.0, 1.0);
    let confidence = (winning_rate * (1.0 - ambiguity_penalty)).clamp(0.0, 1.0);

    let semantic = if winning_rate >= config.min_type_threshold {
        winner
    } else {
        // Safe fallback; the computed confidence is retained for diagnostics.
        SemanticType::Text
    };

    let date_layout = if semantic == SemanticType::Date {
        Some(resolve_date_layout(matches, config))
    } else {
        None
    };

    ColumnTypeDecision {
        semantic,
        confidence,
        rates,
        non_blank_cells: non_blank,
        blank_cells,
        ambiguous_cells,
        date_layout,
    }
}

/// Column-wide date layout vote, in two stages.
///
/// The slashed layouts are arbitrated first, and only unambiguous cells
/// count: a cell that parses under exactly one of them (e.g. day > 12) is
/// evidence for that layout. With no unambiguous evidence the locale default
/// stands; the ambiguity already lowered the column's confidence. The
/// column's layout is then the majority representative layout across all
/// date cells, with slashed cells standing for the arbitrated winner.
fn resolve_date_layout(matches: &[Vec<CellMatch>], config: &ClassifierConfig) -> DateLayout {
    let mut slashed_votes: Vec<DateLayout> = Vec::new();
    for cell_matches in matches {
        let layouts: BTreeSet<DateLayout> = cell_matches
            .iter()
            .filter_map(|m| match &m.value {
                ExtractedValue::Date { layout, .. } => Some(*layout),
                _ => None,
            })
            .collect();
        let day_first = layouts.contains(&DateLayout::DayFirst);
        let month_first = layouts.contains(&DateLayout::MonthFirst);
        match (day_first, month_first) {
            (true, false) => slashed_votes.push(DateLayout::DayFirst),
            (false, true) => slashed_votes.push(DateLayout::MonthFirst),
            _ => {}
        }
    }
    let slashed = slashed_votes
        .into_iter()
        .counts()
        .into_iter()
        .max_by_key(|(layout, count)| (*count, *layout == config.default_date_layout))
        .map(|(layout, _)| layout)
        .unwrap_or(config.default_date_layout);

    matches
        .iter()
        .filter_map(|cell_matches| {
            // Highest-specificity date match represents the cell.
            cell_matches.iter().find_map(|m| match &m.value {
                ExtractedValue::Date { layout, .. } => Some(match layout {
                    DateLayout::DayFirst | DateLayout::MonthFirst => slashed,
                    other => *other,
                }),
                _ => None,
            })
        })
        .counts()
        .into_iter()
        .max_by_key(|(layout, count)| (*count, *layout == slashed, std::cmp::Reverse(*layout)))
        .map(|(layout, _)| layout)
        .unwrap_or(config.default_date_layout)
}
