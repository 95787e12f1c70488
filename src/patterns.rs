//! Format-pattern catalog and per-cell matching.
//!
//! Each [`FormatPattern`] is tagged data (a [`PatternRule`] variant) plus a
//! pure match+extract function. The catalog is built once at process start
//! and shared read-only by every column. Matching a cell yields zero or more
//! [`CellMatch`] candidates ordered by specificity, with catalog declaration
//! order breaking ties, so the winning pattern is deterministic and
//! test-visible.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cell::RawCell;

/// Semantic column types the classifier decides between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SemanticType {
    Amount,
    Date,
    Identifier,
    Text,
    Unknown,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Amount => "amount",
            SemanticType::Date => "date",
            SemanticType::Identifier => "identifier",
            SemanticType::Text => "text",
            SemanticType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Date layout families. Only `DayFirst` and `MonthFirst` compete for the
/// same cell text; the classifier resolves that column-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DateLayout {
    Iso,
    DayFirst,
    MonthFirst,
    MonthYear,
    Quarter,
    Serial,
}

impl DateLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateLayout::Iso => "iso",
            DateLayout::DayFirst => "day-first",
            DateLayout::MonthFirst => "month-first",
            DateLayout::MonthYear => "month-year",
            DateLayout::Quarter => "quarter",
            DateLayout::Serial => "serial",
        }
    }

    /// Whether two layouts can claim the same cell text.
    pub fn competes_with(&self, other: DateLayout) -> bool {
        matches!(
            (self, other),
            (DateLayout::DayFirst, DateLayout::MonthFirst)
                | (DateLayout::MonthFirst, DateLayout::DayFirst)
        )
    }
}

impl std::fmt::Display for DateLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical value extracted by a matching pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedValue {
    Amount {
        value: Decimal,
        currency: Option<&'static str>,
    },
    Date {
        timestamp: NaiveDateTime,
        layout: DateLayout,
        has_time: bool,
    },
    Identifier(String),
}

/// Result of testing one cell against one pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct CellMatch {
    pub pattern: &'static str,
    pub semantic: SemanticType,
    pub specificity: u8,
    pub value: ExtractedValue,
}

#[derive(Debug, Clone)]
enum PatternRule {
    AmountParenthesized,
    AmountTrailingMinus,
    AmountCurrencyTagged,
    AmountAbbreviated,
    AmountPlain,
    DateFormat {
        fmt: &'static str,
        layout: DateLayout,
        has_time: bool,
    },
    DateMonthYear,
    DateQuarter,
    DateSerial,
    IdentifierUuid,
    IdentifierCode,
    IdentifierDigits,
}

/// A named format rule: matcher plus extractor.
#[derive(Debug, Clone)]
pub struct FormatPattern {
    pub id: &'static str,
    pub semantic: SemanticType,
    pub specificity: u8,
    rule: PatternRule,
}

impl FormatPattern {
    pub fn try_match(&self, text: &str) -> Option<ExtractedValue> {
        match &self.rule {
            PatternRule::AmountParenthesized => {
                let scan = scan_amount(text)?;
                scan.paren_negative.then(|| scan.into_value())
            }
            PatternRule::AmountTrailingMinus => {
                let scan = scan_amount(text)?;
                scan.trailing_minus.then(|| scan.into_value())
            }
            PatternRule::AmountCurrencyTagged => {
                let scan = scan_amount(text)?;
                scan.currency.is_some().then(|| scan.into_value())
            }
            PatternRule::AmountAbbreviated => {
                let scan = scan_amount(text)?;
                scan.abbreviated.then(|| scan.into_value())
            }
            PatternRule::AmountPlain => Some(scan_amount(text)?.into_value()),
            PatternRule::DateFormat {
                fmt,
                layout,
                has_time,
            } => {
                let timestamp = if *has_time {
                    NaiveDateTime::parse_from_str(text, fmt).ok()?
                } else {
                    NaiveDate::parse_from_str(text, fmt)
                        .ok()?
                        .and_hms_opt(0, 0, 0)?
                };
                Some(ExtractedValue::Date {
                    timestamp,
                    layout: *layout,
                    has_time: *has_time,
                })
            }
            PatternRule::DateMonthYear => parse_month_year(text),
            PatternRule::DateQuarter => parse_quarter(text),
            PatternRule::DateSerial => parse_excel_serial(text),
            PatternRule::IdentifierUuid => {
                let trimmed = text.trim_matches(|c| matches!(c, '{' | '}'));
                Uuid::parse_str(trimmed)
                    .ok()
                    .map(|u| ExtractedValue::Identifier(u.to_string()))
            }
            PatternRule::IdentifierCode => {
                is_identifier_code(text).then(|| ExtractedValue::Identifier(text.to_string()))
            }
            PatternRule::IdentifierDigits => {
                is_digit_run(text).then(|| ExtractedValue::Identifier(text.to_string()))
            }
        }
    }
}

/// Ordered, read-only pattern catalog shared by all columns.
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    patterns: Vec<FormatPattern>,
}

impl Default for PatternCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternCatalog {
    pub fn new() -> Self {
        let mut patterns = Vec::new();
        let mut amount = |id, specificity, rule| {
            patterns.push(FormatPattern {
                id,
                semantic: SemanticType::Amount,
                specificity,
                rule,
            });
        };
        amount("parenthesized-negative", 90, PatternRule::AmountParenthesized);
        amount("trailing-minus", 85, PatternRule::AmountTrailingMinus);
        amount("currency-tagged", 80, PatternRule::AmountCurrencyTagged);
        amount("abbreviated-magnitude", 75, PatternRule::AmountAbbreviated);
        amount("plain-decimal", 40, PatternRule::AmountPlain);

        let mut date = |id, specificity, fmt, layout, has_time| {
            patterns.push(FormatPattern {
                id,
                semantic: SemanticType::Date,
                specificity,
                rule: PatternRule::DateFormat {
                    fmt,
                    layout,
                    has_time,
                },
            });
        };
        date("iso-datetime-seconds", 92, "%Y-%m-%d %H:%M:%S", DateLayout::Iso, true);
        date("iso-datetime-t", 92, "%Y-%m-%dT%H:%M:%S", DateLayout::Iso, true);
        date("iso-datetime-minutes", 88, "%Y-%m-%d %H:%M", DateLayout::Iso, true);
        date("iso-date", 82, "%Y-%m-%d", DateLayout::Iso, false);
        date("iso-slash", 78, "%Y/%m/%d", DateLayout::Iso, false);
        date("day-monthname", 76, "%d %b %Y", DateLayout::DayFirst, false);
        date("day-monthname-dash", 76, "%d-%b-%Y", DateLayout::DayFirst, false);
        date("day-monthname-dash-short", 66, "%d-%b-%y", DateLayout::DayFirst, false);
        date("monthname-day", 76, "%b %d, %Y", DateLayout::MonthFirst, false);
        date("dmy-slash-time", 70, "%d/%m/%Y %H:%M:%S", DateLayout::DayFirst, true);
        date("mdy-slash-time", 70, "%m/%d/%Y %H:%M:%S", DateLayout::MonthFirst, true);
        date("dmy-slash", 60, "%d/%m/%Y", DateLayout::DayFirst, false);
        date("mdy-slash", 60, "%m/%d/%Y", DateLayout::MonthFirst, false);
        date("dmy-dash", 60, "%d-%m-%Y", DateLayout::DayFirst, false);
        date("mdy-dash", 60, "%m-%d-%Y", DateLayout::MonthFirst, false);
        date("dmy-dot", 60, "%d.%m.%Y", DateLayout::DayFirst, false);
        date("dmy-slash-short", 50, "%d/%m/%y", DateLayout::DayFirst, false);
        date("mdy-slash-short", 50, "%m/%d/%y", DateLayout::MonthFirst, false);
        date("compact-ymd", 30, "%Y%m%d", DateLayout::Iso, false);

        patterns.push(FormatPattern {
            id: "quarter",
            semantic: SemanticType::Date,
            specificity: 86,
            rule: PatternRule::DateQuarter,
        });
        patterns.push(FormatPattern {
            id: "month-year",
            semantic: SemanticType::Date,
            specificity: 56,
            rule: PatternRule::DateMonthYear,
        });
        patterns.push(FormatPattern {
            id: "excel-serial",
            semantic: SemanticType::Date,
            specificity: 20,
            rule: PatternRule::DateSerial,
        });

        patterns.push(FormatPattern {
            id: "identifier-uuid",
            semantic: SemanticType::Identifier,
            specificity: 95,
            rule: PatternRule::IdentifierUuid,
        });
        patterns.push(FormatPattern {
            id: "identifier-code",
            semantic: SemanticType::Identifier,
            specificity: 62,
            rule: PatternRule::IdentifierCode,
        });
        patterns.push(FormatPattern {
            id: "identifier-digits",
            semantic: SemanticType::Identifier,
            specificity: 28,
            rule: PatternRule::IdentifierDigits,
        });

        Self { patterns }
    }

    pub fn patterns(&self) -> &[FormatPattern] {
        &self.patterns
    }

    /// Tests one cell against every pattern. Returns candidates sorted by
    /// specificity (stable, so declaration order breaks ties). A cell
    /// matching nothing yields an empty set, never an error.
    pub fn match_cell(&self, cell: &RawCell) -> Vec<CellMatch> {
        let Some(text) = cell.as_text() else {
            return Vec::new();
        };
        let mut candidates: Vec<CellMatch> = self
            .patterns
            .iter()
            .filter_map(|pattern| {
                pattern.try_match(&text).map(|value| CellMatch {
                    pattern: pattern.id,
                    semantic: pattern.semantic,
                    specificity: pattern.specificity,
                    value,
                })
            })
            .collect();
        candidates.sort_by(|a, b| b.specificity.cmp(&a.specificity));
        candidates
    }
}

/// Picks the winning candidate of one semantic type for a cell.
pub fn best_match<'a>(matches: &'a [CellMatch], semantic: SemanticType) -> Option<&'a CellMatch> {
    matches.iter().find(|m| m.semantic == semantic)
}

const CURRENCY_CODES: &[&str] = &["USD", "EUR", "INR", "JPY", "GBP"];

fn symbol_currency(ch: char) -> Option<&'static str> {
    match ch {
        '$' => Some("USD"),
        '€' => Some("EUR"),
        '₹' => Some("INR"),
        '£' => Some("GBP"),
        '¥' => Some("JPY"),
        _ => None,
    }
}

static ABBREV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)\s*([KkMmBb])$").expect("abbreviation regex"));
static QUARTER_COMPACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[Qq]([1-4])[- ]?(\d{2}|\d{4})$").expect("quarter regex"));
static QUARTER_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^quarter\s+([1-4])\s+(\d{4})$").expect("quarter word regex")
});
static MONTH_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]{3,9})[- ](\d{4})$").expect("month-year regex"));

#[derive(Debug, Clone)]
struct AmountScan {
    value: Decimal,
    currency: Option<&'static str>,
    paren_negative: bool,
    trailing_minus: bool,
    abbreviated: bool,
}

impl AmountScan {
    fn into_value(self) -> ExtractedValue {
        ExtractedValue::Amount {
            value: self.value,
            currency: self.currency,
        }
    }
}

/// Single-pass amount recognizer covering parenthesized and trailing-minus
/// negatives, currency symbols and ISO codes, K/M/B magnitude suffixes, and
/// US/European/Indian digit grouping. Every path stays in fixed-point
/// decimal.
fn scan_amount(text: &str) -> Option<AmountScan> {
    let mut s = text.trim();
    if s.is_empty() {
        return None;
    }

    let mut paren_negative = false;
    if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
        paren_negative = true;
        s = s[1..s.len() - 1].trim();
    }

    // Currency code prefix/suffix, then symbols at either edge.
    let mut currency = None;
    for code in CURRENCY_CODES {
        if let Some(rest) = s.strip_prefix(code) {
            currency = Some(*code);
            s = rest.trim_start();
            break;
        }
        if let Some(rest) = s.strip_suffix(code) {
            currency = Some(*code);
            s = rest.trim_end();
            break;
        }
    }
    if currency.is_none() {
        if let Some(ch) = s.chars().next()
            && let Some(code) = symbol_currency(ch)
        {
            currency = Some(code);
            s = s[ch.len_utf8()..].trim_start();
        } else if let Some(ch) = s.chars().next_back()
            && let Some(code) = symbol_currency(ch)
        {
            currency = Some(code);
            s = s[..s.len() - ch.len_utf8()].trim_end();
        }
    }

    let mut negative = paren_negative;
    let mut trailing_minus = false;
    if let Some(rest) = s.strip_suffix('-') {
        trailing_minus = true;
        negative = true;
        s = rest.trim_end();
    } else if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest.trim_start();
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest.trim_start();
    }
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = ABBREV_RE.captures(s) {
        let base = Decimal::from_str(&caps[1]).ok()?;
        let multiplier = match caps[2].to_ascii_uppercase().as_str() {
            "K" => Decimal::from(1_000u32),
            "M" => Decimal::from(1_000_000u32),
            _ => Decimal::from(1_000_000_000u32),
        };
        let mut value = base.checked_mul(multiplier)?.normalize();
        if negative {
            value.set_sign_negative(true);
        }
        return Some(AmountScan {
            value,
            currency,
            paren_negative,
            trailing_minus,
            abbreviated: true,
        });
    }

    // Regional separator handling: the last separator kind decides which
    // character is the decimal point.
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() || !compact.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }
    let bare_digits = compact.chars().all(|c| c.is_ascii_digit());
    if bare_digits && compact.len() > 1 && compact.starts_with('0') {
        // Leading-zero digit runs are identifiers, not amounts.
        return None;
    }

    let cleaned = match (compact.rfind('.'), compact.rfind(',')) {
        (Some(dot), Some(comma)) => {
            if dot > comma {
                compact.replace(',', "")
            } else {
                compact.replace('.', "").replace(',', ".")
            }
        }
        (None, Some(comma)) => {
            let decimals = compact.len() - comma - 1;
            if (1..=2).contains(&decimals) {
                let mut owned = compact.clone();
                owned.replace_range(comma..=comma, ".");
                owned.replace(',', "")
            } else {
                compact.replace(',', "")
            }
        }
        _ => compact,
    };

    let mut value = Decimal::from_str(&cleaned).ok()?;
    if negative {
        value.set_sign_negative(true);
    }
    Some(AmountScan {
        value,
        currency,
        paren_negative,
        trailing_minus,
        abbreviated: false,
    })
}

fn parse_month_year(text: &str) -> Option<ExtractedValue> {
    let caps = MONTH_YEAR_RE.captures(text.trim())?;
    let candidate = format!("01 {} {}", &caps[1], &caps[2]);
    let date = NaiveDate::parse_from_str(&candidate, "%d %b %Y").ok()?;
    Some(ExtractedValue::Date {
        timestamp: date.and_hms_opt(0, 0, 0)?,
        layout: DateLayout::MonthYear,
        has_time: false,
    })
}

fn parse_quarter(text: &str) -> Option<ExtractedValue> {
    let trimmed = text.trim();
    let caps = QUARTER_COMPACT_RE
        .captures(trimmed)
        .or_else(|| QUARTER_WORD_RE.captures(trimmed))?;
    let quarter: u32 = caps[1].parse().ok()?;
    let mut year: i32 = caps[2].parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    let month = (quarter - 1) * 3 + 1;
    let date = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some(ExtractedValue::Date {
        timestamp: date.and_hms_opt(0, 0, 0)?,
        layout: DateLayout::Quarter,
        has_time: false,
    })
}

/// Serial-day window covering roughly 1954-2064; anything outside reads more
/// plausibly as an amount or identifier.
const SERIAL_MIN: i64 = 20_000;
const SERIAL_MAX: i64 = 60_000;
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

fn parse_excel_serial(text: &str) -> Option<ExtractedValue> {
    let trimmed = text.trim();
    let (days_text, fraction_text) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (trimmed, None),
    };
    if days_text.is_empty() || !days_text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let days: i64 = days_text.parse().ok()?;
    if !(SERIAL_MIN..=SERIAL_MAX).contains(&days) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(SERIAL_EPOCH.0, SERIAL_EPOCH.1, SERIAL_EPOCH.2)?;
    let date = epoch.checked_add_signed(Duration::days(days))?;
    let mut seconds: i64 = 0;
    let mut has_time = false;
    if let Some(fraction) = fraction_text {
        if fraction.is_empty() || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let fraction_value: f64 = format!("0.{fraction}").parse().ok()?;
        seconds = (fraction_value * 86_400.0).round() as i64;
        has_time = seconds > 0;
    }
    let timestamp = date.and_hms_opt(0, 0, 0)? + Duration::seconds(seconds.min(86_399));
    Some(ExtractedValue::Date {
        timestamp,
        layout: DateLayout::Serial,
        has_time,
    })
}

fn is_identifier_code(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.len() < 3 || !trimmed.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return false;
    }
    let mut has_digit = false;
    for ch in trimmed.chars() {
        match ch {
            '0'..='9' => has_digit = true,
            'a'..='z' | 'A'..='Z' | '-' | '_' | '/' => {}
            _ => return false,
        }
    }
    has_digit
}

fn is_digit_run(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.len() >= 4 && trimmed.chars().all(|c| c.is_ascii_digit())
}
