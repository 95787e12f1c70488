//! CSV ingestion: the CLI's stand-in for a spreadsheet-decoding collaborator.
//!
//! Library callers construct [`RawTable`] directly; this module only covers
//! the command-line path. It handles extension-based delimiter resolution
//! (`.csv` → comma, `.tsv` → tab) with manual override, input decoding via
//! `encoding_rs` (UTF-8 default), and the `-` stdin convention.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

use crate::cell::{RawCell, RawColumn, RawTable};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

/// Spreadsheet error markers carried through as [`RawCell::Error`].
const ERROR_MARKERS: &[&str] = &[
    "#DIV/0!", "#N/A", "#NAME?", "#NULL!", "#NUM!", "#REF!", "#VALUE!",
];

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub delimiter: Option<u8>,
    pub encoding: Option<String>,
    /// Stop after this many data rows; classification on a sample is often
    /// enough.
    pub max_rows: Option<usize>,
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Reads a delimited file (or stdin for `-`) into a rectangular [`RawTable`].
/// The first record is the header row.
pub fn read_table(path: &Path, options: &IngestOptions) -> Result<RawTable> {
    let bytes = read_bytes(path)?;
    let encoding = resolve_encoding(options.encoding.as_deref())?;
    let (text, _, had_errors) = encoding.decode(&bytes);
    if had_errors {
        return Err(anyhow!(
            "Input {path:?} is not valid {}",
            encoding.name()
        ));
    }

    let delimiter = resolve_input_delimiter(path, options.delimiter);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .with_context(|| format!("Reading header row from {path:?}"))?
        .clone();
    let mut columns: Vec<RawColumn> = headers
        .iter()
        .map(|name| RawColumn::new(name.trim(), Vec::new()))
        .collect();

    for (row, record) in reader.records().enumerate() {
        if let Some(limit) = options.max_rows
            && row >= limit
        {
            break;
        }
        let record = record.with_context(|| format!("Reading record {} from {path:?}", row + 1))?;
        for (column, field) in columns.iter_mut().zip(record.iter()) {
            column.cells.push(parse_cell(field));
        }
    }

    RawTable::new(columns).with_context(|| format!("Input {path:?} is not rectangular"))
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    if is_dash(path) {
        std::io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Reading from stdin")?;
    } else {
        let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
        BufReader::new(file)
            .read_to_end(&mut bytes)
            .with_context(|| format!("Reading input file {path:?}"))?;
    }
    Ok(bytes)
}

fn parse_cell(field: &str) -> RawCell {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        RawCell::Blank
    } else if ERROR_MARKERS.contains(&trimmed) {
        RawCell::Error(trimmed.to_string())
    } else {
        RawCell::Text(trimmed.to_string())
    }
}
