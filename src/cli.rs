use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Type inference, normalization, and indexed queries for spreadsheet-exported financial data",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Infer per-column semantic types and write the decisions to a .yml file
    Classify(ClassifyArgs),
    /// Run the full pipeline and persist a canonical table snapshot
    Load(LoadArgs),
    /// Evaluate filters and aggregates against a snapshot
    Query(QueryArgs),
    /// Report per-column decisions and diagnostics for a snapshot
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// Input CSV/TSV file to classify ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination .yml decisions file (printed to stdout if omitted)
    #[arg(short, long)]
    pub meta: Option<PathBuf>,
    /// Number of rows to sample when classifying (0 means full scan)
    #[arg(long, default_value_t = 2000)]
    pub sample_rows: usize,
    /// Minimum match rate a type needs before the column falls back to text
    #[arg(long, default_value_t = 0.6)]
    pub min_type_threshold: f64,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Input CSV/TSV file to load ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination snapshot file (.ftab)
    #[arg(short = 's', long = "snapshot")]
    pub snapshot: PathBuf,
    /// Table name recorded in the snapshot (defaults to the input file stem)
    #[arg(long)]
    pub name: Option<String>,
    /// Minimum match rate a type needs before the column falls back to text
    #[arg(long, default_value_t = 0.6)]
    pub min_type_threshold: f64,
    /// Distinct-value ratio above which token columns stay unindexed
    #[arg(long, default_value_t = 0.5)]
    pub max_distinct_ratio: f64,
    /// Assume month-first layout for fully ambiguous slashed dates
    #[arg(long = "month-first")]
    pub month_first: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Snapshot file to query (.ftab)
    #[arg(short = 's', long = "snapshot")]
    pub snapshot: PathBuf,
    /// Row-level filters such as `amount >= 100` or `status = shipped`
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Aggregate of the form `op:column` with op in count|sum|min|max|avg
    #[arg(long = "aggregate")]
    pub aggregate: Option<String>,
    /// Limit number of rows emitted
    #[arg(long)]
    pub limit: Option<usize>,
    /// Distinct-value ratio above which token columns stay unindexed
    #[arg(long, default_value_t = 0.5)]
    pub max_distinct_ratio: f64,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Snapshot file to inspect (.ftab)
    #[arg(short = 's', long = "snapshot")]
    pub snapshot: PathBuf,
    /// Output format for the per-column report
    #[arg(long, default_value = "table")]
    pub format: ReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Table,
    Json,
    Yaml,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiters_parse_by_name_or_literal() {
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
    }

    #[test]
    fn cli_parses_a_query_invocation() {
        let cli = Cli::try_parse_from([
            "fintab",
            "query",
            "--snapshot",
            "ledger.ftab",
            "--filter",
            "amount >= 100",
            "--filter",
            "status = open",
            "--aggregate",
            "sum:amount",
        ])
        .unwrap();
        match cli.command {
            Commands::Query(args) => {
                assert_eq!(args.filters.len(), 2);
                assert_eq!(args.aggregate.as_deref(), Some("sum:amount"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
