pub mod cell;
pub mod classify;
pub mod cli;
pub mod index;
pub mod ingest;
pub mod normalize;
pub mod patterns;
pub mod pipeline;
pub mod query;
pub mod report;
pub mod sql;
pub mod table;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, info};
use serde::Serialize;

use crate::{
    classify::{ClassifierConfig, ColumnTypeDecision},
    cli::{Cli, Commands, ReportFormat},
    index::IndexConfig,
    ingest::IngestOptions,
    patterns::DateLayout,
    pipeline::LoadOptions,
    query::{AggregateOp, Filter, Predicate},
    table::Table,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("fintab", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Classify(args) => handle_classify(&args),
        Commands::Load(args) => handle_load(&args),
        Commands::Query(args) => handle_query(&args),
        Commands::Inspect(args) => handle_inspect(&args),
    }
}

#[derive(Serialize)]
struct DecisionRecord<'a> {
    column: &'a str,
    decision: &'a ColumnTypeDecision,
}

fn handle_classify(args: &cli::ClassifyArgs) -> Result<()> {
    let options = IngestOptions {
        delimiter: args.delimiter,
        encoding: args.input_encoding.clone(),
        max_rows: (args.sample_rows > 0).then_some(args.sample_rows),
    };
    let raw = ingest::read_table(&args.input, &options)
        .with_context(|| format!("Reading {:?}", args.input))?;
    let config = ClassifierConfig {
        min_type_threshold: args.min_type_threshold,
        ..ClassifierConfig::default()
    };
    let decisions = pipeline::classify_table(&raw, &config)?;

    print!(
        "{}",
        report::render_text_table(&report::DECISION_HEADERS, &report::decision_rows(&decisions))
    );
    if let Some(meta) = &args.meta {
        let records: Vec<DecisionRecord> = decisions
            .iter()
            .map(|(column, decision)| DecisionRecord { column, decision })
            .collect();
        let yaml = serde_yaml::to_string(&records).context("Serializing decisions")?;
        std::fs::write(meta, yaml).with_context(|| format!("Writing decisions to {meta:?}"))?;
        info!("Decisions for {} column(s) written to {:?}", decisions.len(), meta);
    }
    Ok(())
}

fn handle_load(args: &cli::LoadArgs) -> Result<()> {
    let options = IngestOptions {
        delimiter: args.delimiter,
        encoding: args.input_encoding.clone(),
        max_rows: None,
    };
    let raw = ingest::read_table(&args.input, &options)
        .with_context(|| format!("Reading {:?}", args.input))?;
    let name = match &args.name {
        Some(name) => name.clone(),
        None => table_name(&args.input),
    };
    let load_options = LoadOptions {
        classifier: ClassifierConfig {
            min_type_threshold: args.min_type_threshold,
            default_date_layout: if args.month_first {
                DateLayout::MonthFirst
            } else {
                DateLayout::DayFirst
            },
            ..ClassifierConfig::default()
        },
        index: IndexConfig {
            max_distinct_ratio: args.max_distinct_ratio,
        },
    };
    let table = pipeline::build_table(&name, raw, &load_options)?;

    let summaries = report::summarize(&table);
    print!(
        "{}",
        report::render_text_table(&report::SUMMARY_HEADERS, &report::summary_rows(&summaries))
    );
    table
        .save(&args.snapshot)
        .with_context(|| format!("Writing snapshot to {:?}", args.snapshot))?;
    info!(
        "Table '{}' ({} rows) written to {:?}",
        table.name(),
        table.row_count(),
        args.snapshot
    );
    Ok(())
}

fn handle_query(args: &cli::QueryArgs) -> Result<()> {
    let config = IndexConfig {
        max_distinct_ratio: args.max_distinct_ratio,
    };
    let table = Table::load(&args.snapshot, &config)?;

    let filters = args
        .filters
        .iter()
        .map(|text| Filter::parse(text))
        .collect::<Result<Vec<_>, _>>()?;
    let predicate = match filters.len() {
        0 => None,
        1 => Some(filters[0].to_predicate(&table)?),
        _ => Some(Predicate::All(
            filters
                .iter()
                .map(|f| f.to_predicate(&table))
                .collect::<Result<Vec<_>, _>>()?,
        )),
    };
    let rows = match &predicate {
        Some(predicate) => query::evaluate(&table, predicate)?,
        None => (0..table.row_count() as u32).collect(),
    };

    if let Some(spec) = &args.aggregate {
        let (op, column) = spec
            .split_once(':')
            .ok_or_else(|| anyhow!("Aggregate must look like 'sum:amount', got '{spec}'"))?;
        let op: AggregateOp = op.parse()?;
        let value = query::aggregate(&table, op, column.trim(), Some(&rows))?;
        println!("{}({}) = {}", op, column.trim(), report::render_aggregate(&value));
        return Ok(());
    }

    print!(
        "{}",
        report::render_text_table(
            &report::result_headers(&table),
            &report::result_rows(&table, &rows, args.limit),
        )
    );
    info!("{} row(s) matched", rows.len());
    Ok(())
}

fn handle_inspect(args: &cli::InspectArgs) -> Result<()> {
    let table = Table::load(&args.snapshot, &IndexConfig::default())?;
    let summaries = report::summarize(&table);
    match args.format {
        ReportFormat::Table => print!(
            "{}",
            report::render_text_table(&report::SUMMARY_HEADERS, &report::summary_rows(&summaries))
        ),
        ReportFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&summaries).context("Serializing summaries")?
            );
        }
        ReportFormat::Yaml => {
            print!(
                "{}",
                serde_yaml::to_string(&summaries).context("Serializing summaries")?
            );
        }
    }
    Ok(())
}

fn table_name(input: &Path) -> String {
    input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("table")
        .to_string()
}
