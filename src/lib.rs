pub mod aggregate;
pub mod cli;
pub mod columns;
pub mod config;
pub mod employability;
pub mod error;
pub mod io_utils;
pub mod join;
pub mod lookup;
pub mod normalize;
pub mod numeric;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod table;
pub mod wages;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sector_indicators", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Extract(args) => handle_extract(&args),
        Commands::Enrich(args) => handle_enrich(&args),
        Commands::Aggregate(args) => handle_aggregate(&args),
        Commands::Normalize(args) => handle_normalize(&args),
        Commands::Run(args) => handle_run(&args),
    }
}

fn handle_extract(args: &cli::ExtractArgs) -> Result<()> {
    let config = args.policy.load_config(None)?;
    lookup::extract_lookup(&args.input, args.delimiter, &args.output, &config)?;
    Ok(())
}

fn handle_enrich(args: &cli::EnrichArgs) -> Result<()> {
    let config = args.policy.load_config(None)?;
    info!(
        "Enriching {:?} (delimiter '{}') with sectors from {:?}",
        args.input,
        printable_delimiter(args.delimiter),
        args.lookup
    );
    pipeline::enrich(
        &args.input,
        args.delimiter,
        &args.lookup,
        &args.output,
        &config,
    )?;
    Ok(())
}

fn handle_aggregate(args: &cli::AggregateArgs) -> Result<()> {
    let config = args.policy.load_config(None)?;
    let summary = pipeline::aggregate(&args.input, &args.rates, &args.output, &config)?;
    info!(
        "Aggregated {} row(s) into {} group(s)",
        summary.join.emitted(),
        summary.groups.groups
    );
    Ok(())
}

fn handle_normalize(args: &cli::NormalizeArgs) -> Result<()> {
    let config = args.policy.load_config(args.weights)?;
    pipeline::normalize(&args.input, &args.output, &config)?;
    Ok(())
}

fn handle_run(args: &cli::RunArgs) -> Result<()> {
    let config = args.policy.load_config(args.weights)?;
    let paths = pipeline::RunPaths {
        input: args.input.clone(),
        delimiter: args.delimiter,
        lookup: args.lookup.clone(),
        rates: args.rates.clone(),
        output: args.output.clone(),
        enriched_output: args.enriched_output.clone(),
        aggregated_output: args.aggregated_output.clone(),
    };
    let summary = pipeline::run(&paths, &config)?;
    info!(
        "Run complete: {} row(s) read, {} group(s), output {:?}",
        summary.join.rows_read, summary.groups.groups, args.output
    );
    if args.summary {
        table::print_metrics(&summary.metrics());
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
