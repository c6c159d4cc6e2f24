use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::config::{
    IndexWeights, NumericPolicy, PipelineConfig, UnmatchedPolicy, WageSource, parse_weights,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Build sector employment indicators from RAIS-style exports",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Extract the distinct classification ids and labels of a raw table into a lookup file
    Extract(ExtractArgs),
    /// Attach a sector to every raw row via the lookup file
    Enrich(EnrichArgs),
    /// Group an enriched table by year and sector and compute wage and employability figures
    Aggregate(AggregateArgs),
    /// Min-max normalize an aggregated table per sector and compute the receptivity index
    Normalize(NormalizeArgs),
    /// Run enrich, aggregate and normalize in a single pass over the raw table
    Run(RunArgs),
}

/// Policies shared by every stage. Flags override values from `--config`.
#[derive(Debug, Args, Default, Clone)]
pub struct PolicyArgs {
    /// YAML file with pipeline defaults
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Count zero wages in the wage average and median
    #[arg(long)]
    pub include_zero_wages: bool,
    /// Column feeding the wage statistics
    #[arg(long, value_enum)]
    pub wage_source: Option<WageSource>,
    /// What to do with rows whose classification id is not in the lookup
    #[arg(long, value_enum)]
    pub unmatched: Option<UnmatchedPolicy>,
    /// Abort on the first unparseable number instead of skipping the row
    #[arg(long)]
    pub strict: bool,
    /// Log progress every N rows (0 disables)
    #[arg(long)]
    pub report_every: Option<usize>,
}

impl PolicyArgs {
    /// Defaults, then the YAML file, then explicit flags.
    pub fn load_config(&self, weights: Option<IndexWeights>) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if self.include_zero_wages {
            config.include_zero_wages = true;
        }
        if let Some(source) = self.wage_source {
            config.wage_source = source;
        }
        if let Some(policy) = self.unmatched {
            config.unmatched = policy;
        }
        if self.strict {
            config.numeric = NumericPolicy::Strict;
        }
        if let Some(every) = self.report_every {
            config.report_every = every;
        }
        if let Some(weights) = weights {
            config.weights = weights;
        }
        Ok(config)
    }
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Raw table to scan
    #[arg(short, long)]
    pub input: PathBuf,
    /// Destination lookup file (`classification_id,label`)
    #[arg(short, long)]
    pub output: PathBuf,
    /// Delimiter of the raw table (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter, default_value = ";")]
    pub delimiter: u8,
    #[command(flatten)]
    pub policy: PolicyArgs,
}

#[derive(Debug, Args)]
pub struct EnrichArgs {
    /// Raw table (`;`-separated unless --delimiter says otherwise)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Sector lookup file (`,`-separated)
    #[arg(short, long)]
    pub lookup: PathBuf,
    /// Destination enriched table
    #[arg(short, long)]
    pub output: PathBuf,
    /// Delimiter of the raw table
    #[arg(long, value_parser = parse_delimiter, default_value = ";")]
    pub delimiter: u8,
    #[command(flatten)]
    pub policy: PolicyArgs,
}

#[derive(Debug, Args)]
pub struct AggregateArgs {
    /// Enriched table written by `enrich`
    #[arg(short, long)]
    pub input: PathBuf,
    /// JSON object mapping year to unemployment rate in percent
    #[arg(short, long)]
    pub rates: PathBuf,
    /// Destination aggregated table
    #[arg(short, long)]
    pub output: PathBuf,
    #[command(flatten)]
    pub policy: PolicyArgs,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// Aggregated table written by `aggregate`
    #[arg(short, long)]
    pub input: PathBuf,
    /// Destination normalized table
    #[arg(short, long)]
    pub output: PathBuf,
    /// Index weights as employability,demand,wage
    #[arg(long, value_parser = parse_weights)]
    pub weights: Option<IndexWeights>,
    #[command(flatten)]
    pub policy: PolicyArgs,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Raw table
    #[arg(short, long)]
    pub input: PathBuf,
    /// Sector lookup file
    #[arg(short, long)]
    pub lookup: PathBuf,
    /// JSON object mapping year to unemployment rate in percent
    #[arg(short, long)]
    pub rates: PathBuf,
    /// Destination normalized table
    #[arg(short, long)]
    pub output: PathBuf,
    /// Also write the enriched table here
    #[arg(long)]
    pub enriched_output: Option<PathBuf>,
    /// Also write the aggregated table here
    #[arg(long)]
    pub aggregated_output: Option<PathBuf>,
    /// Delimiter of the raw table
    #[arg(long, value_parser = parse_delimiter, default_value = ";")]
    pub delimiter: u8,
    /// Index weights as employability,demand,wage
    #[arg(long, value_parser = parse_weights)]
    pub weights: Option<IndexWeights>,
    /// Print a summary table of row and group counts when done
    #[arg(long)]
    pub summary: bool,
    #[command(flatten)]
    pub policy: PolicyArgs,
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
            if !first.is_ascii() || first == '"' || first == '\n' {
                return Err(format!("Delimiter '{first}' is not usable"));
            }
            Ok(first as u8)
        }
    }
}
