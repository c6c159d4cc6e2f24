//! Run-wide policies.
//!
//! A [`PipelineConfig`] is built once per invocation (defaults, then an
//! optional YAML file, then command-line overrides) and passed by reference
//! to every stage.

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    columns::{ColumnResolver, LogicalField},
    error::PipelineError,
};

/// Sector assigned to rows whose classification id is absent from the lookup
/// when [`UnmatchedPolicy::Unknown`] is in effect.
pub const UNKNOWN_SECTOR: &str = "UNKNOWN";

pub const DEFAULT_REPORT_EVERY: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "kebab-case")]
pub enum WageSource {
    #[default]
    AverageWage,
    WageMass,
}

impl WageSource {
    pub fn field(self) -> LogicalField {
        match self {
            WageSource::AverageWage => LogicalField::AverageWage,
            WageSource::WageMass => LogicalField::WageMass,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "kebab-case")]
pub enum UnmatchedPolicy {
    /// Leave the row out of the enriched stream.
    #[default]
    Drop,
    /// Keep the row with sector `UNKNOWN`.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "kebab-case")]
pub enum NumericPolicy {
    /// Skip rows with unparseable numbers and report how many.
    #[default]
    Skip,
    /// Abort on the first unparseable number.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexWeights {
    pub employability: f64,
    pub demand: f64,
    pub wage: f64,
}

impl Default for IndexWeights {
    fn default() -> Self {
        Self {
            employability: 0.33,
            demand: 0.33,
            wage: 0.34,
        }
    }
}

impl IndexWeights {
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, weight) in [
            ("employability", self.employability),
            ("demand", self.demand),
            ("wage", self.wage),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(PipelineError::InvalidWeights(format!(
                    "{name} weight must be a non-negative number, got {weight}"
                )));
            }
        }
        Ok(())
    }

    pub fn sum(&self) -> f64 {
        self.employability + self.demand + self.wage
    }
}

/// Parses `--weights emp,dem,wage`.
pub fn parse_weights(value: &str) -> Result<IndexWeights, String> {
    let parts = value
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("Invalid weight '{}'", part.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        [employability, demand, wage] => {
            let weights = IndexWeights {
                employability: *employability,
                demand: *demand,
                wage: *wage,
            };
            weights.validate().map_err(|err| err.to_string())?;
            Ok(weights)
        }
        _ => Err("Weights must be three comma-separated numbers: employability,demand,wage".into()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub wage_source: WageSource,
    pub include_zero_wages: bool,
    pub unmatched: UnmatchedPolicy,
    pub numeric: NumericPolicy,
    pub report_every: usize,
    pub weights: IndexWeights,
    pub column_aliases: BTreeMap<LogicalField, Vec<String>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            wage_source: WageSource::default(),
            include_zero_wages: false,
            unmatched: UnmatchedPolicy::default(),
            numeric: NumericPolicy::default(),
            report_every: DEFAULT_REPORT_EVERY,
            weights: IndexWeights::default(),
            column_aliases: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: PipelineConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config file {path:?}"))?;
        config
            .weights
            .validate()
            .with_context(|| format!("Validating weights in {path:?}"))?;
        Ok(config)
    }

    /// Applies configured header aliases to one of the built-in resolvers.
    pub fn resolver(&self, base: ColumnResolver) -> ColumnResolver {
        base.with_aliases(&self.column_aliases)
    }

    pub fn strict(&self) -> bool {
        self.numeric == NumericPolicy::Strict
    }

    /// Zero disables progress logging.
    pub fn should_report(&self, rows: usize) -> bool {
        self.report_every > 0 && rows > 0 && rows.is_multiple_of(self.report_every)
    }
}
