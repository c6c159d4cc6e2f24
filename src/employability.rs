//! Unemployment rates and the employability ratio derived from them.
//!
//! ```text
//! estimated_unemployed = employed * (rate / 100) / (1 - rate / 100)
//! employability        = employed / (employed + estimated_unemployed)
//! ```

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

use crate::{
    error::PipelineError,
    io_utils, numeric,
};

/// `year → rate` in percent, read once from a JSON object such as
/// `{"2019": 11.5, "2020": "13,8"}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnemploymentRates {
    rates: BTreeMap<i32, f64>,
}

impl UnemploymentRates {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (i32, f64)>,
    {
        Self {
            rates: pairs.into_iter().collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading unemployment rates from {path:?}");
        let encoding = io_utils::sniff_encoding(path)?;
        let bytes = fs::read(path).with_context(|| format!("Reading rates file {path:?}"))?;
        let text = io_utils::decode_bytes(&bytes, encoding).ok_or_else(|| {
            PipelineError::EncodingDecodeFailure {
                path: path.to_path_buf(),
            }
        })?;
        let rates = Self::parse_json(text.trim_start_matches('\u{feff}'))
            .with_context(|| format!("Parsing rates file {path:?}"))?;
        info!(
            "Rates loaded for year(s): {}",
            rates
                .rates
                .keys()
                .map(|year| year.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(rates)
    }

    /// Entries whose year or rate cannot be read are skipped with a warning.
    pub fn parse_json(text: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(text)?;
        let object = document
            .as_object()
            .ok_or_else(|| anyhow!("Expected a JSON object mapping year to rate"))?;
        let mut rates = BTreeMap::new();
        for (key, value) in object {
            let Ok(year) = numeric::parse_year(key) else {
                warn!("Ignoring rate entry with invalid year '{key}'");
                continue;
            };
            let rate = match value {
                Value::Number(number) => number.as_f64(),
                Value::String(raw) => numeric::parse_decimal(raw)
                    .ok()
                    .and_then(|d| d.to_f64()),
                _ => None,
            };
            match rate {
                Some(rate) => {
                    rates.insert(year, rate);
                }
                None => warn!("Ignoring invalid unemployment rate for year {year}: {value}"),
            }
        }
        Ok(Self { rates })
    }

    pub fn rate(&self, year: i32) -> Result<f64, PipelineError> {
        self.rates
            .get(&year)
            .copied()
            .ok_or(PipelineError::MissingRateForYear { year })
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Employability {
    pub estimated_unemployed: f64,
    pub ratio: f64,
}

/// Rates must lie in `[0, 100)`; 100 would divide by zero.
pub fn compute(
    year: i32,
    sector: &str,
    employment_count: i64,
    rate: f64,
) -> Result<Employability, PipelineError> {
    if !rate.is_finite() || !(0.0..100.0).contains(&rate) {
        return Err(PipelineError::InvalidRate { year, rate });
    }
    if employment_count <= 0 {
        return Err(PipelineError::NoEmployment {
            year,
            sector: sector.to_string(),
        });
    }
    let employed = employment_count as f64;
    let fraction = rate / 100.0;
    let estimated_unemployed = employed * fraction / (1.0 - fraction);
    Ok(Employability {
        estimated_unemployed,
        ratio: employed / (employed + estimated_unemployed),
    })
}
