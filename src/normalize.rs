//! Per-sector min-max scaling and the composite receptivity index.
//!
//! Within each sector, over all of its years, employment demand and median
//! wage are rescaled to `[0, 1]`. A sector whose values never vary scales to
//! `0.0`. A missing median stays missing and does not move the bounds.

use std::collections::HashMap;

use log::{debug, warn};
use rust_decimal::{Decimal, prelude::ToPrimitive};

use crate::{aggregate::AggregatedRow, config::IndexWeights};

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub row: AggregatedRow,
    pub demand_normalized: f64,
    pub wage_median_normalized: Option<f64>,
    pub receptivity_index: f64,
}

#[derive(Debug, Clone, Copy)]
struct Bounds<T> {
    min: T,
    max: T,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    fn new(value: T) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    fn extend(&mut self, value: T) {
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }
}

#[derive(Debug, Default)]
struct SectorBounds {
    demand: Option<Bounds<i64>>,
    wage: Option<Bounds<Decimal>>,
}

fn extend<T: PartialOrd + Copy>(slot: &mut Option<Bounds<T>>, value: T) {
    match slot {
        Some(bounds) => bounds.extend(value),
        None => *slot = Some(Bounds::new(value)),
    }
}

/// `(value - min) / (max - min)`, or `0.0` when `max == min`.
pub fn min_max(value: f64, min: f64, max: f64) -> f64 {
    let span = max - min;
    if span == 0.0 { 0.0 } else { (value - min) / span }
}

fn scale_decimal(value: Decimal, bounds: Bounds<Decimal>) -> f64 {
    let Some(span) = bounds.max.checked_sub(bounds.min) else {
        return min_max(
            value.to_f64().unwrap_or(0.0),
            bounds.min.to_f64().unwrap_or(0.0),
            bounds.max.to_f64().unwrap_or(0.0),
        );
    };
    if span.is_zero() {
        return 0.0;
    }
    // min <= value <= max, so the offset fits whenever the span does.
    ((value - bounds.min) / span).to_f64().unwrap_or(0.0)
}

/// Weighted sum of the available components; a missing component counts as zero.
pub fn receptivity_index(
    weights: &IndexWeights,
    employability: Option<f64>,
    demand_normalized: f64,
    wage_median_normalized: Option<f64>,
) -> f64 {
    weights.employability * employability.unwrap_or(0.0)
        + weights.demand * demand_normalized
        + weights.wage * wage_median_normalized.unwrap_or(0.0)
}

/// Output row `i` comes from input row `i`.
pub fn normalize_rows(rows: Vec<AggregatedRow>, weights: &IndexWeights) -> Vec<NormalizedRow> {
    if (weights.sum() - 1.0).abs() > 1e-9 {
        warn!(
            "Index weights sum to {} rather than 1; receptivity index is not bounded by 1",
            weights.sum()
        );
    }

    let mut bounds: HashMap<String, SectorBounds> = HashMap::new();
    for row in &rows {
        let sector = bounds.entry(row.sector.clone()).or_default();
        extend(&mut sector.demand, row.employment_count);
        if let Some(median) = row.median_wage {
            extend(&mut sector.wage, median);
        }
    }
    debug!("Normalizing {} row(s) across {} sector(s)", rows.len(), bounds.len());

    rows.into_iter()
        .map(|row| {
            let sector = bounds.get(&row.sector);
            let demand_normalized = sector
                .and_then(|s| s.demand)
                .map(|b| min_max(row.employment_count as f64, b.min as f64, b.max as f64))
                .unwrap_or(0.0);
            let wage_median_normalized = row.median_wage.and_then(|median| {
                sector
                    .and_then(|s| s.wage)
                    .map(|b| scale_decimal(median, b))
            });
            let receptivity_index = receptivity_index(
                weights,
                row.employability,
                demand_normalized,
                wage_median_normalized,
            );
            NormalizedRow {
                row,
                demand_normalized,
                wage_median_normalized,
                receptivity_index,
            }
        })
        .collect()
}
