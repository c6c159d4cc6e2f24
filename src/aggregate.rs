//! Grouping of enriched rows by `(year, sector)`.
//!
//! [`GroupedAggregator::fold`] is called once per enriched row and keeps one
//! [`GroupAccumulator`] per group. Only the eligible wages of a group are
//! retained so the exact median can be computed once the stream ends.
//! [`summarize`] then turns the groups into [`AggregatedRow`]s ordered by
//! `(year, sector)`.

use std::collections::{BTreeSet, HashMap};

use anyhow::Context;
use log::{debug, info, warn};
use rust_decimal::Decimal;

use crate::{
    config::{PipelineConfig, WageSource},
    employability::{self, UnemploymentRates},
    error::PipelineError,
    record::EnrichedRecord,
    wages::{self, WageStats},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub year: i32,
    pub sector: String,
}

impl GroupKey {
    pub fn new(year: i32, sector: impl Into<String>) -> Self {
        Self {
            year,
            sector: sector.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupAccumulator {
    employment_count: i64,
    wage_sum: Decimal,
    wages: Vec<Decimal>,
    records: usize,
    zero_wages_excluded: usize,
}

impl GroupAccumulator {
    /// Employment is always summed; a zero wage only counts toward the wage
    /// statistics when `include_zero_wages` is set. On overflow the group is
    /// left unchanged.
    pub fn fold(
        &mut self,
        employment_count: i64,
        wage: Decimal,
        include_zero_wages: bool,
    ) -> Result<(), PipelineError> {
        let employment = self
            .employment_count
            .checked_add(employment_count)
            .ok_or(PipelineError::SumOverflow {
                column: "employment_count",
            })?;
        let eligible = !wage.is_zero() || include_zero_wages;
        let wage_sum = if eligible {
            self.wage_sum
                .checked_add(wage)
                .ok_or(PipelineError::SumOverflow { column: "wage" })?
        } else {
            self.wage_sum
        };

        self.records += 1;
        self.employment_count = employment;
        if eligible {
            self.wage_sum = wage_sum;
            self.wages.push(wage);
        } else {
            self.zero_wages_excluded += 1;
        }
        Ok(())
    }

    pub fn employment_count(&self) -> i64 {
        self.employment_count
    }

    pub fn wage_sum(&self) -> Decimal {
        self.wage_sum
    }

    pub fn wage_count(&self) -> usize {
        self.wages.len()
    }

    pub fn wages_mut(&mut self) -> &mut [Decimal] {
        &mut self.wages
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn zero_wages_excluded(&self) -> usize {
        self.zero_wages_excluded
    }
}

pub struct GroupedAggregator {
    wage_source: WageSource,
    include_zero_wages: bool,
    report_every: usize,
    folded: usize,
    groups: HashMap<GroupKey, GroupAccumulator>,
}

impl GroupedAggregator {
    pub fn new(config: &PipelineConfig) -> Self {
        debug!(
            "Aggregating wages from {} (zero wages {})",
            config.wage_source.field().name(),
            if config.include_zero_wages {
                "included"
            } else {
                "excluded"
            }
        );
        Self {
            wage_source: config.wage_source,
            include_zero_wages: config.include_zero_wages,
            report_every: config.report_every,
            folded: 0,
            groups: HashMap::new(),
        }
    }

    pub fn fold(&mut self, enriched: &EnrichedRecord) -> anyhow::Result<()> {
        let record = &enriched.record;
        let wage = match self.wage_source {
            WageSource::AverageWage => record.average_wage,
            WageSource::WageMass => record.wage_mass,
        };
        let key = GroupKey::new(record.year, enriched.sector.as_str());
        self.groups
            .entry(key)
            .or_default()
            .fold(record.employment_count, wage, self.include_zero_wages)
            .with_context(|| {
                format!(
                    "Folding {} into group ({}, {})",
                    self.wage_source.field().name(),
                    record.year,
                    enriched.sector
                )
            })?;
        self.folded += 1;
        if self.report_every > 0 && self.folded.is_multiple_of(self.report_every) {
            info!("Rows aggregated: {}; groups: {}", self.folded, self.groups.len());
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in `(year, sector)` order.
    pub fn finish(self) -> Vec<(GroupKey, GroupAccumulator)> {
        let mut groups = self.groups.into_iter().collect::<Vec<_>>();
        groups.sort_by(|a, b| a.0.cmp(&b.0));
        groups
    }
}

/// One output row per `(year, sector)` group.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRow {
    pub year: i32,
    pub sector: String,
    /// Employment demand: the summed employment count of the group.
    pub employment_count: i64,
    pub average_wage: Option<Decimal>,
    pub median_wage: Option<Decimal>,
    pub employability: Option<f64>,
}

/// What happened to the groups while their rows were being built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupReport {
    pub groups: usize,
    pub missing_rate_groups: usize,
    pub missing_rate_years: BTreeSet<i32>,
    pub invalid_rate_groups: usize,
    pub no_employment_groups: usize,
    pub groups_without_wages: usize,
    pub zero_wages_excluded: usize,
}

impl GroupReport {
    pub fn log(&self) {
        if !self.missing_rate_years.is_empty() {
            warn!(
                "No unemployment rate for year(s) {}; employability left empty for {} group(s)",
                self.missing_rate_years
                    .iter()
                    .map(|year| year.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                self.missing_rate_groups
            );
        }
        if self.invalid_rate_groups > 0 {
            warn!(
                "Employability left empty for {} group(s) with an invalid unemployment rate",
                self.invalid_rate_groups
            );
        }
        if self.no_employment_groups > 0 {
            warn!(
                "Employability left empty for {} group(s) with no employment",
                self.no_employment_groups
            );
        }
        if self.groups_without_wages > 0 {
            warn!(
                "{} group(s) had no eligible wage; wage statistics left empty",
                self.groups_without_wages
            );
        }
    }
}

/// Computes wage statistics and employability for each group. Group-level
/// failures leave the affected value empty and are tallied in the report.
pub fn summarize(
    groups: Vec<(GroupKey, GroupAccumulator)>,
    rates: &UnemploymentRates,
) -> (Vec<AggregatedRow>, GroupReport) {
    let mut report = GroupReport {
        groups: groups.len(),
        ..GroupReport::default()
    };
    let mut rows = Vec::with_capacity(groups.len());

    for (key, mut group) in groups {
        report.zero_wages_excluded += group.zero_wages_excluded();
        let WageStats {
            observations,
            average,
            median,
        } = wages::wage_statistics(&mut group);
        if observations == 0 {
            report.groups_without_wages += 1;
        }

        let employment_count = group.employment_count();
        let employability = match rates.rate(key.year).and_then(|rate| {
            employability::compute(key.year, &key.sector, employment_count, rate)
        }) {
            Ok(result) => Some(result.ratio),
            Err(err) => {
                debug!("Group ({}, {}): {err}", key.year, key.sector);
                match err {
                    PipelineError::MissingRateForYear { year } => {
                        report.missing_rate_groups += 1;
                        report.missing_rate_years.insert(year);
                    }
                    PipelineError::InvalidRate { .. } => report.invalid_rate_groups += 1,
                    _ => report.no_employment_groups += 1,
                }
                None
            }
        };

        rows.push(AggregatedRow {
            year: key.year,
            sector: key.sector,
            employment_count,
            average_wage: average,
            median_wage: median,
            employability,
        });
    }
    (rows, report)
}
