//! Aggregated and normalized tables on disk.
//!
//! Both tables are `;`-separated UTF-8 with one header row. Decimal values
//! and ratios are written with six fractional digits; a missing value is an
//! empty cell.

use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

use crate::{
    aggregate::AggregatedRow,
    columns::{ColumnMap, ColumnResolver, LogicalField},
    config::PipelineConfig,
    error::PipelineError,
    io_utils::{self, AtomicCsvWriter, TableReader},
    normalize::NormalizedRow,
    numeric,
};

pub const OUTPUT_SCALE: u32 = 6;

pub const AGGREGATED_HEADERS: [&str; 6] = [
    "year",
    "sector",
    "employment_count",
    "average_wage",
    "median_wage",
    "employability",
];

pub const NORMALIZED_EXTRA_HEADERS: [&str; 3] = [
    "demand_normalized",
    "wage_median_normalized",
    "receptivity_index",
];

pub fn format_decimal(value: Option<Decimal>) -> String {
    value
        .map(|v| {
            let rounded =
                v.round_dp_with_strategy(OUTPUT_SCALE, RoundingStrategy::MidpointAwayFromZero);
            format!("{rounded:.6}")
        })
        .unwrap_or_default()
}

pub fn format_ratio(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

fn aggregated_cells(row: &AggregatedRow) -> Vec<String> {
    vec![
        row.year.to_string(),
        row.sector.clone(),
        row.employment_count.to_string(),
        format_decimal(row.average_wage),
        format_decimal(row.median_wage),
        format_ratio(row.employability),
    ]
}

/// Opens an aggregated table for writing and emits its header row.
pub fn aggregated_writer(path: &Path) -> Result<AtomicCsvWriter> {
    let mut writer = AtomicCsvWriter::create(path, io_utils::OUTPUT_DELIMITER)?;
    writer.write_record(AGGREGATED_HEADERS)?;
    Ok(writer)
}

pub fn write_aggregated_rows(writer: &mut AtomicCsvWriter, rows: &[AggregatedRow]) -> Result<()> {
    for row in rows {
        writer.write_record(aggregated_cells(row))?;
    }
    Ok(())
}

pub fn write_aggregated(path: &Path, rows: &[AggregatedRow]) -> Result<()> {
    let mut writer = aggregated_writer(path)?;
    write_aggregated_rows(&mut writer, rows)?;
    writer.finish()?;
    info!("Wrote {} aggregated row(s) to {path:?}", rows.len());
    Ok(())
}

pub fn normalized_writer(path: &Path) -> Result<AtomicCsvWriter> {
    let mut writer = AtomicCsvWriter::create(path, io_utils::OUTPUT_DELIMITER)?;
    writer.write_record(AGGREGATED_HEADERS.iter().chain(NORMALIZED_EXTRA_HEADERS.iter()))?;
    Ok(writer)
}

pub fn write_normalized_rows(writer: &mut AtomicCsvWriter, rows: &[NormalizedRow]) -> Result<()> {
    for row in rows {
        let mut cells = aggregated_cells(&row.row);
        cells.push(format_ratio(Some(row.demand_normalized)));
        cells.push(format_ratio(row.wage_median_normalized));
        cells.push(format_ratio(Some(row.receptivity_index)));
        writer.write_record(cells)?;
    }
    Ok(())
}

pub fn write_normalized(path: &Path, rows: &[NormalizedRow]) -> Result<()> {
    let mut writer = normalized_writer(path)?;
    write_normalized_rows(&mut writer, rows)?;
    writer.finish()?;
    info!("Wrote {} normalized row(s) to {path:?}", rows.len());
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatedReadStats {
    pub rows_read: usize,
    pub skipped: usize,
}

/// Reads an aggregated table, either this crate's own output or one using
/// the older Portuguese headers (`ano`, `setor`, `demanda`, ...).
pub fn read_aggregated(
    path: &Path,
    config: &PipelineConfig,
) -> Result<(Vec<AggregatedRow>, AggregatedReadStats)> {
    let mut table = TableReader::open(path, io_utils::OUTPUT_DELIMITER)?;
    let columns = config
        .resolver(ColumnResolver::aggregated_table())
        .resolve(table.headers())
        .with_context(|| format!("Resolving aggregated columns in {path:?}"))?;

    let mut rows = Vec::new();
    let mut stats = AggregatedReadStats::default();
    while let Some(raw) = table.next_row()? {
        stats.rows_read += 1;
        match parse_aggregated(&columns, &raw) {
            Ok(row) => rows.push(row),
            Err(err) if config.strict() => {
                return Err(err).with_context(|| {
                    format!("Parsing line {} of {path:?}", table.line())
                });
            }
            Err(err) => {
                debug!("Line {}: {err}; row skipped", table.line());
                stats.skipped += 1;
            }
        }
    }
    if stats.skipped > 0 {
        warn!("{path:?}: skipped {} unreadable aggregated row(s)", stats.skipped);
    }
    info!("Read {} aggregated row(s) from {path:?}", rows.len());
    Ok((rows, stats))
}

fn parse_aggregated(columns: &ColumnMap, row: &[String]) -> Result<AggregatedRow, PipelineError> {
    let cell = |field| columns.cell(row, field).unwrap_or("");
    let optional = |field| match columns.cell(row, field) {
        Some(raw) => numeric::parse_optional_decimal(raw),
        None => Ok(None),
    };
    let sector = cell(LogicalField::Sector);
    if sector.is_empty() {
        return Err(PipelineError::unparseable(sector));
    }
    Ok(AggregatedRow {
        year: numeric::parse_year(cell(LogicalField::Year))?,
        sector: sector.to_string(),
        employment_count: numeric::parse_integer(cell(LogicalField::EmploymentCount))?,
        average_wage: optional(LogicalField::AverageWage)?,
        median_wage: optional(LogicalField::MedianWage)?,
        employability: optional(LogicalField::Employability)?.and_then(|v| v.to_f64()),
    })
}
