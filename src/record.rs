//! Typed views of raw and enriched rows.

use rust_decimal::Decimal;

use crate::{
    columns::{ColumnMap, LogicalField},
    error::Result,
    numeric,
};

/// Column order of the enriched output, before the trailing `sector`.
pub const CANONICAL_FIELDS: [LogicalField; 7] = [
    LogicalField::Year,
    LogicalField::ClassificationId,
    LogicalField::ClassificationLabel,
    LogicalField::WageMass,
    LogicalField::AverageWage,
    LogicalField::EmploymentCount,
    LogicalField::OpportunityGain,
];

pub fn enriched_headers() -> Vec<String> {
    CANONICAL_FIELDS
        .iter()
        .chain(std::iter::once(&LogicalField::Sector))
        .map(|field| field.name().to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub year: i32,
    pub classification_id: String,
    pub classification_label: Option<String>,
    pub wage_mass: Decimal,
    pub average_wage: Decimal,
    pub employment_count: i64,
    pub opportunity_gain: Option<Decimal>,
}

impl RawRecord {
    /// Parses one decoded row. Any required numeric cell that does not parse
    /// fails the whole row with `UnparseableNumber`.
    pub fn parse(map: &ColumnMap, row: &[String]) -> Result<Self> {
        let cell = |field| map.cell(row, field).unwrap_or("");
        let classification_label = map
            .cell(row, LogicalField::ClassificationLabel)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let opportunity_gain = match map.cell(row, LogicalField::OpportunityGain) {
            Some(raw) => numeric::parse_optional_decimal(raw)?,
            None => None,
        };
        Ok(Self {
            year: numeric::parse_year(cell(LogicalField::Year))?,
            classification_id: cell(LogicalField::ClassificationId).to_string(),
            classification_label,
            wage_mass: numeric::parse_decimal(cell(LogicalField::WageMass))?,
            average_wage: numeric::parse_decimal(cell(LogicalField::AverageWage))?,
            employment_count: numeric::parse_integer(cell(LogicalField::EmploymentCount))?,
            opportunity_gain,
        })
    }
}

/// A raw row with its sector attached. `cells` holds the trimmed original
/// tokens in [`CANONICAL_FIELDS`] order so the row can be written back out
/// without re-rendering any number.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub record: RawRecord,
    pub sector: String,
    cells: Vec<String>,
}

impl EnrichedRecord {
    pub fn new(record: RawRecord, sector: impl Into<String>, cells: Vec<String>) -> Self {
        Self {
            record,
            sector: sector.into(),
            cells,
        }
    }

    /// Builds a record straight from typed values; cells are rendered from them.
    pub fn from_values(record: RawRecord, sector: impl Into<String>) -> Self {
        let cells = vec![
            record.year.to_string(),
            record.classification_id.clone(),
            record.classification_label.clone().unwrap_or_default(),
            record.wage_mass.to_string(),
            record.average_wage.to_string(),
            record.employment_count.to_string(),
            record
                .opportunity_gain
                .map(|v| v.to_string())
                .unwrap_or_default(),
        ];
        Self::new(record, sector, cells)
    }

    pub fn output_row(&self) -> Vec<&str> {
        self.cells
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.sector.as_str()))
            .collect()
    }
}

pub fn canonical_cells(map: &ColumnMap, row: &[String]) -> Vec<String> {
    CANONICAL_FIELDS
        .iter()
        .map(|field| map.cell(row, *field).unwrap_or("").to_string())
        .collect()
}
