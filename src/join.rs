//! Streaming key join between the raw table and the sector lookup.
//!
//! [`StreamingJoin`] pulls one row at a time from the raw file, attaches the
//! sector for its classification id and hands the enriched row to the caller.
//! Nothing beyond the current row is buffered, and rows come out in input
//! order. [`EnrichedFileReader`] replays a previously written enriched file
//! through the same interface so the aggregation stage does not care where
//! its rows come from.

use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::{
    columns::{ColumnMap, ColumnResolver, LogicalField},
    config::{PipelineConfig, UNKNOWN_SECTOR, UnmatchedPolicy},
    error::PipelineError,
    io_utils::{self, TableReader},
    lookup::SectorLookup,
    record::{EnrichedRecord, RawRecord, canonical_cells},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub rows_read: usize,
    pub matched: usize,
    pub unmatched_kept: usize,
    pub unmatched_dropped: usize,
    pub unparseable_skipped: usize,
    pub missing_sector: usize,
}

impl JoinStats {
    pub fn emitted(&self) -> usize {
        self.matched + self.unmatched_kept
    }

    pub fn log(&self, source: &Path) {
        info!(
            "{source:?}: {} row(s) read, {} emitted ({} matched, {} as {UNKNOWN_SECTOR})",
            self.rows_read,
            self.emitted(),
            self.matched,
            self.unmatched_kept
        );
        if self.unmatched_dropped > 0 {
            warn!(
                "{source:?}: dropped {} row(s) whose classification id is not in the lookup",
                self.unmatched_dropped
            );
        }
        if self.unparseable_skipped > 0 {
            warn!(
                "{source:?}: skipped {} row(s) with unparseable numbers",
                self.unparseable_skipped
            );
        }
        if self.missing_sector > 0 {
            warn!(
                "{source:?}: skipped {} row(s) without a sector",
                self.missing_sector
            );
        }
    }
}

/// A pull-based source of enriched rows.
pub trait EnrichedStream {
    /// Next emitted row; `None` once the input is exhausted.
    fn next_record(&mut self) -> Result<Option<EnrichedRecord>>;

    fn stats(&self) -> JoinStats;

    fn source(&self) -> &Path;
}

pub struct StreamingJoin<'a> {
    table: TableReader,
    columns: ColumnMap,
    lookup: &'a SectorLookup,
    config: &'a PipelineConfig,
    stats: JoinStats,
}

impl<'a> StreamingJoin<'a> {
    pub fn open(
        path: &Path,
        delimiter: u8,
        lookup: &'a SectorLookup,
        config: &'a PipelineConfig,
    ) -> Result<Self> {
        let table = TableReader::open(path, delimiter)?;
        Self::new(table, lookup, config)
    }

    pub fn new(
        table: TableReader,
        lookup: &'a SectorLookup,
        config: &'a PipelineConfig,
    ) -> Result<Self> {
        let columns = config
            .resolver(ColumnResolver::raw_table())
            .resolve(table.headers())
            .with_context(|| format!("Resolving raw columns in {:?}", table.path()))?;
        debug!("Resolved {} raw column(s)", columns.len());
        Ok(Self {
            table,
            columns,
            lookup,
            config,
            stats: JoinStats::default(),
        })
    }
}

impl EnrichedStream for StreamingJoin<'_> {
    fn next_record(&mut self) -> Result<Option<EnrichedRecord>> {
        while let Some(row) = self.table.next_row()? {
            self.stats.rows_read += 1;
            if self.config.should_report(self.stats.rows_read) {
                info!(
                    "Rows joined: {} (emitted: {})",
                    self.stats.rows_read,
                    self.stats.emitted()
                );
            }

            let id = self
                .columns
                .cell(&row, LogicalField::ClassificationId)
                .unwrap_or("");
            let (sector, matched) = match self.lookup.lookup(id) {
                Some(sector) => (sector, true),
                None => match self.config.unmatched {
                    UnmatchedPolicy::Unknown => (UNKNOWN_SECTOR, false),
                    UnmatchedPolicy::Drop => {
                        let err = PipelineError::LookupKeyNotFound { id: id.to_string() };
                        debug!("Line {}: {err}; row dropped", self.table.line());
                        self.stats.unmatched_dropped += 1;
                        continue;
                    }
                },
            };

            let Some(record) = parse_row(
                &self.columns,
                &row,
                self.config,
                &mut self.stats,
                &self.table,
            )?
            else {
                continue;
            };

            if matched {
                self.stats.matched += 1;
            } else {
                self.stats.unmatched_kept += 1;
            }
            let cells = canonical_cells(&self.columns, &row);
            return Ok(Some(EnrichedRecord::new(record, sector, cells)));
        }
        Ok(None)
    }

    fn stats(&self) -> JoinStats {
        self.stats
    }

    fn source(&self) -> &Path {
        self.table.path()
    }
}

/// Reads an enriched file written by the `enrich` stage (or any file with
/// the raw columns plus a sector column).
pub struct EnrichedFileReader<'a> {
    table: TableReader,
    columns: ColumnMap,
    config: &'a PipelineConfig,
    stats: JoinStats,
}

impl<'a> EnrichedFileReader<'a> {
    pub fn open(path: &Path, config: &'a PipelineConfig) -> Result<Self> {
        let table = TableReader::open(path, io_utils::OUTPUT_DELIMITER)?;
        let columns = config
            .resolver(ColumnResolver::enriched_table())
            .resolve(table.headers())
            .with_context(|| format!("Resolving enriched columns in {path:?}"))?;
        Ok(Self {
            table,
            columns,
            config,
            stats: JoinStats::default(),
        })
    }
}

impl EnrichedStream for EnrichedFileReader<'_> {
    fn next_record(&mut self) -> Result<Option<EnrichedRecord>> {
        while let Some(row) = self.table.next_row()? {
            self.stats.rows_read += 1;
            if self.config.should_report(self.stats.rows_read) {
                info!("Enriched rows read: {}", self.stats.rows_read);
            }
            let sector = self
                .columns
                .cell(&row, LogicalField::Sector)
                .unwrap_or("")
                .to_string();
            if sector.is_empty() {
                self.stats.missing_sector += 1;
                continue;
            }
            let Some(record) = parse_row(
                &self.columns,
                &row,
                self.config,
                &mut self.stats,
                &self.table,
            )?
            else {
                continue;
            };
            if sector == UNKNOWN_SECTOR {
                self.stats.unmatched_kept += 1;
            } else {
                self.stats.matched += 1;
            }
            let cells = canonical_cells(&self.columns, &row);
            return Ok(Some(EnrichedRecord::new(record, sector, cells)));
        }
        Ok(None)
    }

    fn stats(&self) -> JoinStats {
        self.stats
    }

    fn source(&self) -> &Path {
        self.table.path()
    }
}

/// Applies the numeric policy: `Ok(None)` for a skipped row, `Err` in strict mode.
fn parse_row(
    columns: &ColumnMap,
    row: &[String],
    config: &PipelineConfig,
    stats: &mut JoinStats,
    table: &TableReader,
) -> Result<Option<RawRecord>> {
    match RawRecord::parse(columns, row) {
        Ok(record) => Ok(Some(record)),
        Err(err) if config.strict() => Err(err)
            .with_context(|| format!("Parsing line {} of {:?}", table.line(), table.path())),
        Err(err) => {
            debug!("Line {}: {err}; row skipped", table.line());
            stats.unparseable_skipped += 1;
            Ok(None)
        }
    }
}
