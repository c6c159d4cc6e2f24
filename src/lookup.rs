//! Classification id → sector lookup.
//!
//! The table is small (one row per distinct classification id) and is built
//! once before the raw table is streamed. After construction it is only
//! read, so a shared reference can be handed to any number of readers.

use std::{cmp::Ordering, collections::HashMap, path::Path};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::{
    columns::{ColumnResolver, LogicalField},
    config::PipelineConfig,
    io_utils::{self, AtomicCsvWriter, TableReader},
};

#[derive(Debug, Clone, Default)]
pub struct SectorLookup {
    entries: HashMap<String, String>,
    duplicates: usize,
}

impl SectorLookup {
    /// Builds the table keeping the first label seen for each id.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut lookup = SectorLookup::default();
        for (id, sector) in pairs {
            lookup.insert_first(id.into(), sector.into());
        }
        lookup
    }

    fn insert_first(&mut self, id: String, sector: String) {
        match self.entries.entry(id) {
            std::collections::hash_map::Entry::Occupied(existing) => {
                debug!(
                    "Dropping duplicate classification id '{}' (keeping '{}', ignoring '{sector}')",
                    existing.key(),
                    existing.get()
                );
                self.duplicates += 1;
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(sector);
            }
        }
    }

    /// Loads a `,`-separated `classification_id,label` file.
    pub fn load(path: &Path, config: &PipelineConfig) -> Result<Self> {
        info!("Loading sector lookup from {path:?}");
        let mut table = TableReader::open(path, io_utils::LOOKUP_DELIMITER)?;
        let columns = config
            .resolver(ColumnResolver::lookup_table())
            .resolve(table.headers())
            .with_context(|| format!("Resolving lookup columns in {path:?}"))?;

        let mut lookup = SectorLookup::default();
        let mut blank = 0usize;
        while let Some(row) = table.next_row()? {
            let id = columns
                .cell(&row, LogicalField::ClassificationId)
                .unwrap_or("");
            let label = columns.cell(&row, LogicalField::LookupLabel).unwrap_or("");
            if id.is_empty() || label.is_empty() {
                blank += 1;
                continue;
            }
            lookup.insert_first(id.to_string(), label.to_string());
        }

        if lookup.duplicates > 0 {
            warn!(
                "Sector lookup {path:?}: dropped {} duplicate classification id(s)",
                lookup.duplicates
            );
        }
        if blank > 0 {
            warn!("Sector lookup {path:?}: skipped {blank} row(s) without id or label");
        }
        info!("Loaded {} classification id(s)", lookup.len());
        Ok(lookup)
    }

    pub fn lookup(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractSummary {
    pub rows_read: usize,
    pub distinct_ids: usize,
    pub skipped_rows: usize,
}

/// Scans the raw table once and writes its distinct `(id, label)` pairs,
/// first occurrence winning, ordered by id.
pub fn extract_lookup(
    input: &Path,
    delimiter: u8,
    output: &Path,
    config: &PipelineConfig,
) -> Result<ExtractSummary> {
    info!(
        "Extracting classification ids from {input:?} (delimiter '{}')",
        crate::printable_delimiter(delimiter)
    );
    let mut table = TableReader::open(input, delimiter)?;
    let columns = config
        .resolver(ColumnResolver::extraction_table())
        .resolve(table.headers())
        .with_context(|| format!("Resolving columns in {input:?}"))?;

    let mut labels: HashMap<String, String> = HashMap::new();
    let mut summary = ExtractSummary::default();
    while let Some(row) = table.next_row()? {
        summary.rows_read += 1;
        let id = columns
            .cell(&row, LogicalField::ClassificationId)
            .unwrap_or("");
        if id.is_empty() {
            summary.skipped_rows += 1;
            continue;
        }
        if !labels.contains_key(id) {
            let label = columns
                .cell(&row, LogicalField::ClassificationLabel)
                .unwrap_or("");
            labels.insert(id.to_string(), label.to_string());
        }
        if config.should_report(summary.rows_read) {
            info!(
                "Rows scanned: {}; distinct ids: {}",
                summary.rows_read,
                labels.len()
            );
        }
    }

    let mut entries = labels.into_iter().collect::<Vec<_>>();
    entries.sort_by(|a, b| compare_ids(&a.0, &b.0));
    summary.distinct_ids = entries.len();

    let mut writer = AtomicCsvWriter::create(output, io_utils::LOOKUP_DELIMITER)?;
    writer.write_record([
        LogicalField::ClassificationId.name(),
        LogicalField::LookupLabel.name(),
    ])?;
    for (id, label) in &entries {
        writer.write_record([id, label])?;
    }
    writer.finish()?;

    info!(
        "Extracted {} distinct classification id(s) from {} row(s) into {output:?}",
        summary.distinct_ids, summary.rows_read
    );
    Ok(summary)
}

/// Integer ids first in numeric order, then the rest lexicographically.
fn compare_ids(left: &str, right: &str) -> Ordering {
    match (left.parse::<u64>(), right.parse::<u64>()) {
        (Ok(l), Ok(r)) => l.cmp(&r).then_with(|| left.cmp(right)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => left.cmp(right),
    }
}
