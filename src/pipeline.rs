//! Stage drivers.
//!
//! Each stage can run on its own against files on disk, and [`run`] chains
//! them in one pass: the raw table is streamed through the join, every
//! enriched row is folded into its group (and optionally written out), and
//! the finished groups are summarized and normalized in memory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use crate::{
    aggregate::{self, GroupReport, GroupedAggregator},
    config::PipelineConfig,
    employability::UnemploymentRates,
    io_utils::{self, AtomicCsvWriter},
    join::{EnrichedFileReader, EnrichedStream, JoinStats, StreamingJoin},
    lookup::SectorLookup,
    normalize,
    output::{self, AggregatedReadStats},
    record,
};

fn enriched_writer(path: &Path) -> Result<AtomicCsvWriter> {
    let mut writer = AtomicCsvWriter::create(path, io_utils::OUTPUT_DELIMITER)?;
    writer.write_record(record::enriched_headers())?;
    Ok(writer)
}

/// Drains `stream`, folding each row into `aggregator` and copying it to
/// `sink` when one is given.
fn drain<S>(
    stream: &mut S,
    mut aggregator: Option<&mut GroupedAggregator>,
    mut sink: Option<&mut AtomicCsvWriter>,
) -> Result<JoinStats>
where
    S: EnrichedStream,
{
    while let Some(enriched) = stream.next_record()? {
        if let Some(writer) = sink.as_deref_mut() {
            writer.write_record(enriched.output_row())?;
        }
        if let Some(aggregator) = aggregator.as_deref_mut() {
            aggregator.fold(&enriched).with_context(|| {
                format!(
                    "Aggregating {:?} at row {}",
                    stream.source(),
                    stream.stats().rows_read
                )
            })?;
        }
    }
    let stats = stream.stats();
    stats.log(stream.source());
    Ok(stats)
}

pub fn enrich(
    input: &Path,
    delimiter: u8,
    lookup_path: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<JoinStats> {
    let lookup = SectorLookup::load(lookup_path, config)?;
    let mut join = StreamingJoin::open(input, delimiter, &lookup, config)?;
    let mut writer = enriched_writer(output)?;
    let stats = drain(&mut join, None, Some(&mut writer))?;
    writer.finish()?;
    info!("Wrote {} enriched row(s) to {output:?}", stats.emitted());
    Ok(stats)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateSummary {
    pub join: JoinStats,
    pub groups: GroupReport,
}

pub fn aggregate(
    enriched: &Path,
    rates_path: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<AggregateSummary> {
    let rates = UnemploymentRates::load(rates_path)?;
    let mut reader = EnrichedFileReader::open(enriched, config)?;
    let mut aggregator = GroupedAggregator::new(config);
    let join = drain(&mut reader, Some(&mut aggregator), None)?;
    let (rows, groups) = aggregate::summarize(aggregator.finish(), &rates);
    groups.log();
    output::write_aggregated(output, &rows)?;
    Ok(AggregateSummary { join, groups })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeSummary {
    pub read: AggregatedReadStats,
    pub rows_written: usize,
}

pub fn normalize(input: &Path, output: &Path, config: &PipelineConfig) -> Result<NormalizeSummary> {
    config.weights.validate()?;
    let (rows, read) = output::read_aggregated(input, config)?;
    let normalized = normalize::normalize_rows(rows, &config.weights);
    output::write_normalized(output, &normalized)?;
    Ok(NormalizeSummary {
        read,
        rows_written: normalized.len(),
    })
}

/// Inputs and outputs of a full run.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub input: PathBuf,
    pub delimiter: u8,
    pub lookup: PathBuf,
    pub rates: PathBuf,
    pub output: PathBuf,
    pub enriched_output: Option<PathBuf>,
    pub aggregated_output: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub join: JoinStats,
    pub groups: GroupReport,
    pub normalized_rows: usize,
}

impl RunSummary {
    /// `(metric, value)` pairs for the end-of-run report.
    pub fn metrics(&self) -> Vec<(&'static str, String)> {
        let missing_years = if self.groups.missing_rate_years.is_empty() {
            "-".to_string()
        } else {
            self.groups
                .missing_rate_years
                .iter()
                .map(|year| year.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        vec![
            ("rows read", self.join.rows_read.to_string()),
            ("rows matched", self.join.matched.to_string()),
            ("rows kept as unknown", self.join.unmatched_kept.to_string()),
            ("rows dropped (no sector)", self.join.unmatched_dropped.to_string()),
            ("rows skipped (unparseable)", self.join.unparseable_skipped.to_string()),
            ("groups", self.groups.groups.to_string()),
            ("groups without rate", self.groups.missing_rate_groups.to_string()),
            ("years without rate", missing_years),
            ("groups with invalid rate", self.groups.invalid_rate_groups.to_string()),
            ("groups without wages", self.groups.groups_without_wages.to_string()),
            ("normalized rows", self.normalized_rows.to_string()),
        ]
    }
}

/// Every output is staged before the raw table is read and only persisted
/// once all of them have been written, so a failed run finalizes nothing.
pub fn run(paths: &RunPaths, config: &PipelineConfig) -> Result<RunSummary> {
    config.weights.validate()?;
    let lookup = SectorLookup::load(&paths.lookup, config)?;
    let rates = UnemploymentRates::load(&paths.rates)?;
    let mut join = StreamingJoin::open(&paths.input, paths.delimiter, &lookup, config)?;

    let mut normalized_sink = output::normalized_writer(&paths.output)?;
    let mut aggregated_sink = paths
        .aggregated_output
        .as_deref()
        .map(output::aggregated_writer)
        .transpose()?;
    let mut enriched_sink = paths
        .enriched_output
        .as_deref()
        .map(enriched_writer)
        .transpose()?;

    let mut aggregator = GroupedAggregator::new(config);
    let join_stats = drain(&mut join, Some(&mut aggregator), enriched_sink.as_mut())?;

    info!("Summarizing {} group(s)", aggregator.len());
    let (rows, groups) = aggregate::summarize(aggregator.finish(), &rates);
    groups.log();
    if let Some(writer) = aggregated_sink.as_mut() {
        output::write_aggregated_rows(writer, &rows)?;
    }
    let aggregated_rows = rows.len();

    let normalized = normalize::normalize_rows(rows, &config.weights);
    output::write_normalized_rows(&mut normalized_sink, &normalized)?;

    if let Some(writer) = enriched_sink {
        let path = writer.finish().context("Finishing enriched output")?;
        info!("Wrote {} enriched row(s) to {path:?}", join_stats.emitted());
    }
    if let Some(writer) = aggregated_sink {
        let path = writer.finish().context("Finishing aggregated output")?;
        info!("Wrote {aggregated_rows} aggregated row(s) to {path:?}");
    }
    let path = normalized_sink
        .finish()
        .context("Finishing normalized output")?;
    info!("Wrote {} normalized row(s) to {path:?}", normalized.len());

    Ok(RunSummary {
        join: join_stats,
        groups,
        normalized_rows: normalized.len(),
    })
}
