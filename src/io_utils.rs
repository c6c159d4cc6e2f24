//! I/O utilities for CSV reading, writing and encoding detection.
//!
//! All file I/O flows through this module:
//!
//! - **Encoding**: every input is sniffed once with a streaming UTF-8
//!   validation pass; a file that is not valid UTF-8 is read as Latin-1
//!   (WHATWG `windows-1252`) from start to end. Encoding is decided per
//!   file, never per row.
//! - **Readers**: [`TableReader`] wraps a `csv::Reader`, decodes headers and
//!   rows with the sniffed encoding and tracks line numbers for error context.
//! - **Writers**: [`AtomicCsvWriter`] writes into a temporary file beside the
//!   destination and renames it into place only on [`AtomicCsvWriter::finish`],
//!   so a failed stage never leaves a truncated output behind.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use csv::{ByteRecord, QuoteStyle};
use encoding_rs::{DecoderResult, Encoding, UTF_8, WINDOWS_1252};
use log::{debug, warn};
use tempfile::NamedTempFile;

use crate::error::PipelineError;

pub const RAW_DELIMITER: u8 = b';';
pub const LOOKUP_DELIMITER: u8 = b',';
pub const OUTPUT_DELIMITER: u8 = b';';

const SNIFF_CHUNK: usize = 64 * 1024;

/// Streams the whole file through a UTF-8 decoder; falls back to Latin-1 on
/// the first malformed sequence.
pub fn sniff_encoding(path: &Path) -> Result<&'static Encoding> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let mut reader = BufReader::new(file);
    let mut decoder = UTF_8.new_decoder_with_bom_removal();
    let mut chunk = vec![0u8; SNIFF_CHUNK];
    let mut scratch = String::with_capacity(SNIFF_CHUNK * 3);

    loop {
        let read = reader
            .read(&mut chunk)
            .with_context(|| format!("Reading input file {path:?}"))?;
        let last = read == 0;
        let mut src = &chunk[..read];
        loop {
            scratch.clear();
            let (result, consumed) =
                decoder.decode_to_string_without_replacement(src, &mut scratch, last);
            match result {
                DecoderResult::InputEmpty => break,
                DecoderResult::OutputFull => {
                    src = &src[consumed..];
                    scratch.reserve(SNIFF_CHUNK * 3);
                }
                DecoderResult::Malformed(_, _) => {
                    warn!("{path:?} is not valid UTF-8; reading it as Latin-1");
                    return Ok(WINDOWS_1252);
                }
            }
        }
        if last {
            debug!("{path:?} decoded as UTF-8");
            return Ok(UTF_8);
        }
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    (!had_errors).then(|| text.into_owned())
}

pub fn decode_record(record: &ByteRecord, encoding: &'static Encoding) -> Option<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Header and row access for one delimited input file.
pub struct TableReader {
    path: PathBuf,
    encoding: &'static Encoding,
    reader: csv::Reader<BufReader<File>>,
    headers: Vec<String>,
    record: ByteRecord,
}

impl TableReader {
    pub fn open(path: &Path, delimiter: u8) -> Result<Self> {
        let encoding = sniff_encoding(path)?;
        let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
        let mut reader = open_csv_reader(BufReader::new(file), delimiter);
        let raw_headers = reader
            .byte_headers()
            .with_context(|| format!("Reading header row of {path:?}"))?
            .clone();
        let mut headers = decode_record(&raw_headers, encoding).ok_or_else(|| {
            PipelineError::EncodingDecodeFailure {
                path: path.to_path_buf(),
            }
        })?;
        if let Some(first) = headers.first_mut()
            && let Some(stripped) = first.strip_prefix('\u{feff}')
        {
            *first = stripped.to_string();
        }
        debug!(
            "Opened {path:?} ({} column(s), encoding {}, delimiter '{}')",
            headers.len(),
            encoding.name(),
            crate::printable_delimiter(delimiter)
        );
        Ok(Self {
            path: path.to_path_buf(),
            encoding,
            reader,
            headers,
            record: ByteRecord::new(),
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Line number of the most recently read row (1-based, header is line 1).
    pub fn line(&self) -> u64 {
        self.record.position().map(|p| p.line()).unwrap_or(0)
    }

    /// Reads and decodes the next row; `None` at end of file.
    pub fn next_row(&mut self) -> Result<Option<Vec<String>>> {
        let more = self
            .reader
            .read_byte_record(&mut self.record)
            .with_context(|| format!("Reading {:?} after line {}", self.path, self.line()))?;
        if !more {
            return Ok(None);
        }
        let decoded = decode_record(&self.record, self.encoding).ok_or_else(|| {
            PipelineError::EncodingDecodeFailure {
                path: self.path.clone(),
            }
        })?;
        Ok(Some(decoded))
    }
}

/// CSV writer that only materialises its destination on success.
pub struct AtomicCsvWriter {
    target: PathBuf,
    writer: csv::Writer<NamedTempFile>,
}

impl AtomicCsvWriter {
    pub fn create(path: &Path, delimiter: u8) -> Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Creating temporary output in {dir:?}"))?;
        let mut builder = csv::WriterBuilder::new();
        builder
            .delimiter(delimiter)
            .quote_style(QuoteStyle::Necessary)
            .double_quote(true);
        Ok(Self {
            target: path.to_path_buf(),
            writer: builder.from_writer(temp),
        })
    }

    pub fn write_record<I, T>(&mut self, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer
            .write_record(record)
            .with_context(|| format!("Writing row to {:?}", self.target))
    }

    /// Flushes and renames the temporary file onto the destination path.
    pub fn finish(self) -> Result<PathBuf> {
        let target = self.target;
        let temp = self
            .writer
            .into_inner()
            .map_err(|err| anyhow::anyhow!("Flushing output {target:?}: {}", err.error()))?;
        temp.persist(&target)
            .map_err(|err| err.error)
            .with_context(|| format!("Persisting output file {target:?}"))?;
        Ok(target)
    }
}
