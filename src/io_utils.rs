//! I/O utilities for CSV reading, writing, and sheet-directory handling.
//!
//! Every dataset version (raw / manual / auto) lives in its own directory
//! with one CSV per sheet named `all_paper_data_<Sheet>.csv`. All file I/O
//! flows through this module:
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` ->
//!   comma, `.tsv` -> tab) with manual override support.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Quoting**: CSV output uses `QuoteStyle::Always` for round-trip safety.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::data::{Dataset, parse_cell};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

/// Common stem prefix of every per-sheet CSV export.
pub const SHEET_FILE_PREFIX: &str = "all_paper_data_";

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
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
        .flexible(false);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<BufReader<File>>> {
    let reader =
        BufReader::new(File::open(path).with_context(|| format!("Opening input file {path:?}"))?);
    Ok(open_csv_reader(reader, delimiter))
}

pub fn open_csv_writer(path: &Path, delimiter: u8) -> Result<csv::Writer<BufWriter<File>>> {
    let file = File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    Ok(builder.from_writer(BufWriter::new(file)))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    decode_record(&headers, encoding)
}

/// Derives the sheet name from a per-sheet CSV path.
pub fn sheet_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let name = stem.strip_prefix(SHEET_FILE_PREFIX).unwrap_or(stem);
    Some(name.to_string())
}

/// Loads every sheet CSV under `dir` into a typed `Dataset`, keyed and
/// ordered by sheet name. Sheets listed in `skip` (e.g. the codebook) are
/// left out.
pub fn load_sheets(
    dir: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
    skip: &[String],
) -> Result<BTreeMap<String, Dataset>> {
    let mut paths: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("Reading sheet directory {dir:?}"))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    paths.sort();

    let mut sheets = BTreeMap::new();
    for path in paths {
        let Some(name) = sheet_name(&path) else {
            continue;
        };
        if skip.contains(&name) {
            debug!("Skipping sheet '{name}'");
            continue;
        }
        let dataset = load_sheet(&path, &name, delimiter, encoding)
            .with_context(|| format!("Loading sheet '{name}' from {path:?}"))?;
        sheets.insert(name, dataset);
    }
    if sheets.is_empty() {
        return Err(anyhow!("No sheet CSVs found under {dir:?}"));
    }
    Ok(sheets)
}

pub fn load_sheet(
    path: &Path,
    name: &str,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<Dataset> {
    let delimiter = resolve_input_delimiter(path, delimiter);
    let mut reader = open_csv_reader_from_path(path, delimiter)?;
    let columns = reader_headers(&mut reader, encoding)?;

    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
        let decoded = decode_record(&record, encoding)?;
        if decoded.len() != columns.len() {
            return Err(anyhow!(
                "Row {} has {} field(s), expected {}",
                idx + 2,
                decoded.len(),
                columns.len()
            ));
        }
        let row = decoded
            .iter()
            .enumerate()
            .map(|(col, raw)| parse_cell(raw, col == 0))
            .collect();
        rows.push(row);
    }
    Ok(Dataset::new(name, columns, rows))
}

/// Writes each sheet back out as `all_paper_data_<Sheet>.csv` under `dir`.
pub fn write_sheets(dir: &Path, sheets: &BTreeMap<String, Dataset>) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Creating output directory {dir:?}"))?;
    for (name, dataset) in sheets {
        let file_name = format!("{SHEET_FILE_PREFIX}{}.csv", name.trim().replace(' ', "_"));
        let path = dir.join(file_name);
        write_sheet(&path, dataset).with_context(|| format!("Writing sheet '{name}'"))?;
    }
    Ok(())
}

pub fn write_sheet(path: &Path, dataset: &Dataset) -> Result<()> {
    let mut writer = open_csv_writer(path, DEFAULT_CSV_DELIMITER)?;
    writer
        .write_record(dataset.columns.iter())
        .context("Writing output headers")?;
    for (idx, row) in dataset.rows.iter().enumerate() {
        let record: Vec<String> = row
            .iter()
            .map(|cell| cell.as_ref().map(|v| v.as_display()).unwrap_or_default())
            .collect();
        writer
            .write_record(record.iter())
            .with_context(|| format!("Writing output row {}", idx + 2))?;
    }
    writer.flush().context("Flushing output writer")?;
    Ok(())
}
