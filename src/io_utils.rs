//! CSV I/O. Inputs are comma-delimited text read through a BOM-sniffing
//! UTF-8 decoder; outputs quote fields only when needed and double any
//! embedded quotes. The `-` path convention routes output to stdout.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use csv::QuoteStyle;
use encoding_rs::UTF_8;
use encoding_rs_io::DecodeReaderBytesBuilder;

use crate::table::Table;

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

/// Human-readable destination label for log and error messages.
pub fn describe_output(path: Option<&Path>) -> String {
    match path {
        Some(path) if !is_dash(path) => path.display().to_string(),
        _ => "stdout".to_string(),
    }
}

/// Reads a comma-delimited file into a [`Table`] named after the file.
/// Header cells are trimmed; blank lines are skipped by the reader.
pub fn read_table(path: &Path) -> Result<Table> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open input '{}'", path.display()))?;
    let decoder = DecodeReaderBytesBuilder::new()
        .encoding(Some(UTF_8))
        .bom_sniffing(true)
        .build(BufReader::new(file));
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .double_quote(true)
        .flexible(false)
        .from_reader(decoder);

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header row from '{}'", path.display()))?
        .iter()
        .map(|header| header.trim().to_string())
        .collect::<Vec<_>>();

    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("input")
        .to_string();
    let mut table = Table::new(name, headers);
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| {
            format!("Failed to read line {} of '{}'", index + 2, path.display())
        })?;
        table.push_row(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(table)
}

pub fn create_csv_writer(path: Option<&Path>) -> Result<csv::Writer<Box<dyn Write>>> {
    let sink: Box<dyn Write> = match path {
        Some(path) if !is_dash(path) => Box::new(BufWriter::new(File::create(path).with_context(
            || format!("Failed to create output '{}'", path.display()),
        )?)),
        _ => Box::new(std::io::stdout()),
    };
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(b',')
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    Ok(builder.from_writer(sink))
}

/// Writes the table to `path`, or stdout when `None` or `-`.
pub fn write_table(path: Option<&Path>, table: &Table) -> Result<()> {
    let destination = describe_output(path);
    let mut writer = create_csv_writer(path)?;
    writer
        .write_record(table.columns())
        .with_context(|| format!("Failed to write header row to {destination}"))?;
    for row in table.rows() {
        writer
            .write_record(row)
            .with_context(|| format!("Failed to write row to {destination}"))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush output to {destination}"))?;
    Ok(())
}
