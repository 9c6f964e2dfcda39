//! CSV input: header validation and row decoding.

use super::error::LoadError;
use super::schema::EntitySchema;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// One data row of the input file, as column name / raw value pairs in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    line: u64,
    fields: Vec<(String, String)>,
}

impl CsvRow {
    pub fn new(line: u64, fields: Vec<(String, String)>) -> Self {
        Self { line, fields }
    }

    /// One-based line number in the source file.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Raw value of `column` exactly as written, or `None` when the column is absent.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Like [`CsvRow::get`], but blank values read as absent.
    pub fn non_blank(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|value| !value.trim().is_empty())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

impl fmt::Display for CsvRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, (name, value)) in self.fields.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{name}': '{value}'")?;
        }
        f.write_str("}")
    }
}

/// Open `path` and decode every row, validating the header against `schema`.
///
/// All rows are decoded before any is returned, so a malformed file fails
/// without a single row reaching the resolver.
pub fn read_rows(path: &Path, schema: &EntitySchema) -> Result<Vec<CsvRow>, LoadError> {
    let file = File::open(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => LoadError::FileNotFound(path.to_path_buf()),
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source: err,
        },
    })?;

    parse_rows(file, path, schema)
}

/// Decode rows from any reader; `path` is only used for error messages.
pub fn parse_rows<R: Read>(
    reader: R,
    path: &Path,
    schema: &EntitySchema,
) -> Result<Vec<CsvRow>, LoadError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| decode_error(path, err))?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').to_string())
        .collect();

    validate_header(&headers, path, schema)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record: StringRecord = result.map_err(|err| decode_error(path, err))?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        let fields = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(CsvRow::new(line, fields));
    }

    log::debug!("decoded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

fn validate_header(headers: &[String], path: &Path, schema: &EntitySchema) -> Result<(), LoadError> {
    let invalid = |message: String| LoadError::InvalidHeader {
        path: path.to_path_buf(),
        message,
    };

    if headers.iter().all(|header| header.is_empty()) {
        return Err(invalid("header row is empty".to_string()));
    }

    for (index, header) in headers.iter().enumerate() {
        if headers[..index].contains(header) {
            return Err(invalid(format!("duplicate column '{header}'")));
        }
    }

    let unknown: Vec<&str> = headers
        .iter()
        .map(String::as_str)
        .filter(|header| !schema.accepts(header))
        .collect();
    if !unknown.is_empty() {
        return Err(invalid(format!(
            "unknown column(s) for {}: {}",
            schema.kind,
            unknown.join(", ")
        )));
    }

    let missing: Vec<&str> = schema
        .required_columns()
        .filter(|column| !headers.iter().any(|header| header.as_str() == *column))
        .collect();
    if !missing.is_empty() {
        return Err(invalid(format!(
            "missing column(s) for {}: {}",
            schema.kind,
            missing.join(", ")
        )));
    }

    Ok(())
}

fn decode_error(path: &Path, err: csv::Error) -> LoadError {
    let line = err.position().map(|pos| pos.line()).unwrap_or_default();
    let message = match err.kind() {
        csv::ErrorKind::Utf8 { err, .. } => format!("invalid UTF-8: {err}"),
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("expected {expected_len} fields, found {len}"),
        _ => err.to_string(),
    };

    LoadError::Decode {
        path: path.to_path_buf(),
        line,
        message,
    }
}
