//! Storage layer for sepsis preprocessing.
//!
//! Reads and writes the delimiter-separated extracts the pipeline consumes
//! and produces, using `csv`.
//!
//! # Format
//!
//! Every file has a header row. The default delimiter is `|`, matching the
//! extraction scripts. Cells are trimmed on read and an empty cell means a
//! missing value.
//!
//! ## Timestamps
//!
//! Times are Unix epoch seconds, integer or fractional (`1700000000`,
//! `1700000000.5`). They are held as `chrono::DateTime<Utc>` with millisecond
//! precision and written back in the shortest form that round-trips.
//!
//! ## Identifiers
//!
//! Identifier columns exported from a float-typed frame look like
//! `30000153.0`; the `.0` suffix is dropped so that `30000153` and
//! `30000153.0` are the same stay.
//!
//! Columns the pipeline does not interpret are carried through unchanged.

mod prepare;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use prepare::{DemographicsSummary, consolidate_labs, merge_cultures, process_demographics};

/// Table errors.
#[derive(Debug, Error)]
pub enum TableError {
    /// Reading or writing the file failed.
    #[error("failed to access {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    /// Flushing written output failed.
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A column the pipeline needs is not in the header.
    #[error("table {table} has no column {column}")]
    MissingColumn { table: String, column: String },
    /// A required cell is empty.
    #[error("table {table}, row {row}: missing value for {column}")]
    MissingValue {
        table: String,
        row: usize,
        column: String,
    },
    /// A time cell is not a number of epoch seconds.
    #[error("table {table}, row {row}: invalid timestamp in {column}: {value}")]
    InvalidTimestamp {
        table: String,
        row: usize,
        column: String,
        value: String,
    },
    /// An identifier cell failed validation.
    #[error("table {table}, row {row}: invalid identifier in {column}: {source}")]
    InvalidId {
        table: String,
        row: usize,
        column: String,
        #[source]
        source: sepsis_core::ValidationError,
    },
}

/// An in-memory delimited table.
///
/// Row numbers in errors are zero-based and exclude the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates a table, padding or truncating rows to the header width.
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Reads a table with a header row from `path`.
    ///
    /// The table is named after the file stem.
    pub fn read(path: &Path, delimiter: u8) -> Result<Self, TableError> {
        let csv_err = |source| TableError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(csv_err)?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(String::from)
            .collect();

        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(String::from).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()
            .map_err(csv_err)?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("table")
            .to_string();

        tracing::debug!(table = %name, rows = rows.len(), columns = headers.len(), "read table");
        Ok(Self::new(name, headers, rows))
    }

    /// Writes the table with a header row to `path`, replacing any existing file.
    pub fn write(&self, path: &Path, delimiter: u8) -> Result<(), TableError> {
        let csv_err = |source| TableError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(path)
            .map_err(csv_err)?;
        writer.write_record(&self.headers).map_err(csv_err)?;
        for row in &self.rows {
            writer.write_record(row).map_err(csv_err)?;
        }
        writer.flush().map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(table = %self.name, rows = self.rows.len(), path = %path.display(), "wrote table");
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `column` in the header, if present.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// Position of `column` in the header, or [`TableError::MissingColumn`].
    pub fn require_column(&self, column: &str) -> Result<usize, TableError> {
        self.column_index(column)
            .ok_or_else(|| TableError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// The cell at `row`/`col`, or `None` when it is empty.
    pub fn value(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// The cell at `row`/`col`, or [`TableError::MissingValue`] when empty.
    pub fn required_value(&self, row: usize, col: usize) -> Result<&str, TableError> {
        self.value(row, col).ok_or_else(|| TableError::MissingValue {
            table: self.name.clone(),
            row,
            column: self.headers[col].clone(),
        })
    }

    /// Replaces the contents of `column`, appending it when absent.
    ///
    /// `values` must have one entry per row.
    pub fn set_column(&mut self, column: &str, values: Vec<String>) {
        debug_assert_eq!(values.len(), self.rows.len(), "one value per row");
        let col = self.column_index(column).unwrap_or_else(|| {
            self.headers.push(column.to_string());
            for row in &mut self.rows {
                row.push(String::new());
            }
            self.headers.len() - 1
        });
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[col] = value;
        }
    }

    /// Removes `column` if present.
    pub fn drop_column(&mut self, column: &str) {
        if let Some(col) = self.column_index(column) {
            self.headers.remove(col);
            for row in &mut self.rows {
                row.remove(col);
            }
        }
    }

    /// Renames column `from` to `to` if present.
    pub fn rename_column(&mut self, from: &str, to: &str) {
        if let Some(col) = self.column_index(from) {
            self.headers[col] = to.to_string();
        }
    }

    /// Fills empty cells of `column` with `value`. Missing columns are ignored.
    pub fn fill_missing(&mut self, column: &str, value: &str) {
        if let Some(col) = self.column_index(column) {
            for row in &mut self.rows {
                if row[col].is_empty() {
                    row[col] = value.to_string();
                }
            }
        }
    }

    /// Returns a table holding the rows at `indices`, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            name: self.name.clone(),
            headers: self.headers.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Stacks `tables` vertically.
    ///
    /// The header is the union of all headers in order of first appearance;
    /// cells for columns a table lacks are empty.
    pub fn concat(name: impl Into<String>, tables: &[Self]) -> Self {
        let mut headers: Vec<String> = Vec::new();
        for table in tables {
            for header in &table.headers {
                if !headers.contains(header) {
                    headers.push(header.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(tables.iter().map(Self::len).sum());
        for table in tables {
            let mapping: Vec<Option<usize>> =
                headers.iter().map(|h| table.column_index(h)).collect();
            for row in &table.rows {
                rows.push(
                    mapping
                        .iter()
                        .map(|col| col.map(|c| row[c].clone()).unwrap_or_default())
                        .collect(),
                );
            }
        }

        Self::new(name, headers, rows)
    }
}

/// Parses epoch seconds into a UTC timestamp with millisecond precision.
pub fn parse_epoch_seconds(value: &str) -> Option<DateTime<Utc>> {
    let seconds: f64 = value.trim().parse().ok()?;
    if !seconds.is_finite() {
        return None;
    }
    #[expect(
        clippy::cast_possible_truncation,
        reason = "out-of-range values saturate and are rejected by from_timestamp_millis"
    )]
    let millis = (seconds * 1000.0).round() as i64;
    DateTime::from_timestamp_millis(millis)
}

/// Formats a timestamp as epoch seconds, without a fraction when whole.
pub fn format_epoch_seconds(time: DateTime<Utc>) -> String {
    let millis = time.timestamp_millis();
    if millis % 1000 == 0 {
        (millis / 1000).to_string()
    } else {
        #[expect(
            clippy::cast_precision_loss,
            reason = "epoch milliseconds fit in f64's exact integer range"
        )]
        let seconds = millis as f64 / 1000.0;
        seconds.to_string()
    }
}

/// Canonical form of an identifier cell: trimmed, with a float `.0` suffix
/// removed from numeric identifiers.
pub fn normalize_id(value: &str) -> &str {
    let value = value.trim();
    match value.strip_suffix(".0") {
        Some(integer) if !integer.is_empty() && integer.bytes().all(|b| b.is_ascii_digit()) => {
            integer
        }
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    fn sample() -> Table {
        Table::new(
            "sample",
            strings(&["a", "b"]),
            vec![strings(&["1", ""]), strings(&["2", "x"])],
        )
    }

    #[test]
    fn test_read_write_roundtrip() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("sample.csv");
        std::fs::write(&path, "a|b|c\n1| 2 |\n3|4|5\n").unwrap();

        let table = Table::read(&path, b'|').unwrap();
        assert_eq!(table.name(), "sample");
        assert_eq!(table.headers(), strings(&["a", "b", "c"]).as_slice());
        assert_eq!(table.value(0, 1), Some("2"));
        assert_eq!(table.value(0, 2), None);

        let out = temp.path().join("out.csv");
        table.write(&out, b'|').unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "a|b|c\n1|2|\n3|4|5\n");
    }

    #[test]
    fn test_read_missing_file_fails() {
        let temp = tempfile::tempdir().unwrap();
        let err = Table::read(&temp.path().join("absent.csv"), b'|').unwrap_err();
        assert!(matches!(err, TableError::Csv { .. }));
    }

    #[test]
    fn test_require_column_reports_table() {
        let err = sample().require_column("z").unwrap_err();
        assert_eq!(err.to_string(), "table sample has no column z");
    }

    #[test]
    fn test_required_value_reports_row_and_column() {
        let table = sample();
        let err = table.required_value(0, 1).unwrap_err();
        assert_eq!(err.to_string(), "table sample, row 0: missing value for b");
        assert_eq!(table.required_value(1, 1).unwrap(), "x");
    }

    #[test]
    fn test_set_and_drop_column() {
        let mut table = sample();
        table.set_column("c", strings(&["p", "q"]));
        table.set_column("a", strings(&["9", "8"]));
        assert_eq!(table.headers(), strings(&["a", "b", "c"]).as_slice());
        assert_eq!(table.rows()[1], strings(&["8", "x", "q"]));

        table.drop_column("b");
        assert_eq!(table.rows()[0], strings(&["9", "p"]));
        table.drop_column("absent");
        assert_eq!(table.headers().len(), 2);
    }

    #[test]
    fn test_rename_column() {
        let mut table = sample();
        table.rename_column("b", "timestp");
        table.rename_column("absent", "c");
        assert_eq!(table.headers(), strings(&["a", "timestp"]).as_slice());
        assert_eq!(table.value(1, 1), Some("x"));
    }

    #[test]
    fn test_fill_missing() {
        let mut table = sample();
        table.fill_missing("b", "0");
        table.fill_missing("absent", "0");
        assert_eq!(table.value(0, 1), Some("0"));
        assert_eq!(table.value(1, 1), Some("x"));
    }

    #[test]
    fn test_concat_unions_headers() {
        let first = sample();
        let second = Table::new("other", strings(&["b", "c"]), vec![strings(&["y", "z"])]);

        let merged = Table::concat("merged", &[first, second]);

        assert_eq!(merged.headers(), strings(&["a", "b", "c"]).as_slice());
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.rows()[0], strings(&["1", "", ""]));
        assert_eq!(merged.rows()[2], strings(&["", "y", "z"]));
    }

    #[test]
    fn test_select_rows() {
        let table = sample().select_rows(&[1, 0, 1]);
        let firsts: Vec<_> = table.rows().iter().map(|r| r[0].as_str()).collect();
        assert_eq!(firsts, vec!["2", "1", "2"]);
    }

    #[test]
    fn test_parse_epoch_seconds() {
        let expected = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(parse_epoch_seconds("1700000000"), Some(expected));
        assert_eq!(parse_epoch_seconds("1700000000.0"), Some(expected));
        assert_eq!(
            parse_epoch_seconds("1700000000.25"),
            Some(expected + chrono::Duration::milliseconds(250))
        );
        assert_eq!(parse_epoch_seconds("noon"), None);
        assert_eq!(parse_epoch_seconds("NaN"), None);
    }

    #[test]
    fn test_format_epoch_seconds() {
        let whole = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(format_epoch_seconds(whole), "1700000000");
        let fractional = whole + chrono::Duration::milliseconds(500);
        assert_eq!(format_epoch_seconds(fractional), "1700000000.5");
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("30000153.0"), "30000153");
        assert_eq!(normalize_id(" 42 "), "42");
        assert_eq!(normalize_id("ab.0"), "ab.0");
        assert_eq!(normalize_id(".0"), ".0");
    }
}
