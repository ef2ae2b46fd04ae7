//! Annotation and region tables.
//!
//! A [`Table`] is a small in-memory, string-typed column store read from
//! tab- or comma-separated text. Cells are kept as text and parsed on
//! access; numeric accessors report the offending cell when a value does
//! not parse.

use std::borrow::Cow;
use std::path::Path;

use crate::error::{IoError, TableError};

/// Column holding the region key of every row.
pub const REGION_ID: &str = "region_id";

/// Column holding the source path in default region tables.
pub const SOURCE_PATH: &str = "source_path";

/// Grid row of a tile.
pub const ROW_INDEX: &str = "row_index";

/// Grid column of a tile.
pub const COLUMN_INDEX: &str = "column_index";

/// Delimiter used for a table file, chosen by extension.
pub fn delimiter_for(path: &Path) -> char {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => ',',
        _ => '\t',
    }
}

// =============================================================================
// Table
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// An empty table with the given header.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from named columns of equal length.
    pub fn from_columns(
        name: impl Into<String>,
        columns: Vec<(String, Vec<String>)>,
    ) -> Result<Self, TableError> {
        let mut table = Self::new(name, Vec::new());
        let num_rows = columns.first().map(|(_, values)| values.len()).unwrap_or(0);
        table.rows = vec![Vec::with_capacity(columns.len()); num_rows];
        for (column, values) in columns {
            table.add_column(column, values)?;
        }
        Ok(table)
    }

    /// Parse delimited text. The first non-empty record is the header.
    ///
    /// Fields may be double-quoted; a quoted field keeps delimiters and line
    /// breaks, and `""` inside it is one quote.
    pub fn parse(name: impl Into<String>, text: &str, delimiter: char) -> Result<Self, TableError> {
        let name = name.into();
        let mut records = split_records(text, delimiter).into_iter();

        let columns = records.next().ok_or_else(|| TableError::Empty(name.clone()))?;

        let mut rows = Vec::new();
        for mut row in records {
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(Self {
            name,
            columns,
            rows,
        })
    }

    /// Read a `.tsv`, `.txt` or `.csv` file. The table is named after the
    /// file stem.
    pub async fn read(path: &Path) -> Result<Self, TableError> {
        let display = path.display().to_string();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| IoError::from_std(&display, e))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(display);
        Self::parse(name, &text, delimiter_for(path))
    }

    /// Write the table as delimited text, creating parent directories.
    pub async fn write(&self, path: &Path) -> Result<(), TableError> {
        let display = path.display().to_string();
        let to_write_error = |e: std::io::Error| IoError::Write {
            path: display.clone(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(to_write_error)?;
        }
        tokio::fs::write(path, self.to_delimited(delimiter_for(path)))
            .await
            .map_err(to_write_error)?;
        Ok(())
    }

    /// Delimited text, quoting fields that would not read back as written.
    pub fn to_delimited(&self, delimiter: char) -> String {
        let sep = delimiter.to_string();
        let line = |fields: &[String]| {
            fields
                .iter()
                .map(|f| quote_field(f, delimiter))
                .collect::<Vec<_>>()
                .join(&sep)
        };
        let mut out = line(&self.columns);
        out.push('\n');
        for row in &self.rows {
            out.push_str(&line(row));
            out.push('\n');
        }
        out
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    fn column_index(&self, column: &str) -> Result<usize, TableError> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| TableError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// A table of the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Table, TableError> {
        let selected = rows
            .iter()
            .map(|&row| {
                self.rows
                    .get(row)
                    .cloned()
                    .ok_or_else(|| TableError::RowOutOfRange {
                        table: self.name.clone(),
                        row,
                        rows: self.rows.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: selected,
        })
    }

    /// Append a column; its length must equal the row count.
    pub fn add_column(
        &mut self,
        column: impl Into<String>,
        values: Vec<String>,
    ) -> Result<(), TableError> {
        let column = column.into();
        if values.len() != self.rows.len() {
            return Err(TableError::LengthMismatch {
                column,
                expected: self.rows.len(),
                actual: values.len(),
            });
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        self.columns.push(column);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Cell access
    // -------------------------------------------------------------------------

    pub fn get_string(&self, row: usize, column: &str) -> Result<&str, TableError> {
        let index = self.column_index(column)?;
        self.rows
            .get(row)
            .map(|r| r[index].as_str())
            .ok_or_else(|| TableError::RowOutOfRange {
                table: self.name.clone(),
                row,
                rows: self.rows.len(),
            })
    }

    pub fn get_f64(&self, row: usize, column: &str) -> Result<f64, TableError> {
        let value = self.get_string(row, column)?;
        value.trim().parse().map_err(|_| TableError::NotNumeric {
            column: column.to_string(),
            row,
            value: value.to_string(),
        })
    }

    /// Integer cell; integral floats such as `"3.0"` are accepted.
    pub fn get_i64(&self, row: usize, column: &str) -> Result<i64, TableError> {
        let value = self.get_f64(row, column)?;
        if value.fract() != 0.0 {
            return Err(TableError::NotNumeric {
                column: column.to_string(),
                row,
                value: value.to_string(),
            });
        }
        Ok(value as i64)
    }

    pub fn string_column(&self, column: &str) -> Result<Vec<&str>, TableError> {
        let index = self.column_index(column)?;
        Ok(self.rows.iter().map(|r| r[index].as_str()).collect())
    }

    pub fn numeric_column(&self, column: &str) -> Result<Vec<f64>, TableError> {
        self.column_index(column)?;
        (0..self.rows.len())
            .map(|row| self.get_f64(row, column))
            .collect()
    }

    /// Minimum and maximum of a numeric column.
    pub fn min_max(&self, column: &str) -> Result<(f64, f64), TableError> {
        let values = self.numeric_column(column)?;
        if values.is_empty() {
            return Err(TableError::Empty(self.name.clone()));
        }
        Ok(values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            }))
    }

    /// Indices of rows whose numeric `column` equals `value`.
    pub fn rows_where_equal(&self, column: &str, value: f64) -> Result<Vec<usize>, TableError> {
        let values = self.numeric_column(column)?;
        Ok(values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == value)
            .map(|(i, _)| i)
            .collect())
    }
}

/// Split text into records of fields.
///
/// Unquoted fields are trimmed. Blank records are skipped.
fn split_records(text: &str, delimiter: char) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;

    let finish_field = |record: &mut Vec<String>, field: &mut String, quoted: &mut bool| {
        let value = if *quoted {
            std::mem::take(field)
        } else {
            let value = field.trim().to_string();
            field.clear();
            value
        };
        record.push(value);
        *quoted = false;
    };
    let finish_record = |records: &mut Vec<Vec<String>>, record: &mut Vec<String>| {
        let record = std::mem::take(record);
        if record.iter().any(|f| !f.is_empty()) {
            records.push(record);
        }
    };

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' if !quoted && field.trim().is_empty() => {
                field.clear();
                quoted = true;
                in_quotes = true;
            }
            c if c == delimiter => finish_field(&mut record, &mut field, &mut quoted),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                finish_field(&mut record, &mut field, &mut quoted);
                finish_record(&mut records, &mut record);
            }
            c => field.push(c),
        }
    }

    if quoted || !field.is_empty() || !record.is_empty() {
        finish_field(&mut record, &mut field, &mut quoted);
        finish_record(&mut records, &mut record);
    }
    records
}

/// Quote a field containing the delimiter, a quote or a line break.
fn quote_field(field: &str, delimiter: char) -> Cow<'_, str> {
    if field.contains([delimiter, '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

// =============================================================================
// Tests
// =============================================================================
