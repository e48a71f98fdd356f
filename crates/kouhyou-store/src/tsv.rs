//! Tab-separated tables through arrow's CSV reader and writer.
//!
//! Tables are read as all-`Utf8` so columns are matched by header name and
//! every cell arrives as text. Writes land in a temporary file next to the
//! destination and are persisted over it in one rename.

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray, StringArray};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use kouhyou_core::record::{Column, TableRow};
use kouhyou_core::schema::tables;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::StoreError;

const DELIMITER: u8 = b'\t';
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A table loaded column-wise as text; null cells become `""`.
#[derive(Debug)]
pub struct TextTable {
    path: PathBuf,
    names: Vec<String>,
    columns: Vec<Vec<String>>,
    num_rows: usize,
}

impl TextTable {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    pub fn require(&self, name: &str) -> Result<&[String], StoreError> {
        self.column(name).ok_or_else(|| StoreError::MissingColumn {
            path: self.path.clone(),
            column: name.to_string(),
        })
    }

    /// Materialise rows of `R`. Columns in `optional` may be absent and
    /// default to `""`; every other column of `R` must be present.
    pub fn rows<R: TableRow + Default>(&self, optional: &[Column]) -> Result<Vec<R>, StoreError> {
        let mut rows: Vec<R> = (0..self.num_rows).map(|_| R::default()).collect();
        for &column in R::COLUMNS {
            let values = match self.column(column.name()) {
                Some(values) => values,
                None if optional.contains(&column) => continue,
                None => {
                    return Err(StoreError::MissingColumn {
                        path: self.path.clone(),
                        column: column.name().to_string(),
                    });
                }
            };
            for (row, value) in rows.iter_mut().zip(values) {
                row.set(column, value.clone());
            }
        }
        Ok(rows)
    }
}

/// Read a TSV file with a header row. A zero-length file is an empty table
/// with no columns.
pub fn read_table(path: &Path) -> Result<TextTable, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    let raw = std::fs::read(path).map_err(StoreError::io(path))?;
    let bytes = raw.strip_prefix(UTF8_BOM).unwrap_or(&raw);

    let mut table = TextTable {
        path: path.to_path_buf(),
        names: Vec::new(),
        columns: Vec::new(),
        num_rows: 0,
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(table);
    }

    let format = Format::default()
        .with_header(true)
        .with_delimiter(DELIMITER);
    let (inferred, _) = format.infer_schema(Cursor::new(bytes), Some(0))?;
    table.names = inferred.fields().iter().map(|f| f.name().clone()).collect();
    table.columns = vec![Vec::new(); table.names.len()];

    let schema = Arc::new(tables::text_schema(&table.names));
    let reader = ReaderBuilder::new(schema)
        .with_header(true)
        .with_delimiter(DELIMITER)
        .with_truncated_rows(true)
        .build(Cursor::new(bytes))?;

    for batch in reader {
        let batch = batch?;
        for (i, values) in table.columns.iter_mut().enumerate() {
            let array = batch.column(i).as_string_opt::<i32>().ok_or_else(|| {
                StoreError::Malformed {
                    path: path.to_path_buf(),
                    row: table.num_rows,
                    detail: format!("column `{}` is not text", table.names[i]),
                }
            })?;
            values.extend(array.iter().map(|v| v.unwrap_or_default().to_string()));
        }
        table.num_rows += batch.num_rows();
    }

    debug!(path = %path.display(), rows = table.num_rows, columns = table.names.len(), "read table");
    Ok(table)
}

/// Build a record batch of `R` rows under `schema`, whose fields must be
/// `R::COLUMNS` in order.
pub fn text_batch<R: TableRow>(schema: Schema, rows: &[R]) -> Result<RecordBatch, StoreError> {
    let columns: Vec<ArrayRef> = R::COLUMNS
        .iter()
        .map(|&column| {
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.get(column)),
            )) as ArrayRef
        })
        .collect();
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

/// Atomically replace `path` with `batch` written as TSV.
pub fn write_table(path: &Path, batch: &RecordBatch) -> Result<(), StoreError> {
    persist_with(path, |file| {
        let mut writer = WriterBuilder::new()
            .with_header(true)
            .with_delimiter(DELIMITER)
            .build(file);
        writer.write(batch)?;
        Ok(())
    })?;
    debug!(path = %path.display(), rows = batch.num_rows(), "wrote table");
    Ok(())
}

/// Replace `path` with `contents` atomically, creating parent directories.
pub fn write_text(path: &Path, contents: &str) -> Result<(), StoreError> {
    persist_with(path, |file| {
        file.write_all(contents.as_bytes()).map_err(StoreError::io(path))
    })?;
    debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}

fn persist_with<F>(path: &Path, write: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut File) -> Result<(), StoreError>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(StoreError::io(dir))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(StoreError::io(dir))?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all().map_err(StoreError::io(tmp.path()))?;

    tmp.persist(path).map_err(|e| StoreError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
