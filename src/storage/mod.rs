//! Parquet persistence for measurement tables
//!
//! One table per file. The file's key-value metadata carries a JSON
//! manifest under the fixed key `"data"`: format version, index mode and
//! the ordered column list with dtypes. The manifest is authoritative on
//! read, so physical-layer details (the placeholder schema written for an
//! empty table, Parquet's own type widening) never leak back into the
//! table.
//!
//! On-disk layout is positional: in frame-indexed mode the frame key is
//! the first column (Int64), data columns follow in table order. Reading
//! by position rather than name keeps a data column that happens to be
//! called `frame` unambiguous.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};

use crate::table::{Column, ColumnType, IndexMode, MeasurementTable, FRAME_COLUMN};
use crate::{Error, Result};

/// Fixed metadata key labelling the persisted dataset.
pub const MANIFEST_KEY: &str = "data";

/// On-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// JSON manifest embedded in the Parquet key-value metadata.
#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    index_mode: IndexMode,
    columns: Vec<ManifestColumn>,
    saved_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestColumn {
    name: String,
    dtype: ColumnType,
}

/// Serialize a table to a Parquet file at `path`.
///
/// # Errors
///
/// Returns [`Error::Storage`] when the file cannot be created or the
/// Parquet layer rejects the write.
pub fn write_table<P: AsRef<Path>>(path: P, table: &MeasurementTable) -> Result<()> {
    let manifest = Manifest {
        version: FORMAT_VERSION,
        index_mode: table.mode(),
        columns: table
            .iter_columns()
            .map(|(name, column)| ManifestColumn {
                name: name.to_string(),
                dtype: column.dtype(),
            })
            .collect(),
        saved_at: Utc::now(),
    };
    let manifest_json = serde_json::to_string(&manifest)
        .map_err(|e| Error::Storage(format!("Failed to encode manifest: {e}")))?;

    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();
    if table.mode() == IndexMode::Indexed {
        let keys = table
            .frames()
            .iter()
            .map(|&f| {
                i64::try_from(f).map_err(|_| {
                    Error::Storage(format!("frame number {f} exceeds the supported range"))
                })
            })
            .collect::<Result<Vec<i64>>>()?;
        fields.push(Field::new(FRAME_COLUMN, DataType::Int64, false));
        arrays.push(Arc::new(Int64Array::from(keys)) as ArrayRef);
    }
    for (name, column) in table.iter_columns() {
        fields.push(Field::new(name, arrow_type(column.dtype()), false));
        arrays.push(column_array(column));
    }
    if fields.is_empty() {
        // Parquet cannot represent a zero-column schema; the manifest
        // stays authoritative, so the placeholder never reads back as data.
        fields.push(Field::new(FRAME_COLUMN, DataType::Int64, false));
        arrays.push(Arc::new(Int64Array::from(Vec::<i64>::new())) as ArrayRef);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(Arc::clone(&schema), arrays)?;

    // Write to a sibling temp file and rename over the target, so a failed
    // save never truncates the previously persisted table.
    let mut tmp = path.as_ref().as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    let file = File::create(&tmp).map_err(|e| {
        Error::Storage(format!("Failed to create table file {}: {e}", tmp.display()))
    })?;
    let props = WriterProperties::builder()
        .set_key_value_metadata(Some(vec![KeyValue::new(
            MANIFEST_KEY.to_string(),
            Some(manifest_json),
        )]))
        .build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))
        .map_err(|e| Error::Storage(format!("Failed to open Parquet writer: {e}")))?;
    let written = (|| {
        if batch.num_rows() > 0 {
            writer.write(&batch)?;
        }
        writer.close().map(|_| ())
    })();
    if let Err(e) = written {
        std::fs::remove_file(&tmp).ok();
        return Err(Error::Storage(format!("Failed to write Parquet file: {e}")));
    }
    std::fs::rename(&tmp, path.as_ref()).map_err(|e| {
        Error::Storage(format!(
            "Failed to move table file into place at {}: {e}",
            path.as_ref().display()
        ))
    })?;
    Ok(())
}

/// Load a table from a Parquet file at `path`.
///
/// # Errors
///
/// Returns [`Error::Storage`] when the file is missing, unreadable, not
/// carrying a `"data"` manifest, from an unsupported format version, or
/// physically inconsistent with its manifest.
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<MeasurementTable> {
    let file = File::open(path.as_ref()).map_err(|e| {
        Error::Storage(format!(
            "Failed to open table file {}: {e}",
            path.as_ref().display()
        ))
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::Storage(format!("Failed to parse Parquet file: {e}")))?;

    let manifest_json = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .and_then(|entries| entries.iter().find(|kv| kv.key == MANIFEST_KEY))
        .and_then(|kv| kv.value.clone())
        .ok_or_else(|| {
            Error::Storage(format!(
                "No `{MANIFEST_KEY}` manifest in {}; not a measurement table file",
                path.as_ref().display()
            ))
        })?;
    let manifest: Manifest = serde_json::from_str(&manifest_json)
        .map_err(|e| Error::Storage(format!("Failed to decode manifest: {e}")))?;
    if manifest.version != FORMAT_VERSION {
        return Err(Error::Storage(format!(
            "Unsupported table format version {} (supported: {FORMAT_VERSION})",
            manifest.version
        )));
    }

    let reader = builder
        .build()
        .map_err(|e| Error::Storage(format!("Failed to create Parquet reader: {e}")))?;

    let indexed = manifest.index_mode == IndexMode::Indexed;
    let offset = usize::from(indexed);
    let mut frames: Vec<u64> = Vec::new();
    let mut columns: Vec<Column> = manifest
        .columns
        .iter()
        .map(|c| Column::empty(c.dtype))
        .collect();

    for batch in reader {
        let batch =
            batch.map_err(|e| Error::Storage(format!("Failed to read record batch: {e}")))?;
        if batch.num_columns() != offset + columns.len() {
            return Err(Error::Storage(format!(
                "File has {} columns, manifest describes {}",
                batch.num_columns(),
                offset + columns.len()
            )));
        }
        if indexed {
            read_frame_keys(batch.column(0), &mut frames)?;
        }
        for (slot, column) in columns.iter_mut().enumerate() {
            append_cells(column, &manifest.columns[slot].name, batch.column(offset + slot))?;
        }
    }

    let headings = manifest.columns.into_iter().map(|c| c.name).collect();
    MeasurementTable::from_parts(headings, columns, frames, manifest.index_mode)
}

const fn arrow_type(dtype: ColumnType) -> DataType {
    match dtype {
        ColumnType::Int => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::Str => DataType::Utf8,
    }
}

fn column_array(column: &Column) -> ArrayRef {
    match column {
        Column::Int(values) => Arc::new(Int64Array::from(values.clone())),
        Column::Float(values) => Arc::new(Float64Array::from(values.clone())),
        Column::Str(values) => Arc::new(StringArray::from(values.clone())),
    }
}

fn read_frame_keys(array: &ArrayRef, frames: &mut Vec<u64>) -> Result<()> {
    let keys = array
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| type_drift(FRAME_COLUMN, "int"))?;
    for i in 0..keys.len() {
        if keys.is_null(i) {
            return Err(null_cell(FRAME_COLUMN));
        }
        let key = u64::try_from(keys.value(i)).map_err(|_| {
            Error::Storage(format!("negative frame key {}", keys.value(i)))
        })?;
        frames.push(key);
    }
    Ok(())
}

fn append_cells(column: &mut Column, name: &str, array: &ArrayRef) -> Result<()> {
    match column {
        Column::Int(values) => {
            let arr = array
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| type_drift(name, "int"))?;
            for i in 0..arr.len() {
                if arr.is_null(i) {
                    return Err(null_cell(name));
                }
                values.push(arr.value(i));
            }
        }
        Column::Float(values) => {
            let arr = array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| type_drift(name, "float"))?;
            for i in 0..arr.len() {
                if arr.is_null(i) {
                    return Err(null_cell(name));
                }
                values.push(arr.value(i));
            }
        }
        Column::Str(values) => {
            let arr = array
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| type_drift(name, "str"))?;
            for i in 0..arr.len() {
                if arr.is_null(i) {
                    return Err(null_cell(name));
                }
                values.push(arr.value(i).to_string());
            }
        }
    }
    Ok(())
}

fn type_drift(name: &str, expected: &str) -> Error {
    Error::Storage(format!(
        "column `{name}` is not {expected}-typed on disk as the manifest claims"
    ))
}

fn null_cell(name: &str) -> Error {
    Error::Storage(format!("unexpected null in column `{name}`"))
}
