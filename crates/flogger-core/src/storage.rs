//! Storage layer: JSON/YAML/text writers and Parquet series files used by
//! the built-in handlers.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use tempfile::NamedTempFile;

use crate::error::{FloggerError, Result};
use crate::models::{Series, Value};

// ─── Directory helpers ────────────────────────────────────────────────────────

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Replace `path` with `content` in one rename.
///
/// The bytes go to a temp file in the same directory first, so readers and
/// concurrent writers of `path` only ever see a complete file.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ─── Text formats ────────────────────────────────────────────────────────────

pub fn save_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let content = serde_json::to_string(data)?;
    write_atomic(path, content.as_bytes())
}

pub fn save_yaml<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let content = serde_yaml::to_string(data)?;
    write_atomic(path, content.as_bytes())
}

pub fn save_text(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

/// One `step: value` line per stored step.
pub fn format_series(series: &Series) -> String {
    let mut out = String::new();
    for (step, value) in series {
        out += &format!("{}: {}\n", step, value);
    }
    out
}

// ─── Parquet series I/O ──────────────────────────────────────────────────────

/// Write a series as a two-column Parquet file (`step`, `value`).
///
/// Numeric series get a Float64 value column, anything else is stored as
/// its display string. The file is replaced as a whole on every call.
/// Steps above `i64::MAX` are rejected with [`FloggerError::StepOutOfRange`].
pub fn write_series_parquet(path: &Path, series: &Series) -> Result<()> {
    let batch = series_to_record_batch(series)?;
    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    write_atomic(path, &buf)
}

/// Read a file written by [`write_series_parquet`].
pub fn read_series_parquet(path: &Path) -> Result<Series> {
    let file = fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut series = Series::new();
    for batch in reader {
        let batch = batch?;
        let steps = batch
            .column_by_name("step")
            .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
            .ok_or_else(|| missing_column("step"))?;
        let values = batch
            .column_by_name("value")
            .ok_or_else(|| missing_column("value"))?;

        for row in 0..batch.num_rows() {
            let value = if let Some(floats) = values.as_any().downcast_ref::<Float64Array>() {
                Value::Float(floats.value(row))
            } else if let Some(texts) = values.as_any().downcast_ref::<StringArray>() {
                Value::Text(texts.value(row).to_string())
            } else {
                return Err(missing_column("value"));
            };
            series.insert(steps.value(row) as u64, value);
        }
    }
    Ok(series)
}

fn missing_column(name: &str) -> FloggerError {
    FloggerError::Arrow(arrow::error::ArrowError::SchemaError(format!(
        "missing or mistyped column '{}'",
        name
    )))
}

fn series_to_record_batch(series: &Series) -> Result<RecordBatch> {
    let numeric = series.values().all(Value::is_numeric);

    let steps = series
        .keys()
        .map(|s| i64::try_from(*s).map_err(|_| FloggerError::StepOutOfRange(*s)))
        .collect::<Result<Vec<i64>>>()?;
    let (value_type, values): (DataType, ArrayRef) = if numeric {
        let vals: Vec<Option<f64>> = series.values().map(Value::as_f64).collect();
        (DataType::Float64, Arc::new(Float64Array::from(vals)))
    } else {
        let vals: Vec<String> = series.values().map(|v| v.to_string()).collect();
        (DataType::Utf8, Arc::new(StringArray::from(vals)))
    };

    let schema = Arc::new(Schema::new(vec![
        Field::new("step", DataType::Int64, false),
        Field::new("value", value_type, true),
    ]));
    Ok(RecordBatch::try_new(
        schema,
        vec![Arc::new(Int64Array::from(steps)), values],
    )?)
}
