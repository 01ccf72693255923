//! Parquet layout of the memory-utilization dataset.
//!
//! The partition column (`metric_collection_date`) is carried in the object
//! key, not in the file.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float32Array, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use crate::runtime::metrics::MetricRecord;

pub fn metric_record_schema() -> Schema {
    Schema::new(vec![
        Field::new("function_name", DataType::Utf8, false),
        Field::new("log_group_name", DataType::Utf8, false),
        Field::new("architecture", DataType::Utf8, false),
        Field::new("provisioned_memory_mb", DataType::Int32, false),
        Field::new("min_memory_used_mb", DataType::Int32, false),
        Field::new("avg_memory_used_mb", DataType::Float32, false),
        Field::new("max_memory_used_mb", DataType::Int32, false),
        Field::new("over_provisioned_memory_mb", DataType::Int32, false),
        Field::new("avg_billed_duration_ms", DataType::Float32, false),
        Field::new("invocations", DataType::Int64, false),
        Field::new("potential_savings", DataType::Float64, false),
    ])
}

/// Rejects rows the catalog table cannot hold meaningfully.
pub fn validate_record(record: &MetricRecord) -> Result<(), String> {
    if record.function_name.trim().is_empty() {
        return Err("function_name cannot be empty".to_string());
    }
    if record.provisioned_memory_mb <= 0 {
        return Err(format!(
            "provisioned_memory_mb must be positive, got {}",
            record.provisioned_memory_mb
        ));
    }
    for (field, value) in [
        ("min_memory_used_mb", record.min_memory_used_mb),
        ("max_memory_used_mb", record.max_memory_used_mb),
        ("over_provisioned_memory_mb", record.over_provisioned_memory_mb),
    ] {
        if value < 0 {
            return Err(format!("{field} cannot be negative, got {value}"));
        }
    }
    if record.invocations < 0 {
        return Err(format!(
            "invocations cannot be negative, got {}",
            record.invocations
        ));
    }
    if !record.avg_memory_used_mb.is_finite()
        || !record.avg_billed_duration_ms.is_finite()
        || !record.potential_savings.is_finite()
    {
        return Err("floating point fields must be finite".to_string());
    }
    Ok(())
}

fn build_record_batch(records: &[MetricRecord]) -> Result<RecordBatch, arrow::error::ArrowError> {
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.function_name.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.log_group_name.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.architecture.as_str()),
        )),
        Arc::new(Int32Array::from_iter_values(
            records.iter().map(|r| r.provisioned_memory_mb),
        )),
        Arc::new(Int32Array::from_iter_values(
            records.iter().map(|r| r.min_memory_used_mb),
        )),
        Arc::new(Float32Array::from_iter_values(
            records.iter().map(|r| r.avg_memory_used_mb),
        )),
        Arc::new(Int32Array::from_iter_values(
            records.iter().map(|r| r.max_memory_used_mb),
        )),
        Arc::new(Int32Array::from_iter_values(
            records.iter().map(|r| r.over_provisioned_memory_mb),
        )),
        Arc::new(Float32Array::from_iter_values(
            records.iter().map(|r| r.avg_billed_duration_ms),
        )),
        Arc::new(Int64Array::from_iter_values(
            records.iter().map(|r| r.invocations),
        )),
        Arc::new(Float64Array::from_iter_values(
            records.iter().map(|r| r.potential_savings),
        )),
    ];

    RecordBatch::try_new(Arc::new(metric_record_schema()), arrays)
}

pub fn serialize_metric_records_parquet(records: &[MetricRecord]) -> Result<Vec<u8>, String> {
    if records.is_empty() {
        return Err("cannot write an empty metric record batch".to_string());
    }

    let batch = build_record_batch(records)
        .map_err(|error| format!("Failed to build metric record batch: {error}"))?;

    let mut buffer = Vec::new();
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))
        .map_err(|error| format!("Failed to open parquet writer: {error}"))?;
    writer
        .write(&batch)
        .map_err(|error| format!("Failed to write metric parquet batch: {error}"))?;
    writer
        .close()
        .map_err(|error| format!("Failed to close metric parquet writer: {error}"))?;

    Ok(buffer)
}
