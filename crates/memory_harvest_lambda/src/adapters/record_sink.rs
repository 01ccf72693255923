use std::sync::Arc;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_firehose::primitives::Blob;
use aws_sdk_firehose::types::Record;
use serde_json::json;

use crate::adapters::object_store::{ObjectStore, S3ObjectStore};
use crate::adapters::AdapterError;
use crate::columnar::{serialize_metric_records_parquet, validate_record};
use crate::config::SinkConfig;
use crate::runtime::contract::WorkUnit;
use crate::runtime::metrics::{record_fingerprint, MetricRecord};
use crate::runtime::storage_keys::{error_object_key, record_object_key, SinkErrorKind};

/// Downstream delivery of finished records. Emitting the same unit's record
/// twice must never corrupt what was delivered the first time.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn emit(&self, unit: &WorkUnit, record: &MetricRecord) -> Result<(), AdapterError>;
}

#[async_trait]
impl<T: RecordSink + ?Sized> RecordSink for Arc<T> {
    async fn emit(&self, unit: &WorkUnit, record: &MetricRecord) -> Result<(), AdapterError> {
        (**self).emit(unit, record).await
    }
}

/// Hands each record to a delivery stream as one JSON line; the stream owns
/// buffering, format conversion and date partitioning.
pub struct FirehoseRecordSink {
    client: aws_sdk_firehose::Client,
    stream: String,
}

impl FirehoseRecordSink {
    pub fn new(client: aws_sdk_firehose::Client, stream: impl Into<String>) -> Self {
        Self {
            client,
            stream: stream.into(),
        }
    }
}

#[async_trait]
impl RecordSink for FirehoseRecordSink {
    async fn emit(&self, _unit: &WorkUnit, record: &MetricRecord) -> Result<(), AdapterError> {
        let line = record
            .to_json_line()
            .map_err(|error| AdapterError::new(format!("failed to encode record: {error}")))?;
        let firehose_record = Record::builder()
            .data(Blob::new(line.into_bytes()))
            .build()
            .map_err(|error| AdapterError::new(format!("failed to build record: {error}")))?;

        self.client
            .put_record()
            .delivery_stream_name(&self.stream)
            .record(firehose_record)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| {
                AdapterError::new(format!("failed putting record into {}: {error}", self.stream))
            })
    }
}

/// Writes each record straight to object storage as a Parquet part under its
/// date partition. Keys are derived from the unit's identity, so a duplicate
/// delivery rewrites the same object.
pub struct S3ParquetRecordSink<O> {
    store: O,
    prefix: String,
}

impl<O: ObjectStore> S3ParquetRecordSink<O> {
    pub fn new(store: O, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    async fn write_error_output(
        &self,
        kind: SinkErrorKind,
        fingerprint: &str,
        record: &MetricRecord,
        message: &str,
    ) -> AdapterError {
        let key = error_object_key(
            &self.prefix,
            kind,
            record.metric_collection_date,
            fingerprint,
        );
        let body = json!({
            "error_type": kind.as_str(),
            "error_message": message,
            "raw_data": record,
        });

        match self.store.write_object(&key, body.to_string().into_bytes()).await {
            Ok(()) => AdapterError::new(format!("{}: {message} (see {key})", kind.as_str())),
            Err(write_error) => AdapterError::new(format!(
                "{}: {message}; error output also failed: {write_error}",
                kind.as_str()
            )),
        }
    }
}

#[async_trait]
impl<O: ObjectStore> RecordSink for S3ParquetRecordSink<O> {
    async fn emit(&self, unit: &WorkUnit, record: &MetricRecord) -> Result<(), AdapterError> {
        let fingerprint = record_fingerprint(unit, record.metric_collection_date);

        if let Err(message) = validate_record(record) {
            return Err(self
                .write_error_output(SinkErrorKind::SchemaValidation, &fingerprint, record, &message)
                .await);
        }

        let body = match serialize_metric_records_parquet(std::slice::from_ref(record)) {
            Ok(body) => body,
            Err(message) => {
                return Err(self
                    .write_error_output(SinkErrorKind::Serialization, &fingerprint, record, &message)
                    .await);
            }
        };

        let key = record_object_key(&self.prefix, record.metric_collection_date, &fingerprint);
        self.store.write_object(&key, body).await
    }
}

/// Sink selected by `SINK_MODE`.
pub enum ConfiguredSink {
    Firehose(FirehoseRecordSink),
    S3Parquet(S3ParquetRecordSink<S3ObjectStore>),
}

impl ConfiguredSink {
    pub fn from_config(config: &SinkConfig, sdk_config: &SdkConfig) -> Self {
        match config {
            SinkConfig::Firehose { stream } => Self::Firehose(FirehoseRecordSink::new(
                aws_sdk_firehose::Client::new(sdk_config),
                stream.clone(),
            )),
            SinkConfig::S3Parquet { bucket, prefix } => {
                let store = S3ObjectStore::new(aws_sdk_s3::Client::new(sdk_config), bucket.clone());
                Self::S3Parquet(S3ParquetRecordSink::new(store, prefix.clone()))
            }
        }
    }
}

#[async_trait]
impl RecordSink for ConfiguredSink {
    async fn emit(&self, unit: &WorkUnit, record: &MetricRecord) -> Result<(), AdapterError> {
        match self {
            Self::Firehose(sink) => sink.emit(unit, record).await,
            Self::S3Parquet(sink) => sink.emit(unit, record).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use super::*;
    use crate::runtime::contract::Architecture;
    use crate::runtime::metrics::RawMemoryStats;

    struct RecordingStore {
        writes: Mutex<HashMap<String, Vec<u8>>>,
        fail_writes: bool,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                writes: Mutex::new(HashMap::new()),
                fail_writes: false,
            }
        }

        fn keys(&self) -> Vec<String> {
            self.writes
                .lock()
                .expect("poisoned mutex")
                .keys()
                .cloned()
                .collect()
        }

        fn body(&self, key: &str) -> Option<Vec<u8>> {
            self.writes
                .lock()
                .expect("poisoned mutex")
                .get(key)
                .cloned()
        }
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn write_object(&self, key: &str, body: Vec<u8>) -> Result<(), AdapterError> {
            if self.fail_writes {
                return Err(AdapterError::new(format!("simulated write failure for key: {key}")));
            }
            self.writes
                .lock()
                .expect("poisoned mutex")
                .insert(key.to_string(), body);
            Ok(())
        }
    }

    fn unit() -> WorkUnit {
        WorkUnit {
            function_name: "thumbnailer".to_string(),
            log_group_name: "/aws/lambda/thumbnailer".to_string(),
            architecture: Architecture::X86_64,
            region: "eu-central-1".to_string(),
            days: 30,
        }
    }

    fn record() -> MetricRecord {
        let stats = RawMemoryStats {
            provisioned_memory_mb: 2048,
            min_memory_used_mb: 300,
            avg_memory_used_mb: 410.0,
            max_memory_used_mb: 612,
            avg_billed_duration_ms: 900.0,
            invocations: 52_000,
        };
        MetricRecord::derive(&unit(), &stats, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
    }

    #[tokio::test]
    async fn writes_parquet_part_under_date_partition() {
        let sink = S3ParquetRecordSink::new(RecordingStore::new(), "lambda_memory_utilization");
        sink.emit(&unit(), &record()).await.expect("emit should succeed");

        let keys = sink.store.keys();
        assert_eq!(keys.len(), 1);
        assert!(keys[0]
            .starts_with("lambda_memory_utilization/metric_collection_date=2026-10-19/part-"));
        assert!(sink.store.body(&keys[0]).unwrap().starts_with(b"PAR1"));
    }

    #[tokio::test]
    async fn duplicate_emission_rewrites_same_object() {
        let sink = S3ParquetRecordSink::new(RecordingStore::new(), "data");
        sink.emit(&unit(), &record()).await.unwrap();
        let first_keys = sink.store.keys();
        let first_body = sink.store.body(&first_keys[0]).unwrap();

        sink.emit(&unit(), &record()).await.unwrap();

        assert_eq!(sink.store.keys(), first_keys);
        assert_eq!(sink.store.body(&first_keys[0]).unwrap(), first_body);
    }

    #[tokio::test]
    async fn invalid_record_goes_to_error_output_and_fails() {
        let sink = S3ParquetRecordSink::new(RecordingStore::new(), "data");
        let mut broken = record();
        broken.max_memory_used_mb = -5;

        let error = sink
            .emit(&unit(), &broken)
            .await
            .expect_err("invalid record should fail");

        assert!(error.0.contains("schema_validation_failed"));
        let keys = sink.store.keys();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("data/errors/schema_validation_failed/2026/10/19/"));
        let body: serde_json::Value =
            serde_json::from_slice(&sink.store.body(&keys[0]).unwrap()).unwrap();
        assert_eq!(body["raw_data"]["function_name"], "thumbnailer");
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_error() {
        let store = RecordingStore {
            writes: Mutex::new(HashMap::new()),
            fail_writes: true,
        };
        let sink = S3ParquetRecordSink::new(store, "data");
        let error = sink.emit(&unit(), &record()).await.expect_err("should fail");
        assert!(error.0.contains("simulated write failure"));
    }
}
