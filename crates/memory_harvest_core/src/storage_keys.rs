use chrono::{Datelike, NaiveDate};

pub const PARTITION_KEY: &str = "metric_collection_date";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkErrorKind {
    SchemaValidation,
    Serialization,
}

impl SinkErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SchemaValidation => "schema_validation_failed",
            Self::Serialization => "format_conversion_failed",
        }
    }
}

fn with_base(base_prefix: &str, rest: String) -> String {
    let trimmed = base_prefix.trim_matches('/');
    if trimmed.is_empty() {
        rest
    } else {
        format!("{trimmed}/{rest}")
    }
}

pub fn partition_prefix(base_prefix: &str, collected_on: NaiveDate) -> String {
    with_base(
        base_prefix,
        format!("{PARTITION_KEY}={}", collected_on.format("%Y-%m-%d")),
    )
}

pub fn record_object_key(base_prefix: &str, collected_on: NaiveDate, fingerprint: &str) -> String {
    format!(
        "{}/part-{fingerprint}.parquet",
        partition_prefix(base_prefix, collected_on)
    )
}

pub fn error_prefix(base_prefix: &str, kind: SinkErrorKind, failed_on: NaiveDate) -> String {
    with_base(
        base_prefix,
        format!(
            "errors/{}/{:04}/{:02}/{:02}",
            kind.as_str(),
            failed_on.year(),
            failed_on.month(),
            failed_on.day()
        ),
    )
}

pub fn error_object_key(
    base_prefix: &str,
    kind: SinkErrorKind,
    failed_on: NaiveDate,
    fingerprint: &str,
) -> String {
    format!(
        "{}/{fingerprint}.json",
        error_prefix(base_prefix, kind, failed_on)
    )
}
