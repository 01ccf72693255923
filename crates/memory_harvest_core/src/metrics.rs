use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::contract::{Architecture, ValidationError, WorkUnit};

/// Smallest memory size a function can be configured with.
pub const MIN_PROVISIONED_MEMORY_MB: i32 = 128;

pub const X86_64_PRICE_PER_GB_SECOND: f64 = 0.0000166667;
pub const ARM64_PRICE_PER_GB_SECOND: f64 = 0.0000133334;

/// Log-insights statistics over the platform's per-invocation `REPORT` lines.
pub const MEMORY_STATS_QUERY: &str = r#"filter @type = "REPORT"
| stats max(@memorySize / 1000 / 1000) as provisioned_memory_mb,
min(@maxMemoryUsed / 1000 / 1000) as min_memory_used_mb,
avg(@maxMemoryUsed / 1000 / 1000) as avg_memory_used_mb,
max(@maxMemoryUsed / 1000 / 1000) as max_memory_used_mb,
avg(@billedDuration) as avg_billed_duration_ms,
count(@requestId) as invocations"#;

pub fn price_per_gb_second(architecture: Architecture) -> f64 {
    match architecture {
        Architecture::X86_64 => X86_64_PRICE_PER_GB_SECOND,
        Architecture::Arm64 => ARM64_PRICE_PER_GB_SECOND,
    }
}

/// Observed values for one function, as returned by the metric query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawMemoryStats {
    pub provisioned_memory_mb: i32,
    pub min_memory_used_mb: i32,
    pub avg_memory_used_mb: f32,
    pub max_memory_used_mb: i32,
    pub avg_billed_duration_ms: f32,
    pub invocations: i64,
}

impl RawMemoryStats {
    /// Parses one query result row given as `(field, value)` pairs. Unknown
    /// fields are ignored, including any over-provisioning column the query
    /// may compute: derived values are always recomputed here.
    pub fn from_fields<'a>(
        fields: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ValidationError> {
        let mut provisioned = None;
        let mut min_used = None;
        let mut avg_used = None;
        let mut max_used = None;
        let mut avg_billed = None;
        let mut invocations = None;

        for (field, value) in fields {
            let slot = match field {
                "provisioned_memory_mb" => &mut provisioned,
                "min_memory_used_mb" => &mut min_used,
                "avg_memory_used_mb" => &mut avg_used,
                "max_memory_used_mb" => &mut max_used,
                "avg_billed_duration_ms" => &mut avg_billed,
                "invocations" => &mut invocations,
                _ => continue,
            };
            *slot = Some(parse_number(field, value)?);
        }

        Ok(Self {
            provisioned_memory_mb: required(provisioned, "provisioned_memory_mb")?.round() as i32,
            min_memory_used_mb: required(min_used, "min_memory_used_mb")?.round() as i32,
            avg_memory_used_mb: required(avg_used, "avg_memory_used_mb")? as f32,
            max_memory_used_mb: required(max_used, "max_memory_used_mb")?.round() as i32,
            avg_billed_duration_ms: required(avg_billed, "avg_billed_duration_ms")? as f32,
            invocations: required(invocations, "invocations")?.round() as i64,
        })
    }
}

fn parse_number(field: &str, value: &str) -> Result<f64, ValidationError> {
    let parsed: f64 = value.trim().parse().map_err(|_| {
        ValidationError::new(format!("query field '{field}' is not numeric: '{value}'"))
    })?;
    if !parsed.is_finite() {
        return Err(ValidationError::new(format!(
            "query field '{field}' is not finite: '{value}'"
        )));
    }
    Ok(parsed)
}

fn required(value: Option<f64>, field: &str) -> Result<f64, ValidationError> {
    value.ok_or_else(|| ValidationError::new(format!("query result is missing '{field}'")))
}

/// One row of the memory-utilization dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    pub function_name: String,
    pub log_group_name: String,
    pub architecture: Architecture,
    pub provisioned_memory_mb: i32,
    pub min_memory_used_mb: i32,
    pub avg_memory_used_mb: f32,
    pub max_memory_used_mb: i32,
    pub over_provisioned_memory_mb: i32,
    pub avg_billed_duration_ms: f32,
    pub invocations: i64,
    pub potential_savings: f64,
    #[serde(with = "collection_date")]
    pub metric_collection_date: NaiveDate,
}

impl MetricRecord {
    pub fn derive(unit: &WorkUnit, stats: &RawMemoryStats, collected_on: NaiveDate) -> Self {
        let over_provisioned_memory_mb = over_provisioned_memory_mb(stats);
        let potential_savings = potential_savings(
            over_provisioned_memory_mb,
            stats.avg_billed_duration_ms,
            stats.invocations,
            unit.architecture,
        );

        Self {
            function_name: unit.function_name.clone(),
            log_group_name: unit.log_group_name.clone(),
            architecture: unit.architecture,
            provisioned_memory_mb: stats.provisioned_memory_mb,
            min_memory_used_mb: stats.min_memory_used_mb,
            avg_memory_used_mb: stats.avg_memory_used_mb,
            max_memory_used_mb: stats.max_memory_used_mb,
            over_provisioned_memory_mb,
            avg_billed_duration_ms: stats.avg_billed_duration_ms,
            invocations: stats.invocations,
            potential_savings,
            metric_collection_date: collected_on,
        }
    }

    /// Line-delimited JSON form consumed by the sink.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Memory that could be released: provisioned minus peak usage, where peak
/// usage below the platform minimum counts as the minimum. Never negative.
pub fn over_provisioned_memory_mb(stats: &RawMemoryStats) -> i32 {
    let floor = stats.max_memory_used_mb.max(MIN_PROVISIONED_MEMORY_MB);
    stats.provisioned_memory_mb.saturating_sub(floor).max(0)
}

/// Over-provisioned GB × billed seconds × price × invocations.
pub fn potential_savings(
    over_provisioned_memory_mb: i32,
    avg_billed_duration_ms: f32,
    invocations: i64,
    architecture: Architecture,
) -> f64 {
    let over_provisioned_gb = f64::from(over_provisioned_memory_mb) / 1000.0;
    let billed_seconds = f64::from(avg_billed_duration_ms) / 1000.0;
    over_provisioned_gb * billed_seconds * price_per_gb_second(architecture) * invocations as f64
}

/// Stable identity of a unit's record for one collection date. Duplicate
/// deliveries of the same unit on the same day share it.
pub fn record_fingerprint(unit: &WorkUnit, collected_on: NaiveDate) -> String {
    let mut hasher = Sha256::new();
    for part in [
        unit.region.as_str(),
        unit.function_name.as_str(),
        unit.log_group_name.as_str(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(collected_on.format("%Y-%m-%d").to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

mod collection_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(architecture: Architecture) -> WorkUnit {
        WorkUnit {
            function_name: "checkout".to_string(),
            log_group_name: "/aws/lambda/checkout".to_string(),
            architecture,
            region: "us-east-1".to_string(),
            days: 30,
        }
    }

    fn stats(provisioned: i32, max_used: i32) -> RawMemoryStats {
        RawMemoryStats {
            provisioned_memory_mb: provisioned,
            min_memory_used_mb: 90,
            avg_memory_used_mb: 180.5,
            max_memory_used_mb: max_used,
            avg_billed_duration_ms: 250.0,
            invocations: 10_000,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn over_provisioned_is_provisioned_minus_peak() {
        assert_eq!(over_provisioned_memory_mb(&stats(1024, 300)), 724);
    }

    #[test]
    fn over_provisioned_never_goes_below_platform_minimum() {
        assert_eq!(over_provisioned_memory_mb(&stats(1024, 60)), 1024 - 128);
        assert_eq!(over_provisioned_memory_mb(&stats(128, 60)), 0);
    }

    #[test]
    fn over_provisioned_is_zero_when_peak_exceeds_provisioned() {
        assert_eq!(over_provisioned_memory_mb(&stats(512, 600)), 0);
    }

    #[test]
    fn savings_follow_architecture_price() {
        let x86 = MetricRecord::derive(&unit(Architecture::X86_64), &stats(1024, 300), date());
        let arm = MetricRecord::derive(&unit(Architecture::Arm64), &stats(1024, 300), date());

        let expected_x86 = 0.724 * 0.25 * X86_64_PRICE_PER_GB_SECOND * 10_000.0;
        assert!((x86.potential_savings - expected_x86).abs() < 1e-12);
        assert!(arm.potential_savings < x86.potential_savings);
    }

    #[test]
    fn derive_is_deterministic() {
        let first = MetricRecord::derive(&unit(Architecture::Arm64), &stats(2048, 700), date());
        let second = MetricRecord::derive(&unit(Architecture::Arm64), &stats(2048, 700), date());
        assert_eq!(first, second);
    }

    #[test]
    fn parses_query_row_and_ignores_reported_over_provisioning() {
        let row = [
            ("provisioned_memory_mb", "1024"),
            ("min_memory_used_mb", "88"),
            ("avg_memory_used_mb", "140.25"),
            ("max_memory_used_mb", "201"),
            ("over_provisioned_memory_mb", "999999"),
            ("avg_billed_duration_ms", "37.5"),
            ("invocations", "4312"),
        ];
        let parsed = RawMemoryStats::from_fields(row).unwrap();

        assert_eq!(parsed.provisioned_memory_mb, 1024);
        assert_eq!(parsed.max_memory_used_mb, 201);
        assert_eq!(parsed.invocations, 4312);

        let record = MetricRecord::derive(&unit(Architecture::X86_64), &parsed, date());
        assert_eq!(record.over_provisioned_memory_mb, 823);
    }

    #[test]
    fn parse_rejects_missing_and_non_numeric_fields() {
        let missing = RawMemoryStats::from_fields([("provisioned_memory_mb", "1024")])
            .expect_err("missing fields should fail");
        assert!(missing.message().contains("min_memory_used_mb"));

        let garbage = RawMemoryStats::from_fields([("invocations", "lots")])
            .expect_err("non-numeric should fail");
        assert!(garbage.message().contains("not numeric"));
    }

    #[test]
    fn json_line_carries_partition_date() {
        let record = MetricRecord::derive(&unit(Architecture::Arm64), &stats(512, 200), date());
        let line = record.to_json_line().unwrap();

        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["metric_collection_date"], "2026-10-19");
        assert_eq!(value["architecture"], "arm64");
        assert_eq!(value["over_provisioned_memory_mb"], 312);
    }

    #[test]
    fn fingerprint_is_stable_per_unit_and_day() {
        let base = unit(Architecture::Arm64);
        let mut other_region = base.clone();
        other_region.region = "eu-west-1".to_string();

        assert_eq!(
            record_fingerprint(&base, date()),
            record_fingerprint(&base, date())
        );
        assert_ne!(
            record_fingerprint(&base, date()),
            record_fingerprint(&other_region, date())
        );
        assert_ne!(
            record_fingerprint(&base, date()),
            record_fingerprint(&base, date().succ_opt().unwrap())
        );
    }
}
