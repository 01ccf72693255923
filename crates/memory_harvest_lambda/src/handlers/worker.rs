use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::adapters::log_query::{
    LogInsights, LogQueryError, QueryStatus, QueryWindow, ResultRow,
};
use crate::adapters::record_sink::RecordSink;
use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::runtime::contract::{decode_message, ValidationError, WorkUnit};
use crate::runtime::metrics::{
    record_fingerprint, MetricRecord, RawMemoryStats, MEMORY_STATS_QUERY,
};

const COMPONENT: &str = "worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Bound on submit plus polling; must stay below the queue's visibility
    /// timeout.
    pub query_timeout: Duration,
    pub poll_interval: Duration,
}

impl From<&WorkerConfig> for WorkerSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            query_timeout: config.query_timeout,
            poll_interval: config.poll_interval,
        }
    }
}

/// How a delivered unit was settled. Every variant means the message may be
/// acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    Emitted { fingerprint: String },
    LogGroupMissing,
    NoResults,
}

impl WorkOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emitted { .. } => "emitted",
            Self::LogGroupMissing => "log_group_missing",
            Self::NoResults => "no_query_results",
        }
    }
}

/// One bounded metric query for one unit, and at most one record out.
pub async fn process_work_unit(
    unit: &WorkUnit,
    settings: WorkerSettings,
    insights: &impl LogInsights,
    sink: &impl RecordSink,
    now: DateTime<Utc>,
) -> Result<WorkOutcome, WorkerError> {
    let started_at = Instant::now();
    tracing::info!(
        component = COMPONENT,
        event = "work_unit_started",
        function_name = %unit.function_name,
        region = %unit.region,
        days = unit.days,
    );

    let result = collect_and_emit(unit, settings, insights, sink, now).await;
    let duration_ms = started_at.elapsed().as_millis() as u64;

    match &result {
        Ok(WorkOutcome::Emitted { fingerprint }) => tracing::info!(
            component = COMPONENT,
            event = "work_unit_completed",
            function_name = %unit.function_name,
            region = %unit.region,
            fingerprint = %fingerprint,
            duration_ms,
        ),
        Ok(skipped) => tracing::warn!(
            component = COMPONENT,
            event = "work_unit_skipped",
            function_name = %unit.function_name,
            region = %unit.region,
            reason = skipped.as_str(),
            duration_ms,
        ),
        Err(error) => tracing::error!(
            component = COMPONENT,
            event = "work_unit_failed",
            function_name = %unit.function_name,
            region = %unit.region,
            reason = error.kind(),
            duration_ms,
            error = %error,
        ),
    }

    result
}

async fn collect_and_emit(
    unit: &WorkUnit,
    settings: WorkerSettings,
    insights: &impl LogInsights,
    sink: &impl RecordSink,
    now: DateTime<Utc>,
) -> Result<WorkOutcome, WorkerError> {
    let window_start = now
        .checked_sub_signed(chrono::Duration::days(i64::from(unit.days)))
        .ok_or_else(|| {
            WorkerError::InvalidMessage(ValidationError::new(format!(
                "lookback of {} days is out of range",
                unit.days
            )))
        })?;
    let window = QueryWindow {
        start_epoch_secs: window_start.timestamp(),
        end_epoch_secs: now.timestamp(),
    };

    let rows = tokio::time::timeout(
        settings.query_timeout,
        run_query(unit, window, settings.poll_interval, insights),
    )
    .await
    .map_err(|_| WorkerError::QueryTimeout {
        function_name: unit.function_name.clone(),
        timeout: settings.query_timeout,
    })??;

    let Some(rows) = rows else {
        return Ok(WorkOutcome::LogGroupMissing);
    };
    let Some(row) = rows.first() else {
        return Ok(WorkOutcome::NoResults);
    };

    let stats = RawMemoryStats::from_fields(
        row.iter()
            .map(|(field, value)| (field.as_str(), value.as_str())),
    )
    .map_err(WorkerError::MalformedResult)?;

    let collected_on = now.date_naive();
    let record = MetricRecord::derive(unit, &stats, collected_on);
    sink.emit(unit, &record)
        .await
        .map_err(|source| WorkerError::Sink {
            function_name: unit.function_name.clone(),
            source,
        })?;

    Ok(WorkOutcome::Emitted {
        fingerprint: record_fingerprint(unit, collected_on),
    })
}

/// Submits the statistics query and polls until it leaves the pending
/// states. `None` means the log group does not exist.
async fn run_query(
    unit: &WorkUnit,
    window: QueryWindow,
    poll_interval: Duration,
    insights: &impl LogInsights,
) -> Result<Option<Vec<ResultRow>>, WorkerError> {
    let query_id = match insights
        .start_query(&unit.region, &unit.log_group_name, MEMORY_STATS_QUERY, window)
        .await
    {
        Ok(query_id) => query_id,
        Err(LogQueryError::LogGroupNotFound(_)) => return Ok(None),
        Err(LogQueryError::Service(message)) => {
            return Err(WorkerError::QueryStart {
                function_name: unit.function_name.clone(),
                message,
            });
        }
    };

    loop {
        tokio::time::sleep(poll_interval).await;
        let results = insights
            .query_results(&unit.region, &query_id)
            .await
            .map_err(|error| WorkerError::QueryPoll {
                query_id: query_id.clone(),
                message: error.to_string(),
            })?;

        match results.status {
            status if status.is_pending() => continue,
            QueryStatus::Complete => return Ok(Some(results.rows)),
            status => {
                return Err(WorkerError::QueryFailed {
                    query_id,
                    status: status.as_str().to_string(),
                });
            }
        }
    }
}

/// Decodes one queued message body and processes it.
pub async fn handle_message_body(
    body: &str,
    settings: WorkerSettings,
    insights: &impl LogInsights,
    sink: &impl RecordSink,
    now: DateTime<Utc>,
) -> Result<WorkOutcome, WorkerError> {
    let unit = decode_message(body).map_err(WorkerError::InvalidMessage)?;
    process_work_unit(&unit, settings, insights, sink, now).await
}

/// Lambda entry point: a queue batch is processed record by record and the
/// first failure fails the invocation. Any other payload is taken as a single
/// work unit, which allows direct test invocations.
pub async fn handle_worker_event(
    event: &Value,
    settings: WorkerSettings,
    insights: &impl LogInsights,
    sink: &impl RecordSink,
    now: DateTime<Utc>,
) -> Result<Vec<WorkOutcome>, WorkerError> {
    let bodies = if is_sqs_event(event) {
        decode_sqs_bodies(event)?
    } else {
        vec![event.to_string()]
    };

    let mut outcomes = Vec::with_capacity(bodies.len());
    for body in bodies {
        outcomes.push(handle_message_body(&body, settings, insights, sink, now).await?);
    }
    Ok(outcomes)
}

pub fn is_sqs_event(event: &Value) -> bool {
    event
        .get("Records")
        .and_then(Value::as_array)
        .map(|records| {
            !records.is_empty()
                && records.iter().all(|record| {
                    record
                        .get("eventSource")
                        .and_then(Value::as_str)
                        .map(|source| source == "aws:sqs")
                        .unwrap_or(false)
                })
        })
        .unwrap_or(false)
}

fn decode_sqs_bodies(event: &Value) -> Result<Vec<String>, WorkerError> {
    let records = event
        .get("Records")
        .and_then(Value::as_array)
        .ok_or_else(|| WorkerError::InvalidEvent("SQS event must include Records array".to_string()))?;

    records
        .iter()
        .map(|record| {
            record
                .get("body")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    WorkerError::InvalidEvent("SQS record body must be a string".to_string())
                })
        })
        .collect()
}
