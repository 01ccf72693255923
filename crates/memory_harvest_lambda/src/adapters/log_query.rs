use std::sync::Arc;

use async_trait::async_trait;
use aws_config::SdkConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Scheduled,
    Running,
    Complete,
    Failed,
    Cancelled,
    Timeout,
    Unknown,
}

impl QueryStatus {
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Scheduled | Self::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "Scheduled",
            Self::Running => "Running",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
            Self::Timeout => "Timeout",
            Self::Unknown => "Unknown",
        }
    }
}

/// Inclusive query window in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start_epoch_secs: i64,
    pub end_epoch_secs: i64,
}

pub type ResultRow = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResults {
    pub status: QueryStatus,
    pub rows: Vec<ResultRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogQueryError {
    #[error("log group '{0}' does not exist")]
    LogGroupNotFound(String),

    #[error("{0}")]
    Service(String),
}

/// Asynchronous log-analytics query API: submit, then poll for results.
#[async_trait]
pub trait LogInsights: Send + Sync {
    async fn start_query(
        &self,
        region: &str,
        log_group_name: &str,
        query: &str,
        window: QueryWindow,
    ) -> Result<String, LogQueryError>;

    async fn query_results(&self, region: &str, query_id: &str)
        -> Result<QueryResults, LogQueryError>;
}

#[async_trait]
impl<T: LogInsights + ?Sized> LogInsights for Arc<T> {
    async fn start_query(
        &self,
        region: &str,
        log_group_name: &str,
        query: &str,
        window: QueryWindow,
    ) -> Result<String, LogQueryError> {
        (**self)
            .start_query(region, log_group_name, query, window)
            .await
    }

    async fn query_results(
        &self,
        region: &str,
        query_id: &str,
    ) -> Result<QueryResults, LogQueryError> {
        (**self).query_results(region, query_id).await
    }
}

/// Logs Insights client; log groups live in the function's own region, so a
/// client is built per call.
pub struct CloudWatchLogInsights {
    sdk_config: SdkConfig,
}

impl CloudWatchLogInsights {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            sdk_config: sdk_config.clone(),
        }
    }

    fn client(&self, region: &str) -> aws_sdk_cloudwatchlogs::Client {
        let config = aws_sdk_cloudwatchlogs::config::Builder::from(&self.sdk_config)
            .region(aws_sdk_cloudwatchlogs::config::Region::new(
                region.to_string(),
            ))
            .build();
        aws_sdk_cloudwatchlogs::Client::from_conf(config)
    }
}

#[async_trait]
impl LogInsights for CloudWatchLogInsights {
    async fn start_query(
        &self,
        region: &str,
        log_group_name: &str,
        query: &str,
        window: QueryWindow,
    ) -> Result<String, LogQueryError> {
        let response = self
            .client(region)
            .start_query()
            .log_group_name(log_group_name)
            .query_string(query)
            .start_time(window.start_epoch_secs)
            .end_time(window.end_epoch_secs)
            .send()
            .await
            .map_err(|error| {
                let missing = error
                    .as_service_error()
                    .map(|service| service.is_resource_not_found_exception())
                    .unwrap_or(false);
                if missing {
                    LogQueryError::LogGroupNotFound(log_group_name.to_string())
                } else {
                    LogQueryError::Service(format!("failed to start query: {error}"))
                }
            })?;

        response
            .query_id()
            .map(str::to_string)
            .ok_or_else(|| LogQueryError::Service("start_query returned no query id".to_string()))
    }

    async fn query_results(
        &self,
        region: &str,
        query_id: &str,
    ) -> Result<QueryResults, LogQueryError> {
        use aws_sdk_cloudwatchlogs::types::QueryStatus as SdkStatus;

        let response = self
            .client(region)
            .get_query_results()
            .query_id(query_id)
            .send()
            .await
            .map_err(|error| LogQueryError::Service(format!("failed to get query results: {error}")))?;

        let status = match response.status() {
            Some(SdkStatus::Scheduled) => QueryStatus::Scheduled,
            Some(SdkStatus::Running) => QueryStatus::Running,
            Some(SdkStatus::Complete) => QueryStatus::Complete,
            Some(SdkStatus::Failed) => QueryStatus::Failed,
            Some(SdkStatus::Cancelled) => QueryStatus::Cancelled,
            Some(SdkStatus::Timeout) => QueryStatus::Timeout,
            _ => QueryStatus::Unknown,
        };

        let rows = response
            .results()
            .iter()
            .map(|row| {
                row.iter()
                    .filter_map(|cell| {
                        Some((cell.field()?.to_string(), cell.value()?.to_string()))
                    })
                    .collect()
            })
            .collect();

        Ok(QueryResults { status, rows })
    }
}
