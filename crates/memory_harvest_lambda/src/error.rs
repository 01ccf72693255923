use std::time::Duration;

use crate::adapters::work_source::SourceError;
use crate::adapters::AdapterError;
use crate::runtime::contract::ValidationError;
use crate::runtime::orchestration::TransitionError;

#[derive(Debug, thiserror::Error)]
pub enum EnumerationError {
    #[error("invalid enumerator input: {0}")]
    InvalidRequest(#[from] ValidationError),

    #[error("work-unit source failed: {0}")]
    Source(#[from] SourceError),

    #[error("failed to serialize work unit '{function_name}': {message}")]
    Serialization {
        function_name: String,
        message: String,
    },

    #[error("failed to enqueue work unit '{function_name}' after {pushed} of {total} pushes: {source}")]
    Enqueue {
        function_name: String,
        pushed: usize,
        total: usize,
        source: AdapterError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("invalid queued message: {0}")]
    InvalidMessage(ValidationError),

    #[error("metric query for '{function_name}' could not be submitted: {message}")]
    QueryStart {
        function_name: String,
        message: String,
    },

    #[error("metric query {query_id} could not be polled: {message}")]
    QueryPoll { query_id: String, message: String },

    #[error("metric query {query_id} ended with status {status}")]
    QueryFailed { query_id: String, status: String },

    #[error("metric query for '{function_name}' exceeded {timeout:?}")]
    QueryTimeout {
        function_name: String,
        timeout: Duration,
    },

    #[error("metric query returned a malformed row: {0}")]
    MalformedResult(ValidationError),

    #[error("record for '{function_name}' could not be delivered to the sink: {source}")]
    Sink {
        function_name: String,
        source: AdapterError,
    },

    #[error("event is not a queue batch: {0}")]
    InvalidEvent(String),
}

impl WorkerError {
    /// Stable label for log fields and dashboards.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidMessage(_) => "invalid_message",
            Self::QueryStart { .. } => "query_start_failed",
            Self::QueryPoll { .. } => "query_poll_failed",
            Self::QueryFailed { .. } => "query_failed",
            Self::QueryTimeout { .. } => "query_timeout",
            Self::MalformedResult(_) => "malformed_query_result",
            Self::Sink { .. } => "sink_failed",
            Self::InvalidEvent(_) => "invalid_event",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("enumerator invocation {invocation} failed: {source}")]
    Invocation {
        invocation: u64,
        source: AdapterError,
    },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("orchestration exceeded {limit:?} after {invocations} enumerator invocations")]
    TimedOut { limit: Duration, invocations: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be configured")]
    Missing(&'static str),

    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
