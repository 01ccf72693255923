pub mod catalog;
pub mod invoke;
pub mod log_query;
pub mod memory_queue;
pub mod object_store;
pub mod queue;
pub mod record_sink;
pub mod work_source;

/// Failure reported by a managed-service adapter. Carries the service's
/// error text; callers decide whether it is fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct AdapterError(pub String);

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
