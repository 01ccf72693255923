use std::time::Instant;

use async_trait::async_trait;

use crate::adapters::invoke::EnumeratorInvoker;
use crate::adapters::queue::WorkQueue;
use crate::adapters::work_source::WorkUnitSource;
use crate::adapters::AdapterError;
use crate::error::EnumerationError;
use crate::runtime::contract::{
    encode_message, normalize_request, EnumerateRequest, EnumerateResponse,
};

const COMPONENT: &str = "enumerator";

/// One enumerator invocation: fetch exactly one page, push every unit of it,
/// then report the page's continuation token. Any failed push fails the whole
/// invocation and no token is reported.
pub async fn handle_enumerate_request(
    request: EnumerateRequest,
    default_days: u32,
    source: &impl WorkUnitSource,
    queue: &impl WorkQueue,
) -> Result<EnumerateResponse, EnumerationError> {
    let started_at = Instant::now();
    let result = enumerate_page(request, default_days, source, queue).await;

    match &result {
        Ok(response) => tracing::info!(
            component = COMPONENT,
            event = "enumeration_completed",
            items = response.items.len(),
            has_next_token = response.next_token.is_some(),
            duration_ms = started_at.elapsed().as_millis() as u64,
        ),
        Err(error) => tracing::error!(
            component = COMPONENT,
            event = "enumeration_failed",
            duration_ms = started_at.elapsed().as_millis() as u64,
            error = %error,
        ),
    }

    result
}

async fn enumerate_page(
    request: EnumerateRequest,
    default_days: u32,
    source: &impl WorkUnitSource,
    queue: &impl WorkQueue,
) -> Result<EnumerateResponse, EnumerationError> {
    let normalized = normalize_request(request, default_days)?;
    tracing::info!(
        component = COMPONENT,
        event = "enumeration_started",
        next_token = normalized.next_token.as_deref().unwrap_or(""),
        days = normalized.days,
    );

    let page = source.fetch_page(&normalized).await?;

    let bodies = page
        .items
        .iter()
        .map(|unit| {
            encode_message(unit).map_err(|error| EnumerationError::Serialization {
                function_name: unit.function_name.clone(),
                message: error.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let total = bodies.len();
    for (pushed, (body, unit)) in bodies.into_iter().zip(&page.items).enumerate() {
        queue
            .push(body)
            .await
            .map_err(|source| EnumerationError::Enqueue {
                function_name: unit.function_name.clone(),
                pushed,
                total,
                source,
            })?;
    }

    Ok(EnumerateResponse {
        next_token: page.next_token,
        items: page.items,
        regions: normalized.regions.map(|regions| regions.join(",")),
        days: normalized.days,
    })
}

/// Runs the enumerator inside the calling process, for local orchestration
/// and tests.
pub struct InProcessEnumerator<S, Q> {
    source: S,
    queue: Q,
    default_days: u32,
}

impl<S: WorkUnitSource, Q: WorkQueue> InProcessEnumerator<S, Q> {
    pub fn new(source: S, queue: Q, default_days: u32) -> Self {
        Self {
            source,
            queue,
            default_days,
        }
    }
}

#[async_trait]
impl<S: WorkUnitSource, Q: WorkQueue> EnumeratorInvoker for InProcessEnumerator<S, Q> {
    async fn invoke(&self, request: &EnumerateRequest) -> Result<EnumerateResponse, AdapterError> {
        handle_enumerate_request(request.clone(), self.default_days, &self.source, &self.queue)
            .await
            .map_err(|error| AdapterError::new(error.to_string()))
    }
}
