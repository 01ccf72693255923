//! Sequential driver for the enumerate/decide loop.
//!
//! Exactly one enumerator invocation is in flight at a time. The run ends when
//! a page arrives without a continuation token, when an invocation fails, or
//! when the overall time limit elapses.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::adapters::invoke::EnumeratorInvoker;
use crate::error::OrchestrationError;
use crate::runtime::contract::EnumerateRequest;
use crate::runtime::orchestration::OrchestrationState;

const COMPONENT: &str = "orchestrator";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationSummary {
    pub invocations: u64,
    pub items_enqueued: usize,
}

/// Runs the loop from the initial state. Any `next_token` on `parameters` is
/// ignored: a run always starts at the beginning of the unit set.
pub async fn run_orchestration(
    invoker: &impl EnumeratorInvoker,
    parameters: EnumerateRequest,
    limit: Duration,
) -> Result<OrchestrationSummary, OrchestrationError> {
    let started_at = Instant::now();
    tracing::info!(
        component = COMPONENT,
        event = "orchestration_started",
        regions = parameters.regions.as_deref().unwrap_or("all-enabled"),
        limit_secs = limit.as_secs(),
    );

    let mut progress = OrchestrationSummary::default();
    let outcome = tokio::time::timeout(limit, drive(invoker, parameters, &mut progress)).await;
    let result = match outcome {
        Ok(result) => result.map(|()| progress),
        Err(_) => Err(OrchestrationError::TimedOut {
            limit,
            invocations: progress.invocations,
        }),
    };

    match &result {
        Ok(summary) => tracing::info!(
            component = COMPONENT,
            event = "orchestration_completed",
            invocations = summary.invocations,
            items_enqueued = summary.items_enqueued,
            duration_ms = started_at.elapsed().as_millis() as u64,
        ),
        Err(error) => tracing::error!(
            component = COMPONENT,
            event = "orchestration_failed",
            invocations = progress.invocations,
            items_enqueued = progress.items_enqueued,
            error = %error,
        ),
    }

    result
}

async fn drive(
    invoker: &impl EnumeratorInvoker,
    parameters: EnumerateRequest,
    progress: &mut OrchestrationSummary,
) -> Result<(), OrchestrationError> {
    let mut request = EnumerateRequest {
        next_token: None,
        ..parameters
    };
    let mut state = OrchestrationState::initial();

    while let Some(token) = state.pending_token() {
        request.next_token = token.map(str::to_string);
        progress.invocations += 1;

        let response = invoker
            .invoke(&request)
            .await
            .map_err(|source| OrchestrationError::Invocation {
                invocation: progress.invocations,
                source,
            })?;
        progress.items_enqueued += response.items.len();
        tracing::debug!(
            component = COMPONENT,
            event = "page_enumerated",
            invocation = progress.invocations,
            items = response.items.len(),
            has_next_token = response.next_token.is_some(),
        );

        // The enumerator echoes its parameters; the next invocation takes the
        // previous output as input.
        request.regions = response.regions;
        request.days = Some(response.days);
        state = state.after_enumeration(response.next_token)?;
    }

    Ok(())
}
