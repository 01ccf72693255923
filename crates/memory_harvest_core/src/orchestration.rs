//! Loop-until-done orchestration graph.
//!
//! The only carried state is the last continuation token. Enumerated units
//! never travel through the state; they are pushed to the queue as a side
//! effect of each enumerator invocation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Long enough for arbitrarily many pages without looking like a stuck run.
pub const ORCHESTRATION_TIMEOUT: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Additional attempts for a failed enumerator invocation. Zero: a failure
/// ends the run.
pub const ENUMERATOR_RETRY_ATTEMPTS: u32 = 0;

pub const START_STATE: &str = "Start";
pub const ENUMERATE_STATE: &str = "Enumerate";
pub const DECIDE_STATE: &str = "Decide";
pub const DONE_STATE: &str = "Done";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrchestrationState {
    Enumerate { next_token: Option<String> },
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("orchestration already reached Done; no further enumeration is allowed")]
pub struct TransitionError;

impl OrchestrationState {
    pub fn initial() -> Self {
        Self::Enumerate { next_token: None }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Token the next enumerator invocation must receive, if this state
    /// enumerates.
    pub fn pending_token(&self) -> Option<Option<&str>> {
        match self {
            Self::Enumerate { next_token } => Some(next_token.as_deref()),
            Self::Done => None,
        }
    }

    /// The `Decide` branch: a present token loops back with that exact token,
    /// absence is the sole termination signal.
    pub fn decide(next_token: Option<String>) -> Self {
        match next_token {
            Some(token) => Self::Enumerate {
                next_token: Some(token),
            },
            None => Self::Done,
        }
    }

    pub fn after_enumeration(self, next_token: Option<String>) -> Result<Self, TransitionError> {
        match self {
            Self::Enumerate { .. } => Ok(Self::decide(next_token)),
            Self::Done => Err(TransitionError),
        }
    }
}

fn enumerator_retry_policy() -> Value {
    if ENUMERATOR_RETRY_ATTEMPTS == 0 {
        return json!([]);
    }
    json!([{
        "ErrorEquals": ["States.ALL"],
        "MaxAttempts": ENUMERATOR_RETRY_ATTEMPTS,
    }])
}

/// Amazon States Language rendering of the same graph, for deployments that
/// hand the loop to a managed workflow service. The `Start` pass state nulls
/// any `next_token` on the execution input, so every run begins at the first
/// page.
pub fn state_machine_definition(enumerator_function: &str) -> Value {
    json!({
        "Comment": "Enumerate serverless functions into the work queue until no continuation token remains",
        "StartAt": START_STATE,
        "TimeoutSeconds": ORCHESTRATION_TIMEOUT.as_secs(),
        "States": {
            START_STATE: {
                "Type": "Pass",
                "Result": null,
                "ResultPath": "$.next_token",
                "Next": ENUMERATE_STATE,
            },
            ENUMERATE_STATE: {
                "Type": "Task",
                "Resource": "arn:aws:states:::lambda:invoke",
                "Parameters": {
                    "FunctionName": enumerator_function,
                    "Payload.$": "$",
                },
                "InputPath": "$",
                "OutputPath": "$.Payload",
                "Retry": enumerator_retry_policy(),
                "Next": DECIDE_STATE,
            },
            DECIDE_STATE: {
                "Type": "Choice",
                "Choices": [
                    {
                        "Variable": "$.next_token",
                        "IsPresent": true,
                        "Next": ENUMERATE_STATE,
                    }
                ],
                "Default": DONE_STATE,
            },
            DONE_STATE: {
                "Type": "Succeed",
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_enumerating_without_token() {
        let state = OrchestrationState::initial();
        assert_eq!(state.pending_token(), Some(None));
        assert!(!state.is_done());
    }

    #[test]
    fn absent_token_transitions_to_done() {
        let state = OrchestrationState::initial()
            .after_enumeration(None)
            .expect("transition should succeed");
        assert!(state.is_done());
        assert_eq!(state.pending_token(), None);
    }

    #[test]
    fn present_token_loops_with_exact_token() {
        let state = OrchestrationState::initial()
            .after_enumeration(Some("us-east-1#abc".to_string()))
            .expect("transition should succeed");
        assert_eq!(state.pending_token(), Some(Some("us-east-1#abc")));
    }

    #[test]
    fn done_is_terminal() {
        let error = OrchestrationState::Done
            .after_enumeration(Some("T1".to_string()))
            .expect_err("done must not transition");
        assert_eq!(error, TransitionError);
    }

    #[test]
    fn state_serializes_as_tagged_variant() {
        let json = serde_json::to_value(OrchestrationState::decide(Some("T1".to_string()))).unwrap();
        assert_eq!(json, json!({"state": "enumerate", "next_token": "T1"}));
    }

    #[test]
    fn definition_branches_on_token_presence() {
        let definition = state_machine_definition("lambda-log-group-loader");

        assert_eq!(definition["StartAt"], START_STATE);
        assert_eq!(definition["TimeoutSeconds"], 2_592_000);

        let start = &definition["States"][START_STATE];
        assert_eq!(start["Type"], "Pass");
        assert_eq!(start["Result"], Value::Null);
        assert_eq!(start["ResultPath"], "$.next_token");
        assert_eq!(start["Next"], ENUMERATE_STATE);

        let task = &definition["States"][ENUMERATE_STATE];
        assert_eq!(task["OutputPath"], "$.Payload");
        assert_eq!(task["Retry"], json!([]));
        assert_eq!(task["Parameters"]["FunctionName"], "lambda-log-group-loader");

        let choice = &definition["States"][DECIDE_STATE];
        assert_eq!(choice["Choices"][0]["Variable"], "$.next_token");
        assert_eq!(choice["Choices"][0]["Next"], ENUMERATE_STATE);
        assert_eq!(choice["Default"], DONE_STATE);
        assert_eq!(definition["States"][DONE_STATE]["Type"], "Succeed");
    }
}
