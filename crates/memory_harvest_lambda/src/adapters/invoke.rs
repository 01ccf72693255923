use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;

use crate::adapters::AdapterError;
use crate::runtime::contract::{EnumerateRequest, EnumerateResponse};

/// Synchronous call into the enumerator step.
#[async_trait]
pub trait EnumeratorInvoker: Send + Sync {
    async fn invoke(&self, request: &EnumerateRequest) -> Result<EnumerateResponse, AdapterError>;
}

#[async_trait]
impl<T: EnumeratorInvoker + ?Sized> EnumeratorInvoker for Arc<T> {
    async fn invoke(&self, request: &EnumerateRequest) -> Result<EnumerateResponse, AdapterError> {
        (**self).invoke(request).await
    }
}

pub struct AwsLambdaEnumeratorInvoker {
    lambda_client: aws_sdk_lambda::Client,
    function_name: String,
}

impl AwsLambdaEnumeratorInvoker {
    pub fn new(lambda_client: aws_sdk_lambda::Client, function_name: impl Into<String>) -> Self {
        Self {
            lambda_client,
            function_name: function_name.into(),
        }
    }
}

#[async_trait]
impl EnumeratorInvoker for AwsLambdaEnumeratorInvoker {
    async fn invoke(&self, request: &EnumerateRequest) -> Result<EnumerateResponse, AdapterError> {
        let payload = serde_json::to_vec(request)
            .map_err(|error| AdapterError::new(format!("failed to encode enumerator input: {error}")))?;

        let response = self
            .lambda_client
            .invoke()
            .function_name(&self.function_name)
            .invocation_type(InvocationType::RequestResponse)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|error| AdapterError::new(format!("failed to invoke enumerator: {error}")))?;

        let body = response
            .payload()
            .map(|blob| blob.as_ref().to_vec())
            .unwrap_or_default();

        if let Some(function_error) = response.function_error() {
            return Err(AdapterError::new(format!(
                "enumerator reported {function_error}: {}",
                String::from_utf8_lossy(&body)
            )));
        }

        serde_json::from_slice(&body)
            .map_err(|error| AdapterError::new(format!("malformed enumerator output: {error}")))
    }
}
