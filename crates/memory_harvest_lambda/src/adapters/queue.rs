use std::sync::Arc;

use async_trait::async_trait;

use crate::adapters::AdapterError;

/// SQS caps a single receive at ten messages.
pub const MAX_RECEIVE_BATCH: usize = 10;
pub const LONG_POLL_WAIT_SECS: i32 = 20;

/// Producer side of the work queue.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn push(&self, body: String) -> Result<(), AdapterError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub receipt: String,
    pub body: String,
}

/// Consumer side of the work queue. A received message stays invisible until
/// it is acknowledged or its visibility timeout lapses.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn receive(&self, max_messages: usize) -> Result<Vec<ReceivedMessage>, AdapterError>;

    async fn acknowledge(&self, receipt: &str) -> Result<(), AdapterError>;
}

#[async_trait]
impl<T: WorkQueue + ?Sized> WorkQueue for Arc<T> {
    async fn push(&self, body: String) -> Result<(), AdapterError> {
        (**self).push(body).await
    }
}

#[async_trait]
impl<T: MessageSource + ?Sized> MessageSource for Arc<T> {
    async fn receive(&self, max_messages: usize) -> Result<Vec<ReceivedMessage>, AdapterError> {
        (**self).receive(max_messages).await
    }

    async fn acknowledge(&self, receipt: &str) -> Result<(), AdapterError> {
        (**self).acknowledge(receipt).await
    }
}

#[derive(Clone)]
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
    visibility_timeout_secs: Option<i32>,
}

impl SqsQueue {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            visibility_timeout_secs: None,
        }
    }

    /// Overrides the queue's default visibility timeout for received messages.
    pub fn with_visibility_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.visibility_timeout_secs = Some(i32::try_from(timeout.as_secs()).unwrap_or(i32::MAX));
        self
    }
}

#[async_trait]
impl WorkQueue for SqsQueue {
    async fn push(&self, body: String) -> Result<(), AdapterError> {
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| AdapterError::new(format!("failed to enqueue work unit: {error}")))
    }
}

#[async_trait]
impl MessageSource for SqsQueue {
    async fn receive(&self, max_messages: usize) -> Result<Vec<ReceivedMessage>, AdapterError> {
        let batch = max_messages.clamp(1, MAX_RECEIVE_BATCH) as i32;
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(batch)
            .wait_time_seconds(LONG_POLL_WAIT_SECS)
            .set_visibility_timeout(self.visibility_timeout_secs)
            .send()
            .await
            .map_err(|error| AdapterError::new(format!("failed to receive messages: {error}")))?;

        Ok(response
            .messages()
            .iter()
            .filter_map(|message| {
                Some(ReceivedMessage {
                    receipt: message.receipt_handle()?.to_string(),
                    body: message.body()?.to_string(),
                })
            })
            .collect())
    }

    async fn acknowledge(&self, receipt: &str) -> Result<(), AdapterError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| AdapterError::new(format!("failed to delete message: {error}")))
    }
}
