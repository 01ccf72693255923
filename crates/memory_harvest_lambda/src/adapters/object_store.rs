use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;

use crate::adapters::AdapterError;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn write_object(&self, key: &str, body: Vec<u8>) -> Result<(), AdapterError>;
}

#[derive(Clone)]
pub struct S3ObjectStore {
    bucket: String,
    s3_client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(s3_client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            s3_client,
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn write_object(&self, key: &str, body: Vec<u8>) -> Result<(), AdapterError> {
        self.s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map(|_| ())
            .map_err(|error| AdapterError::new(format!("failed to write object to s3: {error}")))
    }
}
