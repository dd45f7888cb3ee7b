//! SQS-backed event publisher.
//!
//! The channel passed to [`EventPublisher::publish`] is the queue URL.
//! The SDK client is cheap to clone and pools HTTP connections internally.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::config::{Credentials, Region};
use aws_sdk_sqs::error::{DisplayErrorContext, SdkError};
use aws_sdk_sqs::types::QueueAttributeName;
use aws_sdk_sqs::Client;

use super::{EventPublisher, PublishError};
use crate::config::QueueConfig;

/// Largest message body SQS accepts.
pub const MAX_PAYLOAD_BYTES: usize = 256 * 1024;

#[derive(Clone)]
pub struct SqsPublisher {
    client: Client,
    timeout: Duration,
}

impl SqsPublisher {
    /// Build a client from the queue section of the service config.
    pub async fn from_config(config: &QueueConfig, timeout: Duration) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                id.clone(),
                secret.clone(),
                None,
                None,
                "inventory-service-config",
            ));
        }

        let shared = loader.load().await;
        tracing::info!(
            region = %config.region,
            endpoint = config.endpoint_url.as_deref().unwrap_or("aws-default"),
            queue_url = %config.queue_url,
            "Queue client configured"
        );

        Self {
            client: Client::new(&shared),
            timeout,
        }
    }
}

#[async_trait]
impl EventPublisher for SqsPublisher {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), PublishError> {
        let body = message_body(payload)?;
        let send = self
            .client
            .send_message()
            .queue_url(channel)
            .message_body(body)
            .send();

        tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| PublishError::Timeout)?
            .map_err(classify)?;
        Ok(())
    }

    async fn ping(&self, channel: &str) -> Result<(), PublishError> {
        let probe = self
            .client
            .get_queue_attributes()
            .queue_url(channel)
            .attribute_names(QueueAttributeName::QueueArn)
            .send();

        tokio::time::timeout(self.timeout, probe)
            .await
            .map_err(|_| PublishError::Timeout)?
            .map_err(classify)?;
        Ok(())
    }
}

/// SQS bodies are text; the payload is sent unchanged or rejected.
fn message_body(payload: &[u8]) -> Result<String, PublishError> {
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(PublishError::PayloadTooLarge {
            size: payload.len(),
            limit: MAX_PAYLOAD_BYTES,
        });
    }
    String::from_utf8(payload.to_vec()).map_err(|e| PublishError::InvalidPayload(e.to_string()))
}

fn classify<E, R>(err: SdkError<E, R>) -> PublishError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match err {
        SdkError::TimeoutError(_) => PublishError::Timeout,
        other => PublishError::ChannelUnavailable(DisplayErrorContext(other).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> QueueConfig {
        QueueConfig {
            endpoint_url: Some("http://127.0.0.1:9".into()),
            queue_url: "http://127.0.0.1:9/000000000000/events".into(),
            access_key_id: Some("test".into()),
            secret_access_key: Some("test".into()),
            ..QueueConfig::default()
        }
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected_before_sending() {
        let config = offline_config();
        let publisher = SqsPublisher::from_config(&config, Duration::from_secs(1)).await;

        let err = publisher
            .publish(&config.queue_url, &vec![b'x'; MAX_PAYLOAD_BYTES + 1])
            .await
            .unwrap_err();

        assert_eq!(
            err,
            PublishError::PayloadTooLarge {
                size: MAX_PAYLOAD_BYTES + 1,
                limit: MAX_PAYLOAD_BYTES,
            }
        );
    }

    #[test]
    fn test_payload_at_limit_is_accepted() {
        let body = message_body(&vec![b'x'; MAX_PAYLOAD_BYTES]).unwrap();
        assert_eq!(body.len(), MAX_PAYLOAD_BYTES);
    }

    #[test]
    fn test_json_payload_passes_through_unchanged() {
        let payload = br#"{"source":"inventory-service","hits":5}"#;
        assert_eq!(message_body(payload).unwrap().as_bytes(), payload);
    }

    #[test]
    fn test_invalid_utf8_is_rejected_not_rewritten() {
        let err = message_body(&[b'{', 0xff, b'}']).unwrap_err();
        assert!(matches!(err, PublishError::InvalidPayload(_)));
        assert_eq!(err.kind(), "invalid_payload");
    }
}
