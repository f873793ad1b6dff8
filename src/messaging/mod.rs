use async_trait::async_trait;
use rdkafka::error::KafkaError;

pub mod kafka;
pub mod memory;

pub use kafka::{KafkaPublisher, KafkaQueue};
pub use memory::InMemoryQueue;

// ============================================================================
// Message Queue Abstraction
// ============================================================================
//
// The ingestion pipeline only needs three things from a broker:
// - fetch the next message (blocking)
// - commit a message once it reached a terminal outcome
// - publish a message, with headers, to another topic (dead letters)
//
// Offsets are never committed automatically; a message that was fetched but
// not committed is redelivered after a restart.
//
// ============================================================================

/// One fetched message, detached from the client's buffers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    pub headers: Vec<(String, Vec<u8>)>,
}

impl QueueMessage {
    /// Key as text, for logs.
    pub fn key_str(&self) -> String {
        self.key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_slice())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("queue is closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn fetch(&self) -> Result<QueueMessage, QueueError>;

    async fn commit(&self, message: &QueueMessage) -> Result<(), QueueError>;

    /// Publish `message`'s key and payload verbatim to `topic`, with `headers`.
    async fn publish(
        &self,
        topic: &str,
        message: &QueueMessage,
        headers: Vec<(String, String)>,
    ) -> Result<(), QueueError>;

    /// Flush and release client resources.
    async fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let message = QueueMessage {
            headers: vec![("X-Error-Reason".to_string(), b"decode_error".to_vec())],
            ..Default::default()
        };

        assert_eq!(message.header("x-error-reason"), Some(&b"decode_error"[..]));
        assert_eq!(message.header("x-missing"), None);
    }

    #[test]
    fn test_key_str() {
        let message = QueueMessage {
            key: Some(b"order-1".to_vec()),
            ..Default::default()
        };
        assert_eq!(message.key_str(), "order-1");
        assert_eq!(QueueMessage::default().key_str(), "");
    }
}
