use std::fmt;
use std::sync::Arc;

use crate::messaging::{MessageQueue, QueueMessage};
use crate::metrics::Metrics;

// ============================================================================
// Dead Letter Publisher
// ============================================================================
//
// Messages that can never be persisted are republished verbatim (key and
// payload untouched) to the dead-letter topic with three diagnostic headers:
// - x-original-topic: where the message was consumed from
// - x-error-reason:   decode_error | validation_error | db_save_error
// - x-error-details:  human readable cause
//
// A failed publish is logged as critical and counted. The caller commits the
// source message regardless.
//
// ============================================================================

pub const HEADER_ORIGINAL_TOPIC: &str = "x-original-topic";
pub const HEADER_ERROR_REASON: &str = "x-error-reason";
pub const HEADER_ERROR_DETAILS: &str = "x-error-details";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeadLetterReason {
    Decode,
    Validation,
    DbSave,
}

impl DeadLetterReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadLetterReason::Decode => "decode_error",
            DeadLetterReason::Validation => "validation_error",
            DeadLetterReason::DbSave => "db_save_error",
        }
    }

    /// Label for `kafka_messages_processed_total{status}`.
    pub fn status_label(&self) -> &'static str {
        match self {
            DeadLetterReason::Decode => "dlq_decode",
            DeadLetterReason::Validation => "dlq_validation",
            DeadLetterReason::DbSave => "dlq_db_error",
        }
    }
}

impl fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct DeadLetterPublisher {
    queue: Arc<dyn MessageQueue>,
    topic: String,
    metrics: Arc<Metrics>,
}

impl DeadLetterPublisher {
    pub fn new(queue: Arc<dyn MessageQueue>, topic: impl Into<String>, metrics: Arc<Metrics>) -> Self {
        Self {
            queue,
            topic: topic.into(),
            metrics,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns whether the dead letter reached the topic.
    pub async fn publish(&self, message: &QueueMessage, reason: DeadLetterReason, details: &str) -> bool {
        let headers = vec![
            (HEADER_ORIGINAL_TOPIC.to_string(), message.topic.clone()),
            (HEADER_ERROR_REASON.to_string(), reason.as_str().to_string()),
            (HEADER_ERROR_DETAILS.to_string(), details.to_string()),
        ];

        match self.queue.publish(&self.topic, message, headers).await {
            Ok(()) => {
                self.metrics.record_dlq_message(reason.as_str());
                tracing::warn!(
                    key = %message.key_str(),
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    reason = %reason,
                    details = %details,
                    "💀 Message sent to dead-letter topic"
                );
                true
            }
            Err(e) => {
                self.metrics.record_dlq_publish_failure();
                tracing::error!(
                    key = %message.key_str(),
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    reason = %reason,
                    error = %e,
                    "CRITICAL: failed to publish to dead-letter topic, message will be committed anyway"
                );
                false
            }
        }
    }
}
