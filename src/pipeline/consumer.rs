use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::dlq::{DeadLetterPublisher, DeadLetterReason};
use crate::cache::OrderCache;
use crate::domain::order::{validate_order, Order};
use crate::messaging::{MessageQueue, QueueError, QueueMessage};
use crate::metrics::Metrics;
use crate::storage::OrderStore;
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};

const SAVE_OPERATION: &str = "save_order";

// ============================================================================
// Order Consumer - queue → decode → validate → persist → cache → commit
// ============================================================================
//
// Every fetched message ends in exactly one terminal outcome and is committed
// afterwards:
//
//   decode fails         → dead letter (decode_error)     → commit
//   validation fails     → dead letter (validation_error) → commit
//   save retries exhaust → dead letter (db_save_error)    → commit
//   save succeeds        → cache set                      → commit
//
// Saves are retried in place with linear backoff, so nothing is committed
// while a save is still pending. Errors that retrying cannot fix (constraint
// violations) end the retries early.
//
// Messages are processed strictly one at a time, in fetch order.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub dlq_topic: String,
    pub retry: RetryConfig,
    /// Pause after a failed fetch before trying again
    pub fetch_retry_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dlq_topic: "orders_dlq".to_string(),
            retry: RetryConfig::default(),
            fetch_retry_delay: Duration::from_secs(1),
        }
    }
}

/// Terminal outcome of one message. Every variant is safe to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Persisted {
        order_uid: String,
        attempts: u32,
    },
    DeadLettered {
        reason: DeadLetterReason,
        /// false when the dead-letter publish itself failed
        published: bool,
    },
}

impl ProcessOutcome {
    pub fn status_label(&self) -> &'static str {
        match self {
            ProcessOutcome::Persisted { .. } => "success",
            ProcessOutcome::DeadLettered { reason, .. } => reason.status_label(),
        }
    }
}

pub struct OrderConsumer {
    queue: Arc<dyn MessageQueue>,
    store: Arc<dyn OrderStore>,
    cache: Arc<dyn OrderCache>,
    dead_letters: DeadLetterPublisher,
    retry: RetryConfig,
    fetch_retry_delay: Duration,
    metrics: Arc<Metrics>,
}

impl OrderConsumer {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        store: Arc<dyn OrderStore>,
        cache: Arc<dyn OrderCache>,
        config: PipelineConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        let dead_letters = DeadLetterPublisher::new(queue.clone(), config.dlq_topic, metrics.clone());

        Self {
            queue,
            store,
            cache,
            dead_letters,
            retry: config.retry,
            fetch_retry_delay: config.fetch_retry_delay,
            metrics,
        }
    }

    /// Consume until `shutdown` is cancelled or the queue closes.
    ///
    /// A message that was already fetched is processed and committed before
    /// the loop exits.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(dlq_topic = %self.dead_letters.topic(), "🚀 Order consumer started");

        loop {
            let fetched = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = self.queue.fetch() => result,
            };

            match fetched {
                Ok(message) => self.handle(&message).await,
                Err(QueueError::Closed) => {
                    tracing::info!("Queue closed, consumer exiting");
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        retry_in_ms = self.fetch_retry_delay.as_millis() as u64,
                        "Failed to fetch message"
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.fetch_retry_delay) => {}
                    }
                }
            }
        }

        tracing::info!("Order consumer stopped");
    }

    async fn handle(&self, message: &QueueMessage) {
        let outcome = self.process_message(message).await;

        tracing::debug!(
            partition = message.partition,
            offset = message.offset,
            status = outcome.status_label(),
            "Message reached terminal outcome"
        );

        if let Err(e) = self.queue.commit(message).await {
            // Not fatal: the message is redelivered and the upsert absorbs it.
            tracing::error!(
                error = %e,
                partition = message.partition,
                offset = message.offset,
                "Failed to commit message"
            );
        }
    }

    /// Drive one message to its terminal outcome. Does not commit.
    pub async fn process_message(&self, message: &QueueMessage) -> ProcessOutcome {
        let started = Instant::now();
        let outcome = self.process(message).await;
        self.metrics
            .record_message_processed(outcome.status_label(), started.elapsed().as_secs_f64());
        outcome
    }

    async fn process(&self, message: &QueueMessage) -> ProcessOutcome {
        let order = match Order::from_payload(&message.payload) {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(
                    key = %message.key_str(),
                    offset = message.offset,
                    error = %e,
                    "Undecodable message"
                );
                return self
                    .dead_letter(message, DeadLetterReason::Decode, &e.to_string())
                    .await;
            }
        };

        if let Err(rejected) = validate_order(&order) {
            tracing::warn!(
                order_uid = %order.order_uid,
                offset = message.offset,
                violations = rejected.violations.len(),
                error = %rejected,
                "Order failed validation"
            );
            return self
                .dead_letter(message, DeadLetterReason::Validation, &rejected.to_string())
                .await;
        }

        let store = &self.store;
        let metrics = &self.metrics;
        let order_ref = &order;
        let result = retry_on_transient(&self.retry, |attempt| async move {
            let saved = store.save(order_ref).await;
            if let Err(e) = &saved {
                metrics.record_db_error(SAVE_OPERATION);
                metrics.record_retry_attempt(SAVE_OPERATION, attempt);
                tracing::warn!(
                    order_uid = %order_ref.order_uid,
                    attempt = attempt,
                    kind = e.kind(),
                    error = %e,
                    "Failed to save order"
                );
            }
            saved
        })
        .await;

        match result {
            RetryResult::Success { attempts, .. } => {
                if attempts > 1 {
                    self.metrics.record_retry_outcome(SAVE_OPERATION, true);
                }

                let order_uid = order.order_uid.clone();
                self.cache.set(order_uid.clone(), Arc::new(order));

                tracing::info!(order_uid = %order_uid, attempts = attempts, "✅ Order persisted and cached");
                ProcessOutcome::Persisted { order_uid, attempts }
            }
            RetryResult::Failed { error, attempts } | RetryResult::PermanentFailure { error, attempts } => {
                self.metrics.record_retry_outcome(SAVE_OPERATION, false);
                tracing::error!(
                    order_uid = %order.order_uid,
                    attempts = attempts,
                    error = %error,
                    "❌ Giving up on saving order"
                );
                let details = format!("after {} attempt(s): {}", attempts, error);
                self.dead_letter(message, DeadLetterReason::DbSave, &details).await
            }
        }
    }

    async fn dead_letter(&self, message: &QueueMessage, reason: DeadLetterReason, details: &str) -> ProcessOutcome {
        let published = self.dead_letters.publish(message, reason, details).await;
        ProcessOutcome::DeadLettered { reason, published }
    }
}
