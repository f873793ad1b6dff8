use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::{BorrowedMessage, Header, Headers, Message, OwnedHeaders},
    producer::{FutureProducer, FutureRecord, Producer},
    util::Timeout,
    Offset, TopicPartitionList,
};

use super::{MessageQueue, QueueError, QueueMessage};
use crate::config::KafkaConfig;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Kafka Publisher
// ============================================================================

pub struct KafkaPublisher {
    producer: FutureProducer,
}

impl KafkaPublisher {
    pub fn new(brokers: &str) -> Result<Self, QueueError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        payload: &[u8],
        headers: &[(String, Vec<u8>)],
    ) -> Result<(), QueueError> {
        let owned = headers.iter().fold(
            OwnedHeaders::new_with_capacity(headers.len()),
            |acc, (name, value)| {
                acc.insert(Header {
                    key: name.as_str(),
                    value: Some(value.as_slice()),
                })
            },
        );

        let mut record = FutureRecord::<[u8], [u8]>::to(topic)
            .payload(payload)
            .headers(owned);
        if let Some(key) = key {
            record = record.key(key);
        }

        self.producer
            .send(record, Timeout::After(SEND_TIMEOUT))
            .await
            .map_err(|(e, _)| QueueError::Kafka(e))?;

        tracing::debug!(topic = %topic, bytes = payload.len(), "Published to Kafka");
        Ok(())
    }

    pub fn flush(&self) {
        if let Err(e) = self.producer.flush(Timeout::After(SEND_TIMEOUT)) {
            tracing::warn!(error = %e, "Kafka producer flush failed");
        }
    }
}

// ============================================================================
// Kafka Queue - consumer group member with manual commits
// ============================================================================

pub struct KafkaQueue {
    consumer: StreamConsumer,
    publisher: KafkaPublisher,
}

impl KafkaQueue {
    pub fn new(config: &KafkaConfig) -> Result<Self, QueueError> {
        let brokers = config.brokers.join(",");

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "6000")
            .create()?;

        consumer.subscribe(&[config.topic.as_str()])?;

        tracing::info!(
            brokers = %brokers,
            topic = %config.topic,
            group_id = %config.group_id,
            "✅ Subscribed to Kafka topic"
        );

        Ok(Self {
            consumer,
            publisher: KafkaPublisher::new(&brokers)?,
        })
    }
}

fn detach(message: &BorrowedMessage<'_>) -> QueueMessage {
    let headers = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|h| (h.key.to_string(), h.value.map(<[u8]>::to_vec).unwrap_or_default()))
                .collect()
        })
        .unwrap_or_default();

    QueueMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(<[u8]>::to_vec),
        payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        headers,
    }
}

#[async_trait]
impl MessageQueue for KafkaQueue {
    async fn fetch(&self) -> Result<QueueMessage, QueueError> {
        let message = self.consumer.recv().await?;
        Ok(detach(&message))
    }

    async fn commit(&self, message: &QueueMessage) -> Result<(), QueueError> {
        // The committed offset is the next one to read.
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;
        self.consumer.commit(&offsets, CommitMode::Async)?;
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        message: &QueueMessage,
        headers: Vec<(String, String)>,
    ) -> Result<(), QueueError> {
        let headers: Vec<(String, Vec<u8>)> = headers
            .into_iter()
            .map(|(name, value)| (name, value.into_bytes()))
            .collect();

        self.publisher
            .publish(topic, message.key.as_deref(), &message.payload, &headers)
            .await
    }

    async fn shutdown(&self) {
        self.consumer.unsubscribe();
        self.publisher.flush();
        tracing::info!("Kafka consumer and producer shut down");
    }
}
