use std::time::Duration;

use anyhow::Context;

use order_ingest::config::{parse_or, Config};
use order_ingest::generator;
use order_ingest::logging;
use order_ingest::messaging::KafkaPublisher;

// ============================================================================
// Demo Producer - publishes a random valid order every interval until Ctrl-C
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("info,order_ingest=debug,producer=debug");

    let config = Config::from_env();
    let interval_ms: u64 = parse_or(&|key: &str| std::env::var(key).ok(), "PRODUCER_INTERVAL_MS", 3000);
    let brokers = config.kafka.brokers.join(",");
    let publisher = KafkaPublisher::new(&brokers).context("failed to create Kafka producer")?;

    tracing::info!(
        brokers = %brokers,
        topic = %config.kafka.topic,
        interval_ms = interval_ms,
        "🚀 Producer started, press Ctrl-C to stop"
    );

    let topic = config.kafka.topic.as_str();
    let publisher = &publisher;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    let published = generator::publish_until(Duration::from_millis(interval_ms), shutdown, |order| async move {
        let payload = match order.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize order");
                return;
            }
        };

        match publisher
            .publish(topic, Some(order.order_uid.as_bytes()), &payload, &[])
            .await
        {
            Ok(()) => tracing::info!(order_uid = %order.order_uid, items = order.items.len(), "📤 Order published"),
            Err(e) => tracing::error!(order_uid = %order.order_uid, error = %e, "Failed to publish order"),
        }
    })
    .await;

    publisher.flush();
    tracing::info!(published = published, "Producer stopped");
    Ok(())
}
