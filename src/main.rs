use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use order_ingest::api::{self, AppState};
use order_ingest::cache::{self, LruCache, OrderCache};
use order_ingest::config::Config;
use order_ingest::domain::order::Order;
use order_ingest::logging;
use order_ingest::messaging::{KafkaQueue, MessageQueue};
use order_ingest::metrics::Metrics;
use order_ingest::pipeline::OrderConsumer;
use order_ingest::storage::{OrderStore, PostgresOrderStore};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO, with debug for this crate; RUST_LOG overrides.
    logging::init("info,order_ingest=debug");

    tracing::info!("🚀 Starting order ingestion service");

    // === 1. Configuration ===
    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    tracing::info!(
        http_port = config.http.port,
        topic = %config.kafka.topic,
        dlq_topic = %config.kafka.dlq_topic,
        cache_capacity = config.cache.capacity,
        max_attempts = config.retry.max_attempts,
        "Configuration loaded"
    );

    // === 2. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 3. Storage ===
    let store: Arc<dyn OrderStore> = Arc::new(
        PostgresOrderStore::connect(&config.postgres)
            .await
            .context("failed to connect to PostgreSQL")?,
    );

    // === 4. Cache, warmed from storage ===
    let cache: Arc<dyn OrderCache> =
        Arc::new(LruCache::<String, Arc<Order>>::new(config.cache.capacity).with_metrics(metrics.clone()));
    cache::warm_up(store.as_ref(), cache.as_ref())
        .await
        .context("cache warm-up failed")?;

    // === 5. Kafka ===
    let queue: Arc<dyn MessageQueue> =
        Arc::new(KafkaQueue::new(&config.kafka).context("failed to create Kafka client")?);

    // === 6. Ingestion pipeline ===
    let shutdown = CancellationToken::new();
    let consumer = OrderConsumer::new(
        queue.clone(),
        store.clone(),
        cache.clone(),
        config.pipeline_config(),
        metrics.clone(),
    );
    let consumer_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { consumer.run(shutdown).await })
    };

    // === 7. HTTP read path (returns on SIGINT/SIGTERM) ===
    let state = AppState {
        store: store.clone(),
        cache: cache.clone(),
        metrics: metrics.clone(),
    };
    let server_result = api::build_server(state, config.http.port)?.await;

    // === 8. Shutdown ===
    tracing::info!("Shutting down");
    shutdown.cancel();
    if let Err(e) = consumer_task.await {
        tracing::error!(error = %e, "Consumer task panicked");
    }
    queue.shutdown().await;
    store.close().await;

    server_result.context("HTTP server error")?;
    tracing::info!("🎉 Service stopped cleanly");
    Ok(())
}
