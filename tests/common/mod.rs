#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use order_ingest::cache::{LruCache, OrderCache};
use order_ingest::domain::order::Order;
use order_ingest::messaging::InMemoryQueue;
use order_ingest::metrics::Metrics;
use order_ingest::pipeline::{OrderConsumer, PipelineConfig};
use order_ingest::storage::{InMemoryOrderStore, OrderStore, StoreError};
use order_ingest::utils::RetryConfig;

pub const SOURCE_TOPIC: &str = "orders";
pub const DLQ_TOPIC: &str = "orders_dlq";

/// Wire payload of a valid order with the given uid.
pub fn order_json(order_uid: &str) -> serde_json::Value {
    serde_json::json!({
        "order_uid": order_uid,
        "track_number": "WBILMTESTTRACK",
        "entry": "WBIL",
        "delivery": {
            "name": "Test Testov",
            "phone": "+9720000000",
            "zip": "2639809",
            "city": "Kiryat Mozkin",
            "address": "Ploshad Mira 15",
            "region": "Kraiot",
            "email": "test@gmail.com"
        },
        "payment": {
            "transaction": order_uid,
            "request_id": "",
            "currency": "USD",
            "provider": "wbpay",
            "amount": 1817,
            "payment_dt": 1637907727,
            "bank": "alpha",
            "delivery_cost": 1500,
            "goods_total": 317,
            "custom_fee": 0
        },
        "items": [{
            "chrt_id": 9934930,
            "track_number": "WBILMTESTTRACK",
            "price": 453,
            "rid": "ab4219087a764ae0btest",
            "name": "Mascaras",
            "sale": 30,
            "size": "0",
            "total_price": 317,
            "nm_id": 2389212,
            "brand": "Vivienne Sabo",
            "status": 202
        }],
        "locale": "en",
        "internal_signature": "",
        "customer_id": "test",
        "delivery_service": "meest",
        "shardkey": "9",
        "sm_id": 99,
        "date_created": "2021-11-26T06:22:19Z",
        "oof_shard": "1"
    })
}

pub fn order_payload(order_uid: &str) -> Vec<u8> {
    serde_json::to_vec(&order_json(order_uid)).unwrap()
}

/// Store that fails the first `failures` saves with `error`, then delegates.
pub struct FlakyStore {
    inner: InMemoryOrderStore,
    failures: u32,
    error: fn() -> StoreError,
    saves: AtomicU32,
}

impl FlakyStore {
    pub fn failing(failures: u32, error: fn() -> StoreError) -> Self {
        Self {
            inner: InMemoryOrderStore::new(),
            failures,
            error,
            saves: AtomicU32::new(0),
        }
    }

    pub fn healthy() -> Self {
        Self::failing(0, unavailable)
    }

    pub fn always_failing() -> Self {
        Self::failing(u32::MAX, unavailable)
    }

    pub fn saves(&self) -> u32 {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> u32 {
        self.inner.read_calls()
    }
}

pub fn unavailable() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

pub fn constraint() -> StoreError {
    StoreError::Constraint("duplicate key value".to_string())
}

#[async_trait]
impl OrderStore for FlakyStore {
    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        let call = self.saves.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err((self.error)());
        }
        self.inner.save(order).await
    }

    async fn get_by_key(&self, order_uid: &str) -> Result<Order, StoreError> {
        self.inner.get_by_key(order_uid).await
    }

    async fn get_all(&self) -> Result<Vec<Order>, StoreError> {
        self.inner.get_all().await
    }

    async fn close(&self) {
        self.inner.close().await
    }
}

/// LRU cache that counts calls.
pub struct CountingCache {
    inner: LruCache<String, Arc<Order>>,
    gets: AtomicU32,
    sets: AtomicU32,
}

impl CountingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: LruCache::new(capacity),
            gets: AtomicU32::new(0),
            sets: AtomicU32::new(0),
        }
    }

    pub fn gets(&self) -> u32 {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> u32 {
        self.sets.load(Ordering::SeqCst)
    }
}

impl OrderCache for CountingCache {
    fn get(&self, order_uid: &str) -> Option<Arc<Order>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(order_uid)
    }

    fn set(&self, order_uid: String, order: Arc<Order>) {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(order_uid, order)
    }
}

pub struct Pipeline {
    pub queue: Arc<InMemoryQueue>,
    pub store: Arc<FlakyStore>,
    pub cache: Arc<CountingCache>,
    pub metrics: Arc<Metrics>,
    pub consumer: Arc<OrderConsumer>,
}

pub fn pipeline(store: FlakyStore, max_attempts: u32) -> Pipeline {
    pipeline_with_backoff(store, max_attempts, Duration::from_millis(5))
}

pub fn pipeline_with_backoff(store: FlakyStore, max_attempts: u32, backoff_unit: Duration) -> Pipeline {
    let queue = Arc::new(InMemoryQueue::new(SOURCE_TOPIC));
    let store = Arc::new(store);
    let cache = Arc::new(CountingCache::new(16));
    let metrics = Arc::new(Metrics::new().unwrap());

    let config = PipelineConfig {
        dlq_topic: DLQ_TOPIC.to_string(),
        retry: RetryConfig::new(max_attempts, backoff_unit),
        fetch_retry_delay: Duration::from_millis(5),
    };
    let consumer = Arc::new(OrderConsumer::new(
        queue.clone(),
        store.clone(),
        cache.clone(),
        config,
        metrics.clone(),
    ));

    Pipeline {
        queue,
        store,
        cache,
        metrics,
        consumer,
    }
}
