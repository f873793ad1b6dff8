use std::sync::Arc;

use crate::domain::order::Order;
use crate::storage::{OrderStore, StoreError};

pub mod lru;

pub use lru::LruCache;

// ============================================================================
// Order Cache
// ============================================================================
//
// Read-through cache shared by the ingestion pipeline (writer) and the HTTP
// read path (reader). Values are reference counted so a hit hands out the
// cached aggregate without copying it.
//
// ============================================================================

pub trait OrderCache: Send + Sync {
    fn get(&self, order_uid: &str) -> Option<Arc<Order>>;
    fn set(&self, order_uid: String, order: Arc<Order>);
}

impl OrderCache for LruCache<String, Arc<Order>> {
    fn get(&self, order_uid: &str) -> Option<Arc<Order>> {
        LruCache::get(self, order_uid)
    }

    fn set(&self, order_uid: String, order: Arc<Order>) {
        LruCache::set(self, order_uid, order)
    }
}

/// Load every stored order into the cache. Returns how many were loaded.
///
/// With more orders than capacity, the ones loaded last stay cached.
pub async fn warm_up(store: &dyn OrderStore, cache: &dyn OrderCache) -> Result<usize, StoreError> {
    tracing::info!("Warming up order cache from storage");

    let orders = store.get_all().await?;
    let count = orders.len();

    // get_all returns newest first; insert oldest first so the newest end up
    // most recently used.
    for order in orders.into_iter().rev() {
        cache.set(order.order_uid.clone(), Arc::new(order));
    }

    tracing::info!(count = count, "✅ Cache warm-up complete");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::fixtures::sample_order;
    use crate::storage::InMemoryOrderStore;

    #[tokio::test]
    async fn test_warm_up_loads_all_orders() {
        let store = InMemoryOrderStore::new();
        let uids = [
            "11111111-1111-4111-8111-111111111111",
            "22222222-2222-4222-8222-222222222222",
        ];
        for uid in uids {
            store.save(&sample_order(uid)).await.unwrap();
        }
        let cache: LruCache<String, Arc<Order>> = LruCache::new(10);

        let loaded = warm_up(&store, &cache).await.unwrap();

        assert_eq!(loaded, 2);
        for uid in uids {
            let cached = OrderCache::get(&cache, uid).unwrap();
            assert_eq!(cached.order_uid, uid);
        }
    }

    #[tokio::test]
    async fn test_warm_up_empty_store() {
        let store = InMemoryOrderStore::new();
        let cache: LruCache<String, Arc<Order>> = LruCache::new(10);

        assert_eq!(warm_up(&store, &cache).await.unwrap(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_warm_up_propagates_store_error() {
        let store = InMemoryOrderStore::new();
        store.close().await;
        let cache: LruCache<String, Arc<Order>> = LruCache::new(10);

        assert!(matches!(warm_up(&store, &cache).await, Err(StoreError::Closed)));
    }
}
