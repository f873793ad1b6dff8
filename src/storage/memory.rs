use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{OrderStore, StoreError};
use crate::domain::order::{Delivery, Item, Order, Payment};

// ============================================================================
// In-Memory Order Store
// ============================================================================
//
// Same four-table layout as the relational store, kept in process. A save
// stages its writes on a copy of the tables and swaps the copy in only once
// every insert has succeeded, so a failed save is invisible to readers.
//
// Used by tests and demos that need no database.
//
// ============================================================================

#[derive(Clone)]
struct OrderRecord {
    order: Order,
    delivery_id: i64,
    payment_id: i64,
    seq: u64,
}

#[derive(Clone, Default)]
struct Tables {
    next_id: i64,
    next_seq: u64,
    deliveries: HashMap<i64, Delivery>,
    payments: HashMap<i64, Payment>,
    orders: HashMap<String, OrderRecord>,
    items: Vec<(String, Item)>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn assemble(&self, record: &OrderRecord) -> Result<Order, StoreError> {
        let uid = &record.order.order_uid;
        let delivery = self
            .deliveries
            .get(&record.delivery_id)
            .cloned()
            .ok_or_else(|| StoreError::Corrupt(format!("{}: delivery row missing", uid)))?;
        let payment = self
            .payments
            .get(&record.payment_id)
            .cloned()
            .ok_or_else(|| StoreError::Corrupt(format!("{}: payment row missing", uid)))?;

        Ok(Order {
            delivery,
            payment,
            items: self
                .items
                .iter()
                .filter(|(owner, _)| owner == uid)
                .map(|(_, item)| item.clone())
                .collect(),
            ..record.order.clone()
        })
    }
}

pub struct InMemoryOrderStore {
    tables: Mutex<Tables>,
    item_insert_budget: Mutex<Option<usize>>,
    closed: AtomicBool,
    save_calls: AtomicU32,
    read_calls: AtomicU32,
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            item_insert_budget: Mutex::new(None),
            closed: AtomicBool::new(false),
            save_calls: AtomicU32::new(0),
            read_calls: AtomicU32::new(0),
        }
    }

    /// Make every later save fail once it has inserted `n` item rows.
    pub fn fail_item_inserts_after(&self, n: usize) {
        *self.budget() = Some(n);
    }

    pub fn clear_faults(&self) {
        *self.budget() = None;
    }

    pub fn save_calls(&self) -> u32 {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> u32 {
        self.read_calls.load(Ordering::SeqCst)
    }

    /// Number of order rows, ignoring children.
    pub fn len(&self) -> usize {
        self.tables().orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn budget(&self) -> MutexGuard<'_, Option<usize>> {
        self.item_insert_budget
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;

        let budget = *self.budget();
        let mut tables = self.tables();
        let mut staged = tables.clone();

        if let Some(previous) = staged.orders.remove(&order.order_uid) {
            staged.deliveries.remove(&previous.delivery_id);
            staged.payments.remove(&previous.payment_id);
            staged.items.retain(|(owner, _)| owner != &order.order_uid);
        }

        let delivery_id = staged.next_id();
        staged.deliveries.insert(delivery_id, order.delivery.clone());

        let payment_id = staged.next_id();
        staged.payments.insert(payment_id, order.payment.clone());

        staged.next_seq += 1;
        let seq = staged.next_seq;
        staged.orders.insert(
            order.order_uid.clone(),
            OrderRecord {
                order: Order {
                    items: Vec::new(),
                    ..order.clone()
                },
                delivery_id,
                payment_id,
                seq,
            },
        );

        for (inserted, item) in order.items.iter().enumerate() {
            if budget.is_some_and(|limit| inserted >= limit) {
                // `staged` is dropped; the live tables never saw this save.
                return Err(StoreError::Backend(format!(
                    "item insert {} failed for order {}",
                    inserted, order.order_uid
                )));
            }
            staged.items.push((order.order_uid.clone(), item.clone()));
        }

        *tables = staged;
        Ok(())
    }

    async fn get_by_key(&self, order_uid: &str) -> Result<Order, StoreError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;

        let tables = self.tables();
        let record = tables
            .orders
            .get(order_uid)
            .ok_or_else(|| StoreError::NotFound(order_uid.to_string()))?;
        tables.assemble(record)
    }

    async fn get_all(&self) -> Result<Vec<Order>, StoreError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;

        let tables = self.tables();
        let mut records: Vec<&OrderRecord> = tables.orders.values().collect();
        // Newest first, like the relational scan.
        records.sort_by_key(|record| std::cmp::Reverse(record.seq));
        records
            .into_iter()
            .map(|record| tables.assemble(record))
            .collect()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::fixtures::sample_order;

    const UID: &str = "b563feb7-b2b8-4b6e-9f2a-3c1d5e7f9a0b";

    fn with_items(uid: &str, count: usize) -> Order {
        let mut order = sample_order(uid);
        let template = order.items[0].clone();
        order.items = (0..count)
            .map(|i| Item {
                chrt_id: template.chrt_id + i as i64,
                ..template.clone()
            })
            .collect();
        order
    }

    #[tokio::test]
    async fn test_save_then_get_by_key() {
        let store = InMemoryOrderStore::new();
        let order = with_items(UID, 3);

        store.save(&order).await.unwrap();

        assert_eq!(store.get_by_key(UID).await.unwrap(), order);
    }

    #[tokio::test]
    async fn test_get_by_key_missing_is_not_found() {
        let store = InMemoryOrderStore::new();
        let err = store.get_by_key(UID).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_item_insert_leaves_nothing_behind() {
        let store = InMemoryOrderStore::new();
        store.fail_item_inserts_after(1);

        let result = store.save(&with_items(UID, 3)).await;

        assert!(result.is_err());
        assert!(matches!(store.get_by_key(UID).await, Err(StoreError::NotFound(_))));
        assert!(store.get_all().await.unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failed_upsert_keeps_previous_version() {
        let store = InMemoryOrderStore::new();
        let original = with_items(UID, 1);
        store.save(&original).await.unwrap();

        store.fail_item_inserts_after(0);
        assert!(store.save(&with_items(UID, 2)).await.is_err());

        assert_eq!(store.get_by_key(UID).await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_save_same_uid_replaces_order() {
        let store = InMemoryOrderStore::new();
        store.save(&with_items(UID, 3)).await.unwrap();

        let mut replacement = with_items(UID, 1);
        replacement.track_number = "REPLACED".to_string();
        store.save(&replacement).await.unwrap();

        let stored = store.get_by_key(UID).await.unwrap();
        assert_eq!(stored, replacement);
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_all_returns_each_order_once_with_all_items() {
        let store = InMemoryOrderStore::new();
        let first = with_items("11111111-1111-4111-8111-111111111111", 2);
        let second = with_items("22222222-2222-4222-8222-222222222222", 3);
        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();

        let all = store.get_all().await.unwrap();

        assert_eq!(all, vec![second, first]);
    }

    #[tokio::test]
    async fn test_closed_store_rejects_calls() {
        let store = InMemoryOrderStore::new();
        store.close().await;
        store.close().await;

        assert!(matches!(store.save(&with_items(UID, 1)).await, Err(StoreError::Closed)));
        assert!(matches!(store.get_all().await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn test_call_counters() {
        let store = InMemoryOrderStore::new();
        let _ = store.save(&with_items(UID, 1)).await;
        let _ = store.get_by_key(UID).await;
        let _ = store.get_all().await;

        assert_eq!(store.save_calls(), 1);
        assert_eq!(store.read_calls(), 2);
    }
}
