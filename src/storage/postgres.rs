use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use super::{OrderStore, StoreError};
use crate::config::PostgresConfig;
use crate::domain::order::{Delivery, Item, Order, Payment};

// ============================================================================
// PostgreSQL Order Store
// ============================================================================
//
// Reads use one joined query (orders ⋈ deliveries ⋈ payments ⟕ items) and
// fold the flat rows back into aggregates client-side. Rows of one order may
// arrive interleaved with other orders; grouping is by order_uid and items
// keep scan order.
//
// ============================================================================

const SELECT_ORDERS: &str = r#"
    SELECT
        o.order_uid, o.track_number, o.entry, o.locale, o.internal_signature,
        o.customer_id, o.delivery_service, o.shardkey, o.sm_id, o.date_created,
        o.oof_shard,
        d.name AS delivery_name, d.phone AS delivery_phone, d.zip AS delivery_zip,
        d.city AS delivery_city, d.address AS delivery_address,
        d.region AS delivery_region, d.email AS delivery_email,
        p.transaction AS payment_transaction, p.request_id AS payment_request_id,
        p.currency AS payment_currency, p.provider AS payment_provider,
        p.amount AS payment_amount, p.payment_dt AS payment_dt,
        p.bank AS payment_bank, p.delivery_cost AS payment_delivery_cost,
        p.goods_total AS payment_goods_total, p.custom_fee AS payment_custom_fee,
        i.id AS item_id, i.chrt_id AS item_chrt_id,
        i.track_number AS item_track_number, i.price AS item_price,
        i.rid AS item_rid, i.name AS item_name, i.sale AS item_sale,
        i.size AS item_size, i.total_price AS item_total_price,
        i.nm_id AS item_nm_id, i.brand AS item_brand, i.status AS item_status
    FROM orders o
    JOIN deliveries d ON o.delivery_id = d.id
    JOIN payments p ON o.payment_id = p.id
    LEFT JOIN items i ON o.order_uid = i.order_uid
"#;

pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Connect the pool and, when enabled, apply pending migrations.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.url)
            .await?;

        if config.run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| StoreError::Backend(format!("migration failed: {}", e)))?;
            tracing::info!("Database migrations applied");
        }

        tracing::info!(
            max_connections = config.max_connections,
            "✅ Connected to PostgreSQL"
        );

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<(), StoreError> {
        // Replace any previous version of this order.
        let previous: Option<(i64, i64)> = sqlx::query_as(
            "DELETE FROM orders WHERE order_uid = $1 RETURNING delivery_id, payment_id",
        )
        .bind(&order.order_uid)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some((delivery_id, payment_id)) = previous {
            tracing::debug!(order_uid = %order.order_uid, "Replacing existing order");
            sqlx::query("DELETE FROM deliveries WHERE id = $1")
                .bind(delivery_id)
                .execute(&mut **tx)
                .await?;
            sqlx::query("DELETE FROM payments WHERE id = $1")
                .bind(payment_id)
                .execute(&mut **tx)
                .await?;
        }

        let d = &order.delivery;
        let delivery_id: i64 = sqlx::query_scalar(
            "INSERT INTO deliveries (name, phone, zip, city, address, region, email)
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(&d.name)
        .bind(&d.phone)
        .bind(&d.zip)
        .bind(&d.city)
        .bind(&d.address)
        .bind(&d.region)
        .bind(&d.email)
        .fetch_one(&mut **tx)
        .await?;

        let p = &order.payment;
        let payment_id: i64 = sqlx::query_scalar(
            "INSERT INTO payments (transaction, request_id, currency, provider, amount,
                                   payment_dt, bank, delivery_cost, goods_total, custom_fee)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING id",
        )
        .bind(&p.transaction)
        .bind(&p.request_id)
        .bind(&p.currency)
        .bind(&p.provider)
        .bind(p.amount)
        .bind(p.payment_dt)
        .bind(&p.bank)
        .bind(p.delivery_cost)
        .bind(p.goods_total)
        .bind(p.custom_fee)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query(
            "INSERT INTO orders (order_uid, track_number, entry, delivery_id, payment_id, locale,
                                 internal_signature, customer_id, delivery_service, shardkey,
                                 sm_id, date_created, oof_shard)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(delivery_id)
        .bind(payment_id)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .execute(&mut **tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO items (order_uid, chrt_id, track_number, price, rid, name, sale,
                                    size, total_price, nm_id, brand, status)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(&order.order_uid)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        if let Err(error) = Self::write(&mut tx, order).await {
            if let Err(rollback_error) = tx.rollback().await {
                tracing::warn!(
                    order_uid = %order.order_uid,
                    error = %rollback_error,
                    "Rollback failed after save error"
                );
            }
            return Err(error);
        }

        tx.commit().await?;

        tracing::debug!(
            order_uid = %order.order_uid,
            items = order.items.len(),
            "Order saved"
        );
        Ok(())
    }

    async fn get_by_key(&self, order_uid: &str) -> Result<Order, StoreError> {
        let query = format!("{} WHERE o.order_uid = $1 ORDER BY i.id", SELECT_ORDERS);
        let rows: Vec<OrderRow> = sqlx::query_as(query.as_str())
            .bind(order_uid)
            .fetch_all(&self.pool)
            .await?;

        let mut grouper = OrderGrouper::default();
        for row in rows {
            grouper.push(row);
        }

        grouper
            .finish()
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(order_uid.to_string()))
    }

    async fn get_all(&self) -> Result<Vec<Order>, StoreError> {
        let query = format!("{} ORDER BY o.date_created DESC, i.id", SELECT_ORDERS);
        let mut rows = sqlx::query_as::<_, OrderRow>(query.as_str()).fetch(&self.pool);

        let mut grouper = OrderGrouper::default();
        while let Some(row) = rows.try_next().await? {
            grouper.push(row);
        }

        let orders = grouper.finish();
        tracing::debug!(count = orders.len(), "Loaded all orders");
        Ok(orders)
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            tracing::info!("PostgreSQL pool closed");
        }
    }
}

// ============================================================================
// Row Assembly
// ============================================================================

/// One row of the joined scan. Item columns are NULL for an order whose
/// items are missing.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct OrderRow {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i64,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,

    pub delivery_name: String,
    pub delivery_phone: String,
    pub delivery_zip: String,
    pub delivery_city: String,
    pub delivery_address: String,
    pub delivery_region: String,
    pub delivery_email: String,

    pub payment_transaction: String,
    pub payment_request_id: String,
    pub payment_currency: String,
    pub payment_provider: String,
    pub payment_amount: i64,
    pub payment_dt: i64,
    pub payment_bank: String,
    pub payment_delivery_cost: i64,
    pub payment_goods_total: i64,
    pub payment_custom_fee: i64,

    pub item_id: Option<i64>,
    pub item_chrt_id: Option<i64>,
    pub item_track_number: Option<String>,
    pub item_price: Option<i64>,
    pub item_rid: Option<String>,
    pub item_name: Option<String>,
    pub item_sale: Option<i64>,
    pub item_size: Option<String>,
    pub item_total_price: Option<i64>,
    pub item_nm_id: Option<i64>,
    pub item_brand: Option<String>,
    pub item_status: Option<i64>,
}

impl OrderRow {
    fn item(&self) -> Option<Item> {
        self.item_id?;
        Some(Item {
            chrt_id: self.item_chrt_id.unwrap_or_default(),
            track_number: self.item_track_number.clone().unwrap_or_default(),
            price: self.item_price.unwrap_or_default(),
            rid: self.item_rid.clone().unwrap_or_default(),
            name: self.item_name.clone().unwrap_or_default(),
            sale: self.item_sale.unwrap_or_default(),
            size: self.item_size.clone().unwrap_or_default(),
            total_price: self.item_total_price.unwrap_or_default(),
            nm_id: self.item_nm_id.unwrap_or_default(),
            brand: self.item_brand.clone().unwrap_or_default(),
            status: self.item_status.unwrap_or_default(),
        })
    }

    fn into_order(self) -> Order {
        Order {
            order_uid: self.order_uid,
            track_number: self.track_number,
            entry: self.entry,
            delivery: Delivery {
                name: self.delivery_name,
                phone: self.delivery_phone,
                zip: self.delivery_zip,
                city: self.delivery_city,
                address: self.delivery_address,
                region: self.delivery_region,
                email: self.delivery_email,
            },
            payment: Payment {
                transaction: self.payment_transaction,
                request_id: self.payment_request_id,
                currency: self.payment_currency,
                provider: self.payment_provider,
                amount: self.payment_amount,
                payment_dt: self.payment_dt,
                bank: self.payment_bank,
                delivery_cost: self.payment_delivery_cost,
                goods_total: self.payment_goods_total,
                custom_fee: self.payment_custom_fee,
            },
            items: Vec::new(),
            locale: self.locale,
            internal_signature: self.internal_signature,
            customer_id: self.customer_id,
            delivery_service: self.delivery_service,
            shardkey: self.shardkey,
            sm_id: self.sm_id,
            date_created: self.date_created,
            oof_shard: self.oof_shard,
        }
    }
}

/// Folds joined rows into aggregates, first-seen order preserved.
#[derive(Default)]
pub(crate) struct OrderGrouper {
    orders: Vec<Order>,
    positions: HashMap<String, usize>,
}

impl OrderGrouper {
    pub fn push(&mut self, row: OrderRow) {
        let item = row.item();

        let position = match self.positions.get(&row.order_uid) {
            Some(&position) => position,
            None => {
                let position = self.orders.len();
                self.positions.insert(row.order_uid.clone(), position);
                self.orders.push(row.into_order());
                position
            }
        };

        if let Some(item) = item {
            self.orders[position].items.push(item);
        }
    }

    pub fn finish(self) -> Vec<Order> {
        self.orders
    }
}
