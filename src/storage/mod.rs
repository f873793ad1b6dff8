use async_trait::async_trait;

use crate::domain::order::Order;
use crate::utils::IsTransient;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;

// ============================================================================
// Order Store
// ============================================================================
//
// Durable home of orders. An order is spread over four tables (orders,
// deliveries, payments, items) and `save` writes all of them in a single
// transaction: a failed save leaves nothing behind.
//
// Saving an order_uid that already exists replaces the previous version.
//
// ============================================================================

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist the order and all of its children atomically.
    async fn save(&self, order: &Order) -> Result<(), StoreError>;

    /// Full order with delivery, payment and every item.
    async fn get_by_key(&self, order_uid: &str) -> Result<Order, StoreError>;

    /// Every stored order, each appearing exactly once with all of its items.
    async fn get_all(&self) -> Result<Vec<Order>, StoreError>;

    /// Release connections. Later calls fail with `StoreError::Closed`.
    async fn close(&self);
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("order not found: {0}")]
    NotFound(String),

    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("stored order is corrupt: {0}")]
    Corrupt(String),

    #[error("store is closed")]
    Closed,

    #[error("database error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::Unavailable(_) => "unavailable",
            StoreError::Constraint(_) => "constraint",
            StoreError::Corrupt(_) => "corrupt",
            StoreError::Closed => "closed",
            StoreError::Backend(_) => "backend",
        }
    }
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Backend(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => StoreError::NotFound(error.to_string()),
            sqlx::Error::PoolClosed => StoreError::Closed,
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                StoreError::Unavailable(error.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Corrupt(error.to_string())
            }
            sqlx::Error::Database(db) => {
                if db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation() {
                    return StoreError::Constraint(db.message().to_string());
                }
                match db.code().as_deref() {
                    // connection exceptions, transaction rollbacks, operator intervention
                    Some(code) if code.starts_with("08") || code.starts_with("40") || code.starts_with("57P") => {
                        StoreError::Unavailable(db.message().to_string())
                    }
                    // data exceptions and remaining integrity violations
                    Some(code) if code.starts_with("22") || code.starts_with("23") => {
                        StoreError::Constraint(db.message().to_string())
                    }
                    _ => StoreError::Backend(db.message().to_string()),
                }
            }
            _ => StoreError::Backend(error.to_string()),
        }
    }
}
