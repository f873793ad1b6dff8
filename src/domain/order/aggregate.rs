use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::errors::DecodeError;
use super::validation::{validate_created_at, validate_order_uid};
use super::value_objects::{Delivery, Item, Payment};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// The order together with its delivery, payment and items. It is the unit of
// transfer everywhere: queue payload, cache value, row-set and HTTP body.
// Nothing mutates an Order after it has been decoded.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct Order {
    #[validate(custom(function = "validate_order_uid"))]
    pub order_uid: String,
    #[validate(length(min = 1))]
    pub track_number: String,
    #[validate(length(min = 1))]
    pub entry: String,
    #[validate(nested)]
    pub delivery: Delivery,
    #[validate(nested)]
    pub payment: Payment,
    #[validate(length(min = 1), nested)]
    pub items: Vec<Item>,
    #[validate(length(equal = 2))]
    pub locale: String,
    pub internal_signature: String,
    #[validate(length(min = 1))]
    pub customer_id: String,
    #[validate(length(min = 1))]
    pub delivery_service: String,
    pub shardkey: String,
    #[validate(range(min = 0))]
    pub sm_id: i64,
    #[validate(custom(function = "validate_created_at"))]
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

impl Order {
    /// Decode a queue payload. The result owns all of its data, so it never
    /// aliases the message buffer it came from.
    pub fn from_payload(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::EmptyPayload);
        }
        Ok(serde_json::from_slice(payload)?)
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
