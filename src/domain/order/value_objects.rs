use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validation::{validate_currency, validate_e164_phone, validate_non_zero};

// ============================================================================
// Order Value Objects
// ============================================================================
//
// Sub-records owned by an Order. They have no identity or lifecycle of their
// own: they travel, persist and get cached only as part of the aggregate.
//
// Missing fields decode to their empty value so that the validator, not the
// JSON decoder, reports which fields are absent.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct Delivery {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(custom(function = "validate_e164_phone"))]
    pub phone: String,
    #[validate(length(min = 1))]
    pub zip: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub address: String,
    #[validate(length(min = 1))]
    pub region: String,
    #[validate(email)]
    pub email: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct Payment {
    /// Equals the order key by convention; nothing enforces it.
    #[validate(length(min = 1))]
    pub transaction: String,
    pub request_id: String,
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
    #[validate(length(min = 1))]
    pub provider: String,
    #[validate(range(min = 0))]
    pub amount: i64,
    /// Epoch seconds.
    #[validate(custom(function = "validate_non_zero"))]
    pub payment_dt: i64,
    #[validate(length(min = 1))]
    pub bank: String,
    #[validate(range(min = 0))]
    pub delivery_cost: i64,
    #[validate(range(min = 0))]
    pub goods_total: i64,
    #[validate(range(min = 0))]
    pub custom_fee: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct Item {
    #[validate(custom(function = "validate_non_zero"))]
    pub chrt_id: i64,
    #[validate(length(min = 1))]
    pub track_number: String,
    #[validate(range(min = 1))]
    pub price: i64,
    #[validate(length(min = 1))]
    pub rid: String,
    #[validate(length(min = 1))]
    pub name: String,
    /// Discount percent.
    #[validate(range(min = 0, max = 100))]
    pub sale: i64,
    pub size: String,
    #[validate(range(min = 0))]
    pub total_price: i64,
    #[validate(custom(function = "validate_non_zero"))]
    pub nm_id: i64,
    #[validate(length(min = 1))]
    pub brand: String,
    #[validate(range(min = 0))]
    pub status: i64,
}

// ============================================================================
// Unit Tests
// ============================================================================
