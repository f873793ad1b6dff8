// ============================================================================
// Order Domain
// ============================================================================
//
// Everything that describes an order, independent of where it comes from or
// where it is stored:
// - Value objects (Delivery, Payment, Item)
// - Aggregate (Order) and its wire decoding
// - Validation rules and the structured rejection they produce
//
// ============================================================================

pub mod aggregate;
pub mod errors;
pub mod validation;
pub mod value_objects;

#[cfg(test)]
pub(crate) mod fixtures;

pub use aggregate::Order;
pub use errors::{DecodeError, FieldViolation, OrderRejected};
pub use validation::validate_order;
pub use value_objects::{Delivery, Item, Payment};
