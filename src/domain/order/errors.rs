use std::fmt;

// ============================================================================
// Order Ingestion Errors
// ============================================================================

/// The payload could not be turned into an Order at all.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is empty")]
    EmptyPayload,

    #[error("payload is not a valid order document: {0}")]
    Json(#[from] serde_json::Error),
}

/// One failed rule on one field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FieldViolation {
    /// Dotted path into the aggregate, e.g. `delivery.phone` or `items[0].price`.
    pub field: String,
    /// Rule identifier, e.g. `length`, `range`, `email`, `e164`.
    pub code: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.field, self.code)
    }
}

/// A decoded Order that must not reach storage.
///
/// Only used for dead-letter diagnostics; nothing tries to repair the order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("order rejected: {}", describe(.violations))]
pub struct OrderRejected {
    pub violations: Vec<FieldViolation>,
}

impl OrderRejected {
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

fn describe(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
