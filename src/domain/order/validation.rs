use chrono::{DateTime, Utc};
use uuid::{Uuid, Variant};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use super::aggregate::Order;
use super::errors::{FieldViolation, OrderRejected};

// ============================================================================
// Order Validation
// ============================================================================
//
// Pure acceptance check run by the pipeline before an order may be persisted.
// Field rules live on the structs as `validator` attributes; the custom rules
// the derive does not ship with are defined here.
//
// ============================================================================

/// ISO 4217 active currency codes.
const ISO_4217: &[&str] = &[
    "AED", "AFN", "ALL", "AMD", "ANG", "AOA", "ARS", "AUD", "AWG", "AZN", "BAM", "BBD", "BDT",
    "BGN", "BHD", "BIF", "BMD", "BND", "BOB", "BOV", "BRL", "BSD", "BTN", "BWP", "BYN", "BZD",
    "CAD", "CDF", "CHE", "CHF", "CHW", "CLF", "CLP", "CNY", "COP", "COU", "CRC", "CUP", "CVE",
    "CZK", "DJF", "DKK", "DOP", "DZD", "EGP", "ERN", "ETB", "EUR", "FJD", "FKP", "GBP", "GEL",
    "GHS", "GIP", "GMD", "GNF", "GTQ", "GYD", "HKD", "HNL", "HTG", "HUF", "IDR", "ILS", "INR",
    "IQD", "IRR", "ISK", "JMD", "JOD", "JPY", "KES", "KGS", "KHR", "KMF", "KPW", "KRW", "KWD",
    "KYD", "KZT", "LAK", "LBP", "LKR", "LRD", "LSL", "LYD", "MAD", "MDL", "MGA", "MKD", "MMK",
    "MNT", "MOP", "MRU", "MUR", "MVR", "MWK", "MXN", "MXV", "MYR", "MZN", "NAD", "NGN", "NIO",
    "NOK", "NPR", "NZD", "OMR", "PAB", "PEN", "PGK", "PHP", "PKR", "PLN", "PYG", "QAR", "RON",
    "RSD", "RUB", "RWF", "SAR", "SBD", "SCR", "SDG", "SEK", "SGD", "SHP", "SLE", "SOS", "SRD",
    "SSP", "STN", "SVC", "SYP", "SZL", "THB", "TJS", "TMT", "TND", "TOP", "TRY", "TTD", "TWD",
    "TZS", "UAH", "UGX", "USD", "USN", "UYI", "UYU", "UYW", "UZS", "VED", "VES", "VND", "VUV",
    "WST", "XAF", "XAG", "XAU", "XCD", "XDR", "XOF", "XPD", "XPF", "XPT", "XSU", "XUA", "YER",
    "ZAR", "ZMW", "ZWG",
];

/// Validate an order and flatten every failure into a field path.
pub fn validate_order(order: &Order) -> Result<(), OrderRejected> {
    order.validate().map_err(|errors| {
        let mut violations = Vec::new();
        flatten("", &errors, &mut violations);
        violations.sort();
        OrderRejected { violations }
    })
}

fn flatten(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldViolation>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        #[allow(unreachable_patterns)]
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    out.push(FieldViolation {
                        field: path.clone(),
                        code: error.code.to_string(),
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten(&path, inner, out),
            ValidationErrorsKind::List(entries) => {
                for (index, inner) in entries {
                    flatten(&format!("{}[{}]", path, index), inner, out);
                }
            }
            _ => out.push(FieldViolation {
                field: path,
                code: "invalid".to_string(),
            }),
        }
    }
}

/// Lowercase hyphenated RFC 4122 version 4 only. The key doubles as the cache
/// and storage key, so alternate spellings of one UUID must not get through.
pub(crate) fn validate_order_uid(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new("required"));
    }

    let canonical = value.len() == 36
        && !value.bytes().any(|b| b.is_ascii_uppercase())
        && Uuid::try_parse(value)
            .map(|uuid| uuid.get_version_num() == 4 && uuid.get_variant() == Variant::RFC4122)
            .unwrap_or(false);

    if canonical {
        Ok(())
    } else {
        Err(ValidationError::new("uuid"))
    }
}

/// E.164: a `+`, a non-zero country digit, 7 to 15 digits in total.
pub(crate) fn validate_e164_phone(value: &str) -> Result<(), ValidationError> {
    let digits = value
        .strip_prefix('+')
        .ok_or_else(|| ValidationError::new("e164"))?;

    let well_formed = (7..=15).contains(&digits.len())
        && digits.bytes().all(|b| b.is_ascii_digit())
        && !digits.starts_with('0');

    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::new("e164"))
    }
}

pub(crate) fn validate_currency(value: &str) -> Result<(), ValidationError> {
    if ISO_4217.binary_search(&value).is_ok() {
        Ok(())
    } else {
        Err(ValidationError::new("iso4217"))
    }
}

/// Required numeric fields: zero means absent, any other value is accepted.
pub(crate) fn validate_non_zero(value: i64) -> Result<(), ValidationError> {
    if value == 0 {
        Err(ValidationError::new("required"))
    } else {
        Ok(())
    }
}

pub(crate) fn validate_created_at(value: &DateTime<Utc>) -> Result<(), ValidationError> {
    if value.timestamp() == 0 && value.timestamp_subsec_nanos() == 0 {
        Err(ValidationError::new("required"))
    } else {
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
