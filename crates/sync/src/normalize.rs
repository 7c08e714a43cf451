//! Normalization of cart records into [`CartLineItem`].
//!
//! Cart records reach the client in two naming conventions:
//!
//! - the DTO shape returned by the cart service
//!   (`productName`, `productPrice`, `productImage`, ...)
//! - the short shape (`name`, `price`, ...), which is what
//!   [`CartLineItem`] serializes to and what durable storage holds
//!
//! When both are present the `product*` field wins.
//!
//! Every read boundary (durable storage and remote replies) goes through
//! [`normalize_line`] so the rest of the crate only ever sees one shape.
//! Numeric fields are coerced leniently: numbers, numeric strings and
//! fractional values are accepted, and anything unparseable becomes zero.

use serde_json::{Map, Value};
use storecart_core::{CartLineId, Price, ProductId, ProductStatus};
use tracing::debug;

use crate::model::{CartLineItem, CartSnapshot};

/// Normalize one cart record.
///
/// Returns `None` when the record is not an object or has no usable product
/// ID. A zero quantity is preserved so callers can tell "removed" apart from
/// "malformed"; [`CartSnapshot::from_lines`] drops such lines.
#[must_use]
pub fn normalize_line(record: &Value) -> Option<CartLineItem> {
    let fields = record.as_object()?;
    let product_id = lenient_int(fields.get("productId")?).map(ProductId::new)?;

    Some(CartLineItem {
        id: fields
            .get("id")
            .and_then(lenient_int)
            .map(CartLineId::new),
        product_id,
        quantity: fields
            .get("quantity")
            .and_then(lenient_int)
            .map_or(0, clamp_u32),
        selected: fields.get("selected").map_or(true, lenient_bool),
        name: first_present(fields, &["productName", "name"])
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from),
        price: first_present(fields, &["productPrice", "price"]).map(Price::lenient),
        product_image: first_present(fields, &["productImage", "image"])
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from),
        product_stock: first_present(fields, &["productStock", "stock"])
            .and_then(lenient_int)
            .map(clamp_u32),
        product_status: first_present(fields, &["productStatus", "status"])
            .and_then(lenient_int)
            .map(ProductStatus::from),
    })
}

/// Normalize an array of cart records into a snapshot.
///
/// Non-arrays yield an empty snapshot; malformed entries are skipped.
#[must_use]
pub fn normalize_snapshot(records: &Value) -> CartSnapshot {
    let Some(records) = records.as_array() else {
        debug!("cart records are not an array, treating as empty");
        return CartSnapshot::new();
    };
    CartSnapshot::from_lines(records.iter().filter_map(normalize_line))
}

/// Parse and normalize a serialized snapshot. Malformed JSON yields an empty
/// snapshot.
#[must_use]
pub fn parse_snapshot(raw: &str) -> CartSnapshot {
    match serde_json::from_str::<Value>(raw) {
        Ok(records) => normalize_snapshot(&records),
        Err(e) => {
            debug!(error = %e, "stored cart is not valid JSON, treating as empty");
            CartSnapshot::new()
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// First field among `names` that is present and not null.
fn first_present<'a>(fields: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| fields.get(*name))
        .find(|value| !value.is_null())
}

/// Integer from a JSON number or numeric string. Fractions are truncated.
fn lenient_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(truncate)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(truncate))
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)] // saturating float-to-int cast is the intent
fn truncate(f: f64) -> i64 {
    f.trunc() as i64
}

/// Clamp a possibly negative integer into `u32`.
fn clamp_u32(n: i64) -> u32 {
    u32::try_from(n.max(0)).unwrap_or(u32::MAX)
}

/// Boolean from a JSON bool, number, or string; anything else counts as selected.
fn lenient_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !matches!(s.trim(), "false" | "0" | ""),
        _ => true,
    }
}
