//! Tolerant decoding of contract return values into typed invoices.
//!
//! Values arrive either as plain JSON, as tagged [`ContractValue`] wrappers
//! (`{"type": …, "value": …}`), or not at all. Every entry point here returns
//! an empty or `None` result for input it cannot interpret; nothing on the
//! read path is allowed to fail.

use std::borrow::Cow;
use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::contract_value::ContractValue;
use crate::invoice::{Invoice, InvoiceMap, InvoiceStatus, PendingInvoices};

/// Classification of a raw value before any field is read.
#[derive(Debug)]
enum Shape<'a> {
    Absent,
    Native(&'a Value),
    Wrapped(ContractValue),
}

impl<'a> Shape<'a> {
    fn of(raw: &'a Value) -> Self {
        match raw {
            Value::Null => Shape::Absent,
            Value::Object(map) if is_wrapper(map) => {
                match serde_json::from_value::<ContractValue>(raw.clone()) {
                    Ok(value) => Shape::Wrapped(value),
                    Err(e) => {
                        debug!(error = %e, "Malformed contract value wrapper");
                        Shape::Absent
                    }
                }
            }
            other => Shape::Native(other),
        }
    }
}

/// A wrapper carries a string `type` discriminant and at most a `value`.
fn is_wrapper(map: &Map<String, Value>) -> bool {
    map.get("type").is_some_and(Value::is_string)
        && map.keys().all(|k| k == "type" || k == "value")
}

/// Plain JSON view of `raw`, or `None` when it is absent.
fn resolve(raw: &Value) -> Option<Cow<'_, Value>> {
    match Shape::of(raw) {
        Shape::Absent => None,
        Shape::Native(value) => Some(Cow::Borrowed(value)),
        Shape::Wrapped(value) => match value.to_native() {
            Value::Null => None,
            native => Some(Cow::Owned(native)),
        },
    }
}

/// Look up `key` in an object or in an array of `[key, value]` pairs.
fn keyed_entry<'v>(container: &'v Value, key: &str) -> Option<&'v Value> {
    match container {
        Value::Object(map) => map.get(key),
        Value::Array(pairs) => pairs.iter().find_map(|pair| match pair.as_array()?.as_slice() {
            [k, v] if resolve(k).as_deref().and_then(Value::as_str) == Some(key) => Some(v),
            _ => None,
        }),
        _ => None,
    }
}

// -- Field readers ------------------------------------------------------------

fn text(raw: Option<&Value>) -> Option<String> {
    match &*resolve(raw?)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn integer_string(raw: Option<&Value>) -> Option<String> {
    let value = resolve(raw?)?;
    let digits = match &*value {
        Value::Number(n) if n.is_u64() || n.is_i64() => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    digits.parse::<i128>().ok().map(|n| n.to_string())
}

fn timestamp(raw: Option<&Value>) -> Option<u64> {
    integer_string(raw)?.parse().ok()
}

fn string_map(raw: Option<&Value>) -> HashMap<String, String> {
    let Some(value) = raw.and_then(resolve) else {
        return HashMap::new();
    };
    match &*value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| Some((k.clone(), text(Some(v))?)))
            .collect(),
        Value::Array(pairs) => pairs
            .iter()
            .filter_map(|pair| match pair.as_array()?.as_slice() {
                [k, v] => Some((text(Some(k))?, text(Some(v))?)),
                _ => None,
            })
            .collect(),
        _ => HashMap::new(),
    }
}

/// Unit enum variants arrive as `"Sent"`, `["Sent"]` or `{"tag": "Sent"}`.
fn status(raw: Option<&Value>) -> InvoiceStatus {
    let Some(value) = raw.and_then(resolve) else {
        return InvoiceStatus::Unknown;
    };
    let name = match &*value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(|first| text(Some(first))),
        Value::Object(map) => text(map.get("tag")),
        _ => None,
    };
    name.map_or(InvoiceStatus::Unknown, |n| InvoiceStatus::from_name(&n))
}

// -- Entry points -------------------------------------------------------------

/// Decode one invoice. `None` for absent or non-object input; missing fields
/// take defaults.
pub fn normalize_invoice(raw: &Value) -> Option<Invoice> {
    let value = resolve(raw)?;
    let Value::Object(fields) = &*value else {
        debug!("Invoice response is not an object");
        return None;
    };

    Some(Invoice {
        invoice_id: text(fields.get("invoice_id")).unwrap_or_default(),
        creator: text(fields.get("creator")).unwrap_or_default(),
        recipient: text(fields.get("recipient")).unwrap_or_default(),
        amount: integer_string(fields.get("amount")).unwrap_or_else(|| "0".to_string()),
        metadata: string_map(fields.get("metadata")),
        status: status(fields.get("status")),
        created_at: timestamp(fields.get("created_at")).unwrap_or(0),
        last_updated: timestamp(fields.get("last_updated")).unwrap_or(0),
        paid_at: timestamp(fields.get("paid_at")),
        acknowledgment_note: text(fields.get("acknowledgment_note")),
    })
}

/// Decode a list of invoices, dropping elements that do not decode.
pub fn normalize_invoice_list(raw: &Value) -> Vec<Invoice> {
    match resolve(raw).as_deref() {
        Some(Value::Array(items)) => items.iter().filter_map(normalize_invoice).collect(),
        Some(_) => {
            debug!("Invoice list response is not an array");
            Vec::new()
        }
        None => Vec::new(),
    }
}

/// Decode the `{created, received}` map returned for an address.
pub fn normalize_invoice_map(raw: &Value) -> InvoiceMap {
    let Some(value) = resolve(raw) else {
        return InvoiceMap::default();
    };
    let list = |key: &str| keyed_entry(&value, key).map(normalize_invoice_list).unwrap_or_default();
    InvoiceMap {
        created: list("created"),
        received: list("received"),
    }
}

/// Decode the `{awaiting_payment, pending_action}` map.
pub fn normalize_pending_invoices(raw: &Value) -> PendingInvoices {
    let Some(value) = resolve(raw) else {
        return PendingInvoices::default();
    };
    let list = |key: &str| keyed_entry(&value, key).map(normalize_invoice_list).unwrap_or_default();
    PendingInvoices {
        awaiting_payment: list("awaiting_payment"),
        pending_action: list("pending_action"),
    }
}

/// Decode a list of invoice ids. Numbers are rendered as text, anything else
/// is skipped.
pub fn normalize_string_list(raw: &Value) -> Vec<String> {
    match resolve(raw).as_deref() {
        Some(Value::Array(items)) => items.iter().filter_map(|item| text(Some(item))).collect(),
        _ => Vec::new(),
    }
}

/// Decode an optional address or other string value.
pub fn normalize_optional_string(raw: &Value) -> Option<String> {
    text(Some(raw))
}

/// Decode an integer amount into a smallest-unit string, `"0"` when absent.
pub fn normalize_amount(raw: &Value) -> String {
    integer_string(Some(raw)).unwrap_or_else(|| "0".to_string())
}
