//! # Burn Record Utilities

use anyhow::Context;
use burn::prelude::Backend;
use burn::record::{HalfPrecisionSettings, Record};
use serde_json::{Map, Value};

fn shape_of_numeric_array(arr: &[Value]) -> Option<Vec<usize>> {
    match arr.first() {
        None => Some(vec![0]),
        Some(first) if first.is_number() => Some(vec![arr.len()]),
        Some(Value::Array(inner)) => {
            let inner_shape = shape_of_numeric_array(inner)?;
            Some(std::iter::once(arr.len()).chain(inner_shape).collect())
        }
        _ => None,
    }
}

/// Rewrite a serialized record into a structure summary.
///
/// * tensor payloads (``bytes``) and nulls are dropped;
/// * numeric arrays collapse to ``{"_shape": [...]}``;
/// * ``shape`` entries are kept as-is.
fn summarize_value(value: Value) -> Value {
    match value {
        Value::Array(a) => match shape_of_numeric_array(&a) {
            Some(shape) => {
                let mut obj: Map<String, Value> = Map::new();
                obj.insert(
                    "_shape".to_string(),
                    Value::Array(shape.into_iter().map(Value::from).collect()),
                );
                Value::Object(obj)
            }
            None => Value::Array(a.into_iter().map(summarize_value).collect()),
        },
        Value::Object(obj) => Value::Object(
            obj.into_iter()
                .filter(|(k, v)| k != "bytes" && !v.is_null())
                .map(|(k, v)| {
                    let v = if k == "shape" { v } else { summarize_value(v) };
                    (k, v)
                })
                .collect(),
        ),
        v => v,
    }
}

/// Summarize the structure of a record as JSON.
pub fn record_summary<B: Backend, R: Record<B>>(record: R) -> anyhow::Result<Value> {
    let item = record.into_item::<HalfPrecisionSettings>();
    let value = serde_json::to_value(&item).context("serializing record")?;
    Ok(summarize_value(value))
}

/// Summarize the structure of a record as pretty-printed JSON.
pub fn record_summary_pretty<B: Backend, R: Record<B>>(record: R) -> anyhow::Result<String> {
    let value = record_summary::<B, R>(record)?;
    Ok(serde_json::to_string_pretty(&value)?)
}
