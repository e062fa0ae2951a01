//! Result formatting: turn raw store rows into output property maps.
//!
//! Only columns the translator tagged `decode_json` are decoded; their
//! cells carry JSON text produced by `->` extraction or `json_object`
//! assembly, so one parse recovers booleans, nulls, arrays and objects
//! exactly. Untagged text passes through verbatim, and synthetic columns
//! are suppressed.

use serde_json::{Map, Value};

use crate::sqlite_query_generator::ReturnColumn;

pub fn format_rows(
    rows: Vec<Vec<Value>>,
    columns: &[ReturnColumn],
) -> Vec<Map<String, Value>> {
    rows.into_iter()
        .map(|row| {
            let mut out = Map::new();
            for (index, column) in columns.iter().enumerate() {
                if column.hidden {
                    continue;
                }
                let cell = row.get(index).cloned().unwrap_or(Value::Null);
                out.insert(column.name.clone(), format_cell(cell, column.decode_json));
            }
            out
        })
        .collect()
}

fn format_cell(cell: Value, decode_json: bool) -> Value {
    if !decode_json {
        return cell;
    }
    match cell {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}
