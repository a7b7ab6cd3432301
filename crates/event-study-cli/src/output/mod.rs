pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("JSON serialization error: {}", e),
    }
}

/// The payload of a `ComputationOutput` envelope, or the value itself.
pub fn payload(value: &Value) -> &Value {
    value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value)
}

/// Render a scalar for a table cell or CSV field; `null` becomes empty.
pub fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format_float(f),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(arr) => arr.iter().map(cell).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn format_float(f: f64) -> String {
    if f != 0.0 && f.abs() < 1e-4 {
        format!("{:.4e}", f)
    } else {
        format!("{:.6}", f)
    }
}

/// Rows of an array of objects: union of keys in first-seen order, then one
/// row per object.
pub fn rows_of(arr: &[Value]) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let mut headers: Vec<String> = Vec::new();
    for item in arr {
        let map = item.as_object()?;
        for key in map.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    let rows = arr
        .iter()
        .filter_map(Value::as_object)
        .map(|map| {
            headers
                .iter()
                .map(|h| map.get(h).map(cell).unwrap_or_default())
                .collect()
        })
        .collect();
    Some((headers, rows))
}

/// An object whose values are all objects (e.g. a test battery) as rows
/// with the key in the first column.
pub fn keyed_rows(map: &serde_json::Map<String, Value>, key_header: &str) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    if map.is_empty() || !map.values().all(Value::is_object) {
        return None;
    }
    let items: Vec<Value> = map
        .iter()
        .map(|(k, v)| {
            let mut row = serde_json::Map::new();
            row.insert(key_header.to_string(), Value::String(k.clone()));
            if let Value::Object(inner) = v {
                for (ik, iv) in inner {
                    row.insert(ik.clone(), iv.clone());
                }
            }
            Value::Object(row)
        })
        .collect();
    rows_of(&items)
}
