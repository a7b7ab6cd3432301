use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{cell, keyed_rows, payload, rows_of};

/// Format output as tables: scalar fields first, then one titled table per
/// nested list or keyed map, then warnings and methodology.
pub fn print_table(value: &Value) {
    match payload(value) {
        Value::Object(map) => print_object(map),
        Value::Array(arr) => print_array(arr),
        other => println!("{}", cell(other)),
    }

    if let Some(envelope) = value.as_object().filter(|m| m.contains_key("result")) {
        print_envelope_notes(envelope);
    }
}

fn print_object(map: &Map<String, Value>) {
    let mut scalars = Builder::default();
    scalars.push_record(["Field", "Value"]);
    let mut has_scalars = false;
    let mut sections: Vec<(&String, &Value)> = Vec::new();

    for (key, val) in map {
        match val {
            Value::Array(_) if is_nested(val) => sections.push((key, val)),
            Value::Object(inner) if inner.values().any(is_nested) => sections.push((key, val)),
            _ => {
                scalars.push_record([key.clone(), cell(val)]);
                has_scalars = true;
            }
        }
    }

    if has_scalars {
        println!("{}", Table::from(scalars));
    }
    for (key, val) in sections {
        println!("\n{}", key);
        match val {
            Value::Array(arr) => print_array(arr),
            Value::Object(inner) => match keyed_rows(inner, "name") {
                Some((headers, rows)) => print_rows(headers, rows),
                None => print_object(inner),
            },
            _ => {}
        }
    }
}

fn is_nested(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(arr) => arr.iter().any(Value::is_object),
        _ => false,
    }
}

fn print_array(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }
    match rows_of(arr) {
        Some((headers, rows)) => print_rows(headers, rows),
        None => {
            for item in arr {
                println!("{}", cell(item));
            }
        }
    }
}

fn print_rows(headers: Vec<String>, rows: Vec<Vec<String>>) {
    let mut builder = Builder::default();
    builder.push_record(headers);
    for row in rows {
        builder.push_record(row);
    }
    println!("{}", Table::from(builder));
}

fn print_envelope_notes(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }
    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}
