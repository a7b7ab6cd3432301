use serde_json::Value;

use super::{cell, payload};

/// Headline fields, by priority. Pointers reach into nested results.
const PRIORITY: [&str; 8] = [
    "/summary/overall_statistics/mean_ar_day_0",
    "/ar_day_0",
    "/tests/t_test/p_value",
    "/p_value",
    "/valid",
    "/rows/0/ar_day_0/mean",
    "/num_spikes",
    "/reason",
];

/// Print just the key answer value from the output, falling back to the
/// first field of the result object.
pub fn print_minimal(value: &Value) {
    let result = payload(value);

    for pointer in PRIORITY {
        if let Some(val) = result.pointer(pointer).filter(|v| !v.is_null()) {
            println!("{}", cell(val));
            return;
        }
    }

    match result {
        Value::Object(map) => match map.iter().next() {
            Some((key, val)) => println!("{}: {}", key, cell(val)),
            None => println!(),
        },
        Value::Array(arr) => println!("{}", arr.len()),
        other => println!("{}", cell(other)),
    }
}
