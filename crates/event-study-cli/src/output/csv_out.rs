use serde_json::Value;
use std::io;

use super::{cell, keyed_rows, payload, rows_of};

/// Tabular sections written as CSV, in order of preference.
const TABLE_POINTERS: [&str; 4] = ["/batch/items", "/results", "/test_summary", "/rows"];

/// Write output as CSV to stdout.
///
/// Per-event results or the test summary become one row per record; a map
/// of named objects (a test battery) one row per name; anything else a
/// two-column `field,value` listing.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());
    let body = payload(value);

    let table = TABLE_POINTERS
        .iter()
        .find_map(|p| body.pointer(p).and_then(Value::as_array))
        .map(Vec::as_slice)
        .or_else(|| body.as_array().map(Vec::as_slice))
        .and_then(rows_of)
        .or_else(|| body.as_object().and_then(|m| keyed_rows(m, "name")));

    match (table, body) {
        (Some((headers, rows)), _) => {
            let _ = wtr.write_record(&headers);
            for row in rows {
                let _ = wtr.write_record(&row);
            }
        }
        (None, Value::Object(map)) => {
            let _ = wtr.write_record(["field", "value"]);
            for (key, val) in map {
                let _ = wtr.write_record([key.as_str(), &cell(val)]);
            }
        }
        (None, other) => {
            let _ = wtr.write_record([&cell(other)]);
        }
    }

    let _ = wtr.flush();
}
