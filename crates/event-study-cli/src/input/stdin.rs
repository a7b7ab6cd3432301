use serde_json::Value;
use std::io::{self, Read};

/// Read piped JSON from stdin; `None` when stdin is a terminal or empty.
///
/// A single JSON document is returned as is. Newline-delimited JSON (one
/// record per line, as written by `jq -c`) is collected into an array.
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_piped(&buffer)
}

fn parse_piped(buffer: &str) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Ok(Some(value)),
        Err(whole) => {
            let records: Result<Vec<Value>, _> = trimmed
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(serde_json::from_str::<Value>)
                .collect();
            match records {
                Ok(records) if records.len() > 1 => Ok(Some(Value::Array(records))),
                _ => Err(format!("Failed to parse stdin as JSON: {}", whole).into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_document() {
        let v = parse_piped(r#"[{"ticker": "ACME"}]"#).unwrap().unwrap();
        assert_eq!(v[0]["ticker"], "ACME");
    }

    #[test]
    fn test_json_lines_collected() {
        let v = parse_piped("{\"ticker\": \"A\"}\n{\"ticker\": \"B\"}\n").unwrap().unwrap();
        assert_eq!(v.as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_blank_and_garbage() {
        assert!(parse_piped("  \n").unwrap().is_none());
        assert!(parse_piped("not json").is_err());
    }
}
