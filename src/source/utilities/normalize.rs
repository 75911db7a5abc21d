use serde_json::Value;

use crate::data::Record;
use crate::errors::PulseError;

/// Top-level fields that may carry the row array, in lookup order.
const ROW_ARRAY_FIELDS: [&str; 2] = ["rows", "data"];

/// Decode a response body into canonical records.
///
/// Non-JSON bodies are a `Decode` error; recognized-but-empty shapes yield no
/// records.
pub fn records_from_body(source_id: &str, body: &str) -> Result<Vec<Record>, PulseError> {
    let json: Value = serde_json::from_str(body).map_err(|err| PulseError::Decode {
        source_id: source_id.to_string(),
        reason: format!("failed parsing rows response: {err}"),
    })?;
    Ok(records_from_json(json))
}

/// Extract records from any of the accepted response shapes.
///
/// Accepts `{ "rows": [...] }`, `{ "data": [...] }`, or a bare array. Each
/// element may be a bare record or a `{ "row": record }` wrapper. Objects
/// without a row array yield nothing.
pub fn records_from_json(json: Value) -> Vec<Record> {
    let rows = match json {
        Value::Array(rows) => rows,
        Value::Object(mut map) => ROW_ARRAY_FIELDS
            .iter()
            .find_map(|field| match map.remove(*field) {
                Some(Value::Array(rows)) => Some(rows),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    rows.into_iter().map(Record::from_value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_datasets_server_rows_envelope() {
        let records = records_from_json(json!({
            "features": [],
            "rows": [
                { "row_idx": 0, "row": { "source": "A" }, "truncated_cells": [] },
                { "row_idx": 1, "row": { "source": "B" }, "truncated_cells": [] }
            ],
            "num_rows_total": 2
        }));
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("source"), Some(&json!("B")));
    }

    #[test]
    fn reads_bare_arrays_and_data_envelopes() {
        let bare = records_from_json(json!([{ "source": "A" }, { "row": { "source": "B" } }]));
        assert_eq!(bare.len(), 2);
        assert_eq!(bare[1].get("source"), Some(&json!("B")));

        let data = records_from_json(json!({ "data": [{ "source": "C" }] }));
        assert_eq!(data[0].get("source"), Some(&json!("C")));
    }

    #[test]
    fn unknown_shapes_yield_no_records() {
        assert!(records_from_json(json!({ "error": "nope" })).is_empty());
        assert!(records_from_json(json!({ "rows": "not-a-list" })).is_empty());
        assert!(records_from_json(json!(12)).is_empty());
    }

    #[test]
    fn non_json_body_is_a_decode_error() {
        let err = records_from_body("remote", "<html>oops</html>").unwrap_err();
        assert!(matches!(err, PulseError::Decode { ref source_id, .. } if source_id == "remote"));
    }
}
