use serde_json::Value;
use tracing::warn;

use crate::domain::record::{IncludedSideband, Record};
use crate::errors::DomainError;

/// Keys that may hold the record array, in lookup order.
pub const RECORD_ARRAY_KEYS: [&str; 4] = ["data", "records", "items", "list"];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordResponse {
    pub records: Vec<Record>,
    pub included: IncludedSideband,
}

impl RecordResponse {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parses tool content that is either a JSON string or an already-decoded
/// value. A bare string that is not JSON is malformed.
pub fn parse_record_response(raw: &Value) -> Result<RecordResponse, DomainError> {
    match raw {
        Value::String(text) => {
            let decoded: Value = serde_json::from_str(text)
                .map_err(|error| DomainError::MalformedResponse(format!("response is not JSON: {error}")))?;
            parse_document(&decoded)
        }
        other => parse_document(other),
    }
}

fn parse_document(document: &Value) -> Result<RecordResponse, DomainError> {
    let (items, included) = match document {
        Value::Array(items) => (items.clone(), Vec::new()),
        Value::Object(object) => {
            let located = RECORD_ARRAY_KEYS.iter().find_map(|key| object.get(*key).map(|value| (*key, value)));
            let items = match located {
                Some((_, Value::Array(items))) => items.clone(),
                Some(("data", single @ Value::Object(_))) => vec![single.clone()],
                Some((_, Value::Null)) => Vec::new(),
                Some((key, _)) => {
                    return Err(DomainError::MalformedResponse(format!("`{key}` does not hold a record list")));
                }
                None if object.contains_key("error") => {
                    let message = object
                        .get("message")
                        .or_else(|| object.get("error"))
                        .map(value_summary)
                        .unwrap_or_default();
                    return Err(DomainError::MalformedResponse(format!("error document: {message}")));
                }
                None => {
                    return Err(DomainError::MalformedResponse("no record list in response".to_string()));
                }
            };
            let included = object.get("included").and_then(Value::as_array).cloned().unwrap_or_default();
            (items, included)
        }
        _ => return Err(DomainError::MalformedResponse("unexpected top-level shape".to_string())),
    };

    let records = items
        .iter()
        .filter_map(|item| {
            let record = Record::from_value(item);
            if record.is_none() {
                warn!(event_name = "projection.record_skipped", "dropping record entry without an id");
            }
            record
        })
        .collect();

    Ok(RecordResponse { records, included: IncludedSideband::from_values(&included) })
}

fn value_summary(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
