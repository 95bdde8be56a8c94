use serde_json::{Map, Value};

/// A Solr document as returned by `/select`
pub type Document = Map<String, Value>;

/// Render the id field of `doc`.
///
/// Solr may hand back numeric keys as JSON numbers in one response and as
/// strings in another; both render to the same text.
pub fn document_id(doc: &Document, id_field: &str) -> Option<String> {
    value_id(doc.get(id_field)?)
}

pub(crate) fn value_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
