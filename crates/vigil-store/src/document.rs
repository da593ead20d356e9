//! Typed-field document mapping for the Firestore REST convention.
//!
//! The store does not take plain JSON: every field is wrapped in a type
//! tag (`stringValue`, `integerValue`, ...), and integers travel as
//! strings. Encoding and decoding both live here so the capture node and
//! the viewer agree on the wire shape.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// One published capture: summary metadata plus the JPEG itself, base64
/// encoded. This is the whole unit of persistence; no frame history is
/// kept beyond what the store accumulates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub timestamp: String,
    pub image_name: String,
    pub device_id: String,
    pub has_detections: bool,
    pub detected_count: i64,
    pub classes: Vec<String>,
    pub image_base64: String,
}

impl CaptureRecord {
    /// Encode into the store's `{"fields": {...}}` write body.
    pub fn to_document(&self) -> Value {
        let mut fields = Map::new();
        fields.insert(
            "timestamp".into(),
            json!({ "stringValue": self.timestamp }),
        );
        fields.insert(
            "image_name".into(),
            json!({ "stringValue": self.image_name }),
        );
        fields.insert(
            "device_id".into(),
            json!({ "stringValue": self.device_id }),
        );
        fields.insert(
            "has_detections".into(),
            json!({ "booleanValue": self.has_detections }),
        );
        // Integer fields travel as strings on this API.
        fields.insert(
            "detected_count".into(),
            json!({ "integerValue": self.detected_count.to_string() }),
        );
        if !self.classes.is_empty() {
            let items: Vec<Value> = self
                .classes
                .iter()
                .map(|c| json!({ "stringValue": c }))
                .collect();
            fields.insert(
                "classes".into(),
                json!({ "arrayValue": { "values": items } }),
            );
        }
        fields.insert(
            "imagebase64".into(),
            json!({ "stringValue": self.image_base64 }),
        );

        json!({ "fields": fields })
    }

    /// Decode a document as returned by the REST read side.
    ///
    /// Missing fields fall back to empty defaults; unknown fields are
    /// ignored. Returns `None` when the value has no `fields` object at
    /// all.
    pub fn from_document(doc: &Value) -> Option<Self> {
        let fields = doc.get("fields")?.as_object()?;
        let mut record = CaptureRecord {
            timestamp: String::new(),
            image_name: String::new(),
            device_id: String::new(),
            has_detections: false,
            detected_count: 0,
            classes: Vec::new(),
            image_base64: String::new(),
        };

        for (key, value) in fields {
            match (key.as_str(), decode_value(value)) {
                ("timestamp", Some(FieldValue::Str(s))) => record.timestamp = s,
                ("image_name", Some(FieldValue::Str(s))) => record.image_name = s,
                ("device_id", Some(FieldValue::Str(s))) => record.device_id = s,
                ("has_detections", Some(FieldValue::Bool(b))) => record.has_detections = b,
                ("detected_count", Some(FieldValue::Int(n))) => record.detected_count = n,
                ("imagebase64", Some(FieldValue::Str(s))) => record.image_base64 = s,
                ("classes", Some(FieldValue::Array(items))) => {
                    record.classes = items
                        .into_iter()
                        .filter_map(|v| match v {
                            FieldValue::Str(s) => Some(s),
                            _ => None,
                        })
                        .collect();
                }
                _ => {}
            }
        }
        Some(record)
    }
}

/// The newest document of a collection listing, by the `timestamp` string
/// field, most recent first.
pub fn newest_document(documents: &[Value]) -> Option<&Value> {
    documents.iter().max_by_key(|doc| {
        doc.get("fields")
            .and_then(|f| f.get("timestamp"))
            .and_then(|t| t.get("stringValue"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    })
}

#[derive(Debug)]
enum FieldValue {
    Str(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Array(Vec<FieldValue>),
}

fn decode_value(value: &Value) -> Option<FieldValue> {
    let obj = value.as_object()?;
    let (tag, inner) = obj.iter().next()?;
    match tag.as_str() {
        "stringValue" | "timestampValue" => inner.as_str().map(|s| FieldValue::Str(s.into())),
        "integerValue" => match inner {
            // The API writes strings; be lenient and accept bare numbers.
            Value::String(s) => s.parse().ok().map(FieldValue::Int),
            Value::Number(n) => n.as_i64().map(FieldValue::Int),
            _ => None,
        },
        "doubleValue" => inner.as_f64().map(FieldValue::Double),
        "booleanValue" => inner.as_bool().map(FieldValue::Bool),
        "arrayValue" => {
            let values = inner.get("values").and_then(Value::as_array)?;
            Some(FieldValue::Array(
                values.iter().filter_map(decode_value).collect(),
            ))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_values_decode_from_both_shapes() {
        let as_string = json!({ "integerValue": "42" });
        let as_number = json!({ "integerValue": 42 });
        assert!(matches!(decode_value(&as_string), Some(FieldValue::Int(42))));
        assert!(matches!(decode_value(&as_number), Some(FieldValue::Int(42))));
    }

    #[test]
    fn double_and_timestamp_variants_decode() {
        let d = json!({ "doubleValue": 0.25 });
        let t = json!({ "timestampValue": "2026-01-01T00:00:00Z" });
        assert!(matches!(decode_value(&d), Some(FieldValue::Double(x)) if x == 0.25));
        assert!(matches!(decode_value(&t), Some(FieldValue::Str(_))));
    }

    #[test]
    fn unknown_tags_decode_to_nothing() {
        let v = json!({ "geoPointValue": { "latitude": 0, "longitude": 0 } });
        assert!(decode_value(&v).is_none());
    }
}
