//! Raw source bytes → parsed document.
//!
//! `.json` sources must be valid JSON. Anything else is treated as a text
//! subscription: JSON if it parses, otherwise (optionally base64-wrapped)
//! newline-separated connection URLs carried as a JSON string.

use serde_json::Value;

use super::descriptor::decode_base64_lenient;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("{source_id}: document is empty")]
    Empty { source_id: String },

    #[error("{source_id}: document is not valid UTF-8")]
    NotUtf8 { source_id: String },

    #[error("{source_id}: invalid JSON: {reason}")]
    InvalidJson { source_id: String, reason: String },
}

fn is_json_source(source_id: &str) -> bool {
    source_id.to_ascii_lowercase().ends_with(".json")
}

/// Parse one source's bytes into a document the extractor can walk.
pub fn parse_document(source_id: &str, bytes: &[u8]) -> Result<Value, DocumentError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DocumentError::NotUtf8 {
        source_id: source_id.to_string(),
    })?;
    let text = text.trim_start_matches('\u{feff}').trim();
    if text.is_empty() {
        return Err(DocumentError::Empty {
            source_id: source_id.to_string(),
        });
    }

    if is_json_source(source_id) {
        return serde_json::from_str(text).map_err(|err| DocumentError::InvalidJson {
            source_id: source_id.to_string(),
            reason: err.to_string(),
        });
    }

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if value.is_object() || value.is_array() {
            return Ok(value);
        }
    }

    if !text.contains("://") {
        let unwrapped = decode_base64_lenient(text)
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .filter(|decoded| decoded.contains("://"));
        if let Some(decoded) = unwrapped {
            return Ok(Value::String(decoded));
        }
    }

    Ok(Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::json;

    #[test]
    fn json_source_parses() {
        let doc = parse_document("a.json", br#"{"accounts": []}"#).unwrap();
        assert_eq!(doc, json!({"accounts": []}));
    }

    #[test]
    fn json_source_must_be_json() {
        let err = parse_document("broken.json", b"{not json").unwrap_err();
        assert!(matches!(err, DocumentError::InvalidJson { .. }));
        assert!(err.to_string().starts_with("broken.json: invalid JSON"));
    }

    #[test]
    fn empty_and_binary_inputs_are_rejected() {
        assert!(matches!(
            parse_document("a.json", b"  \n"),
            Err(DocumentError::Empty { .. })
        ));
        assert!(matches!(
            parse_document("sub.txt", &[0xff, 0xfe, 0x00]),
            Err(DocumentError::NotUtf8 { .. })
        ));
    }

    #[test]
    fn text_subscription_stays_text() {
        let doc = parse_document("sub.txt", b"vless://u@a.example.com:443\n").unwrap();
        assert_eq!(doc, json!("vless://u@a.example.com:443"));
    }

    #[test]
    fn base64_subscription_is_unwrapped() {
        let body = STANDARD.encode("vless://u@a.example.com:443\ntrojan://p@b.example.com:443\n");
        let doc = parse_document("sub", body.as_bytes()).unwrap();
        assert_eq!(
            doc,
            json!("vless://u@a.example.com:443\ntrojan://p@b.example.com:443\n")
        );
    }

    #[test]
    fn json_without_extension_is_detected() {
        let doc = parse_document("nodes.conf", br#"["vless://u@a.example.com:443"]"#).unwrap();
        assert!(doc.is_array());
    }
}
