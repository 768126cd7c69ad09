//! Typed access to tool call arguments.

use crate::error::RelayError;

/// Wrapper around tool call arguments providing typed extraction.
///
/// Models occasionally send the arguments object as a JSON-encoded string;
/// [`ToolArguments::new`] decodes that form so lookups see an object.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        let value = match value {
            serde_json::Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(trimmed).unwrap_or(serde_json::Value::String(raw))
                }
            }
            other => other,
        };
        Self { value }
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a required string argument.
    pub fn get_str(&self, key: &str) -> Result<&str, RelayError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| RelayError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument. Blank strings count as absent.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn get_u64_opt(&self, key: &str) -> Option<u64> {
        self.value.get(key).and_then(|v| v.as_u64())
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, RelayError> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            RelayError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_encoded_objects_are_decoded() {
        let args = ToolArguments::new(json!(r#"{"query":"rust"}"#));
        assert_eq!(args.get_str("query").unwrap(), "rust");
        assert!(ToolArguments::new(json!("  ")).raw().is_object());
    }

    #[test]
    fn missing_string_is_invalid_argument() {
        let args = ToolArguments::new(json!({"n": 1}));
        let err = args.get_str("query").unwrap_err();
        assert!(matches!(err, RelayError::InvalidArgument(ref m) if m.contains("query")));
        assert_eq!(args.get_u64_opt("n"), Some(1));
    }

    #[test]
    fn blank_optional_strings_are_absent() {
        let args = ToolArguments::new(json!({"include": "", "hint": "charts"}));
        assert_eq!(args.get_str_opt("include"), None);
        assert_eq!(args.get_str_opt("hint"), Some("charts"));
    }

    #[test]
    fn deserialize_into_struct() {
        #[derive(serde::Deserialize)]
        struct Params {
            code: String,
            filename: Option<String>,
        }
        let params: Params = ToolArguments::new(json!({"code": "print(1)"}))
            .deserialize()
            .unwrap();
        assert_eq!(params.code, "print(1)");
        assert!(params.filename.is_none());
    }
}
