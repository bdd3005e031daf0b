//! Field-level schemas for tool inputs and outputs.
//!
//! Each tool declares the shape of its argument and result objects; the
//! registry checks values against these shapes on both sides of every
//! invocation. Deliberately closed: undeclared fields are violations.

use serde_json::Value;

/// Expected JSON type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Number,
    Bool,
    Array,
    Object,
}

impl ValueKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// One declared field.
#[derive(Debug, Clone)]
struct FieldSpec {
    name: String,
    kind: ValueKind,
    required: bool,
}

/// Declared shape of a tool's input or output object.
#[derive(Debug, Clone, Default)]
pub struct ToolSchema {
    fields: Vec<FieldSpec>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required field.
    pub fn field(mut self, name: &str, kind: ValueKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            kind,
            required: true,
        });
        self
    }

    /// Declare an optional field.
    pub fn optional(mut self, name: &str, kind: ValueKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            kind,
            required: false,
        });
        self
    }

    /// Check a value against the schema. Returns the first violation as a
    /// message.
    pub fn validate(&self, value: &Value) -> std::result::Result<(), String> {
        let object = match value.as_object() {
            Some(map) => map,
            None => return Err("expected a JSON object".to_string()),
        };

        for field in &self.fields {
            match object.get(&field.name) {
                Some(v) if v.is_null() && !field.required => {}
                Some(v) if !field.kind.matches(v) => {
                    return Err(format!(
                        "field '{}' expected {}, got {}",
                        field.name,
                        field.kind.name(),
                        json_type_name(v)
                    ));
                }
                Some(_) => {}
                None if field.required => {
                    return Err(format!("missing required field '{}'", field.name));
                }
                None => {}
            }
        }

        for key in object.keys() {
            if !self.fields.iter().any(|f| &f.name == key) {
                return Err(format!("undeclared field '{}'", key));
            }
        }

        Ok(())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ToolSchema {
        ToolSchema::new()
            .field("query", ValueKind::String)
            .optional("top_k", ValueKind::Number)
    }

    #[test]
    fn test_valid_arguments() {
        assert!(schema().validate(&json!({"query": "expenses"})).is_ok());
        assert!(schema()
            .validate(&json!({"query": "expenses", "top_k": 3}))
            .is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let err = schema().validate(&json!({"top_k": 3})).unwrap_err();
        assert!(err.contains("query"));
    }

    #[test]
    fn test_wrong_type() {
        let err = schema().validate(&json!({"query": 42})).unwrap_err();
        assert!(err.contains("expected string"));
    }

    #[test]
    fn test_undeclared_field_rejected() {
        let err = schema()
            .validate(&json!({"query": "x", "verbose": true}))
            .unwrap_err();
        assert!(err.contains("undeclared"));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(schema().validate(&json!("just a string")).is_err());
        assert!(schema().validate(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_null_optional_allowed() {
        assert!(schema()
            .validate(&json!({"query": "x", "top_k": null}))
            .is_ok());
    }
}
