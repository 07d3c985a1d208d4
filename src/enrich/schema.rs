//! Shared validation helpers for structured LLM replies. Models wrap their
//! JSON in prose often enough that we always extract the outermost object
//! before parsing.

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("no JSON object in response")]
    NoObject,
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid field {field}: {reason}")]
    Field {
        field: &'static str,
        reason: String,
    },
}

impl SchemaError {
    pub fn field(field: &'static str, reason: impl Into<String>) -> Self {
        SchemaError::Field {
            field,
            reason: reason.into(),
        }
    }
}

/// Slice from the first '{' to the last '}' inclusive.
pub fn json_object_slice(raw: &str) -> Result<&str, SchemaError> {
    let start = raw.find('{').ok_or(SchemaError::NoObject)?;
    let end = raw.rfind('}').ok_or(SchemaError::NoObject)?;
    if end < start {
        return Err(SchemaError::NoObject);
    }
    Ok(&raw[start..=end])
}

/// Every list field must be an array of strings; null and absent both mean
/// empty.
pub fn string_list(
    value: Option<&serde_json::Value>,
    field: &'static str,
) -> Result<Vec<String>, SchemaError> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| SchemaError::field(field, "expected array of strings"))
            })
            .collect(),
        Some(_) => Err(SchemaError::field(field, "expected array of strings")),
    }
}
