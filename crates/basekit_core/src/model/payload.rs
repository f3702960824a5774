//! Write payloads handed to the service.
//!
//! A payload only carries the keys the caller supplied, so dumping it is the
//! "exclude unset" mode partial updates rely on.

use crate::model::schema::{FieldIssue, ValidationError};
use crate::model::value::{FieldMap, FieldValue};

/// Caller-supplied field values for create/update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    values: FieldMap,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one supplied value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Plain field map of the supplied keys only.
    pub fn dump(&self) -> FieldMap {
        self.values.clone()
    }

    /// Builds a payload from a JSON object body.
    ///
    /// Nested arrays/objects are rejected; the core only stores scalars.
    pub fn from_json(entity: &str, body: &serde_json::Value) -> Result<Self, ValidationError> {
        let Some(object) = body.as_object() else {
            return Err(ValidationError::single(
                entity,
                "body",
                "payload must be a JSON object",
            ));
        };

        let mut payload = Self::new();
        let mut issues = Vec::new();
        for (name, value) in object {
            match json_scalar(value) {
                Some(value) => payload.set(name.clone(), value),
                None => issues.push(name.as_str()),
            }
        }

        if !issues.is_empty() {
            return Err(ValidationError {
                entity: entity.to_string(),
                issues: issues
                    .into_iter()
                    .map(|name| FieldIssue::new(name, "nested values are not supported"))
                    .collect(),
            });
        }

        Ok(payload)
    }
}

impl From<FieldMap> for Payload {
    fn from(values: FieldMap) -> Self {
        Self { values }
    }
}

fn json_scalar(value: &serde_json::Value) -> Option<FieldValue> {
    match value {
        serde_json::Value::Null => Some(FieldValue::Null),
        serde_json::Value::Bool(flag) => Some(FieldValue::Bool(*flag)),
        serde_json::Value::Number(number) => number
            .as_i64()
            .map(FieldValue::Integer)
            .or_else(|| number.as_f64().map(FieldValue::Real)),
        serde_json::Value::String(text) => Some(FieldValue::Text(text.clone())),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}
