//! Uniform response envelope.

use crate::error::CrudError;
use crate::query::pagination::PaginationMeta;
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// `{status, message, data, pagination?}` wrapper returned for every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    pub status: ResponseStatus,
    pub message: String,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
}

impl ResponseEnvelope {
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
            data,
            pagination: None,
        }
    }

    pub fn paginated(message: impl Into<String>, data: Value, pagination: PaginationMeta) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::success(message, data)
        }
    }

    /// Error envelope; `data` carries the offending fields when known.
    pub fn from_error(err: &CrudError) -> Self {
        let data = match err {
            CrudError::Duplicate { fields, .. } => Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            CrudError::Validation(validation) => Value::Array(
                validation
                    .issues
                    .iter()
                    .map(|issue| json!({"field": issue.field, "message": issue.message}))
                    .collect(),
            ),
            CrudError::InvalidField(invalid) => json!({"field": invalid.field}),
            _ => Value::Null,
        };
        let message = match err {
            CrudError::Repo(_) => "Internal error".to_string(),
            other => other.to_string(),
        };

        Self {
            status: ResponseStatus::Error,
            message,
            data,
            pagination: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("status".to_string(), json!(self.status));
        object.insert("message".to_string(), Value::String(self.message.clone()));
        object.insert("data".to_string(), self.data.clone());
        if let Some(pagination) = self.pagination {
            object.insert(
                "pagination".to_string(),
                json!({
                    "total_items": pagination.total_items,
                    "total_pages": pagination.total_pages,
                    "current_page": pagination.current_page,
                    "count": pagination.count,
                }),
            );
        }
        Value::Object(object)
    }
}
