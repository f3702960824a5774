//! Request-scoped inputs supplied by the transport layer.

use crate::model::value::{FieldMap, FieldValue};
use std::collections::BTreeMap;

/// Authenticated caller and the attributes permission checks read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Actor {
    pub id: String,
    pub attributes: FieldMap,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: FieldMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// `true` only for a boolean attribute set to `true`.
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.attributes.get(name), Some(FieldValue::Bool(true)))
    }
}

/// Everything the core reads from one incoming request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    /// `None` for anonymous requests.
    pub actor: Option<Actor>,
    pub path_params: BTreeMap<String, String>,
    /// Raw query string pairs (`page`, `count`, `search`, filters).
    pub query_params: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }
}
