//! Query descriptor passed to repositories.

use crate::model::value::{FieldMap, FieldValue};
use std::collections::BTreeSet;

/// Intent of one list operation.
///
/// Filters are combined with AND; search fields are combined with OR inside
/// the search predicate; the two groups are combined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDescriptor {
    /// Free text matched as a case-insensitive substring.
    pub search: Option<String>,
    /// Ordered field names the search text is matched against.
    pub search_fields: Vec<String>,
    /// Exact-equality filters.
    pub filters: FieldMap,
    /// Relation names to load eagerly.
    pub includes: BTreeSet<String>,
}

impl QueryDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>, fields: &[&str]) -> Self {
        self.search = Some(text.into());
        self.search_fields = fields.iter().map(|field| field.to_string()).collect();
        self
    }

    pub fn filter(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }

    pub fn include(mut self, relation: impl Into<String>) -> Self {
        self.includes.insert(relation.into());
        self
    }

    /// Search text when both text and field list are non-empty.
    pub fn active_search(&self) -> Option<&str> {
        match self.search.as_deref() {
            Some(text) if !text.is_empty() && !self.search_fields.is_empty() => Some(text),
            _ => None,
        }
    }
}
