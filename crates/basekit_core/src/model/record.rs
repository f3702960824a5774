//! Persisted entity record.
//!
//! # Invariants
//! - `id` is generated once at creation and never reused.
//! - `updated_at >= created_at` for every record written by this crate.
//! - `relations` only holds entries explicitly requested as includes.

use crate::model::value::{FieldMap, FieldValue};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier for every persisted record.
pub type RecordId = Uuid;

/// Name of the generated identifier field.
pub const ID_FIELD: &str = "id";
/// Name of the generated creation timestamp field (epoch milliseconds).
pub const CREATED_AT_FIELD: &str = "created_at";
/// Name of the generated update timestamp field (epoch milliseconds).
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Fields generated by the persistence layer and never supplied by payloads.
pub const GENERATED_FIELDS: [&str; 3] = [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

/// One persisted object of a given entity kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: RecordId,
    pub created_at: i64,
    pub updated_at: i64,
    pub fields: FieldMap,
    /// Eagerly loaded related records keyed by relation name.
    ///
    /// `None` means the relation was requested but the foreign key is unset
    /// or points at nothing.
    pub relations: BTreeMap<String, Option<Record>>,
}

impl Record {
    /// Creates a new record with a generated id and fresh timestamps.
    pub fn new(fields: FieldMap) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            fields,
            relations: BTreeMap::new(),
        }
    }

    /// Returns a stored (non-generated) field value.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Returns any field value including generated ones.
    pub fn value_of(&self, name: &str) -> Option<FieldValue> {
        match name {
            ID_FIELD => Some(FieldValue::Text(self.id.to_string())),
            CREATED_AT_FIELD => Some(FieldValue::Integer(self.created_at)),
            UPDATED_AT_FIELD => Some(FieldValue::Integer(self.updated_at)),
            other => self.fields.get(other).cloned(),
        }
    }

    /// Overwrites only the supplied keys and refreshes `updated_at`.
    pub fn apply(&mut self, partial: FieldMap) {
        for (key, value) in partial {
            self.fields.insert(key, value);
        }
        self.updated_at = now_epoch_ms().max(self.created_at);
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
