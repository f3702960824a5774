//! Entity schema declarations and payload validation.
//!
//! # Responsibility
//! - Declare typed fields, relations and dependents for one collection.
//! - Validate create/partial-update payloads into coerced field maps.
//!
//! # Invariants
//! - Field names are SQL-safe identifiers, unique, and never shadow
//!   generated fields.
//! - Relation foreign-key fields are declared `reference` fields.
//! - Create payloads always yield every required field with a non-null value.

use crate::model::record::{GENERATED_FIELDS, ID_FIELD};
use crate::model::value::{FieldMap, FieldValue};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Declared storage kind for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Real,
    Bool,
    /// Identifier of a record in another collection.
    Reference,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Bool => "bool",
            Self::Reference => "reference",
        }
    }

    /// Coerces a value into this kind.
    ///
    /// Textual input is parsed because transport query strings are untyped.
    /// Returns `None` when the value cannot represent this kind. `Null` is
    /// always accepted; nullability is checked by the caller.
    pub fn coerce(self, value: &FieldValue) -> Option<FieldValue> {
        if value.is_null() {
            return Some(FieldValue::Null);
        }

        match (self, value) {
            (Self::Text, FieldValue::Text(_)) => Some(value.clone()),
            (Self::Integer, FieldValue::Integer(_)) => Some(value.clone()),
            (Self::Integer, FieldValue::Text(raw)) => {
                raw.trim().parse::<i64>().ok().map(FieldValue::Integer)
            }
            (Self::Real, FieldValue::Real(_)) => Some(value.clone()),
            (Self::Real, FieldValue::Integer(number)) => Some(FieldValue::Real(*number as f64)),
            (Self::Real, FieldValue::Text(raw)) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|number| number.is_finite())
                .map(FieldValue::Real),
            (Self::Bool, FieldValue::Bool(_)) => Some(value.clone()),
            (Self::Bool, FieldValue::Integer(0)) => Some(FieldValue::Bool(false)),
            (Self::Bool, FieldValue::Integer(1)) => Some(FieldValue::Bool(true)),
            (Self::Bool, FieldValue::Text(raw)) => {
                match raw.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Some(FieldValue::Bool(true)),
                    "false" | "0" => Some(FieldValue::Bool(false)),
                    _ => None,
                }
            }
            (Self::Reference, FieldValue::Text(raw)) => Uuid::parse_str(raw.trim())
                .ok()
                .map(|id| FieldValue::Text(id.to_string())),
            _ => None,
        }
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

/// A to-one relation loadable as an include.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    /// Include name requested by callers.
    pub name: String,
    /// Local `reference` field holding the related record id.
    pub field: String,
    /// Collection holding the related records.
    pub target: String,
}

/// Child collection whose records point at this entity.
///
/// Used by cascading deletes only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentDef {
    pub collection: String,
    pub field: String,
}

/// Schema of one entity collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    name: String,
    fields: Vec<FieldDef>,
    relations: Vec<RelationDef>,
    dependents: Vec<DependentDef>,
}

impl EntitySchema {
    /// Starts a schema declaration for the given collection name.
    pub fn builder(name: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            relations: Vec::new(),
            dependents: Vec::new(),
        }
    }

    /// Collection (table) name.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }

    pub fn dependents(&self) -> &[DependentDef] {
        &self.dependents
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    /// Whether `name` is a declared or generated field.
    pub fn has_field(&self, name: &str) -> bool {
        GENERATED_FIELDS.contains(&name) || self.field(name).is_some()
    }

    /// Declared kind of a field, including generated ones.
    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        if name == ID_FIELD {
            return Some(FieldKind::Reference);
        }
        if GENERATED_FIELDS.contains(&name) {
            return Some(FieldKind::Integer);
        }
        self.field(name).map(|field| field.kind)
    }

    /// Fails with `InvalidFieldError` when `name` is not a known field.
    pub fn require_field(&self, name: &str) -> Result<(), InvalidFieldError> {
        if self.has_field(name) {
            Ok(())
        } else {
            Err(InvalidFieldError::new(
                self.name.as_str(),
                name,
                "unknown field",
            ))
        }
    }

    /// Fails unless `name` is a declared `text` field.
    pub fn require_search_field(&self, name: &str) -> Result<(), InvalidFieldError> {
        match self.kind_of(name) {
            Some(FieldKind::Text) => Ok(()),
            Some(_) => Err(InvalidFieldError::new(
                self.name.as_str(),
                name,
                "search field must be text",
            )),
            None => self.require_field(name),
        }
    }

    /// Fails with `InvalidFieldError` when an include is not a declared relation.
    pub fn require_relations(&self, includes: &BTreeSet<String>) -> Result<(), InvalidFieldError> {
        for include in includes {
            if self.relation(include).is_none() {
                return Err(InvalidFieldError::new(
                    self.name.as_str(),
                    include,
                    "unknown relation",
                ));
            }
        }
        Ok(())
    }

    /// Validates a full create payload.
    ///
    /// Returns the coerced field map with every declared field present;
    /// omitted optional fields are filled with `Null`.
    pub fn validate_create(&self, payload: &FieldMap) -> Result<FieldMap, ValidationError> {
        let mut issues = Vec::new();
        let mut data = self.coerce_known(payload, &mut issues);

        for field in &self.fields {
            let value = data.entry(field.name.clone()).or_insert(FieldValue::Null);
            if field.required && value.is_null() {
                issues.push(FieldIssue::new(
                    field.name.as_str(),
                    "required field is missing",
                ));
            }
        }

        self.finish(data, issues)
    }

    /// Validates a partial update payload.
    ///
    /// Only supplied keys are returned; required fields cannot be nulled.
    pub fn validate_partial(&self, payload: &FieldMap) -> Result<FieldMap, ValidationError> {
        let mut issues = Vec::new();
        let data = self.coerce_known(payload, &mut issues);

        for (name, value) in &data {
            let required = self.field(name).is_some_and(|field| field.required);
            if required && value.is_null() {
                issues.push(FieldIssue::new(name, "required field cannot be null"));
            }
        }

        self.finish(data, issues)
    }

    /// Coerces filter values against declared kinds.
    ///
    /// Unknown keys are dropped, not reported.
    pub fn coerce_filters(&self, filters: &FieldMap) -> Result<FieldMap, ValidationError> {
        let mut issues = Vec::new();
        let mut coerced = FieldMap::new();
        for (name, value) in filters {
            let Some(kind) = self.kind_of(name) else {
                continue;
            };
            match kind.coerce(value) {
                Some(value) => {
                    coerced.insert(name.clone(), value);
                }
                None => issues.push(FieldIssue::new(
                    name,
                    format!("filter value is not a valid {}", kind.as_str()),
                )),
            }
        }
        self.finish(coerced, issues)
    }

    fn coerce_known(&self, payload: &FieldMap, issues: &mut Vec<FieldIssue>) -> FieldMap {
        let mut data = FieldMap::new();
        for (name, value) in payload {
            if GENERATED_FIELDS.contains(&name.as_str()) {
                issues.push(FieldIssue::new(name, "field is read-only"));
                continue;
            }
            let Some(field) = self.field(name) else {
                issues.push(FieldIssue::new(name, "unknown field"));
                continue;
            };
            match field.kind.coerce(value) {
                Some(value) => {
                    data.insert(name.clone(), value);
                }
                None => issues.push(FieldIssue::new(
                    name,
                    format!("expected {}", field.kind.as_str()),
                )),
            }
        }
        data
    }

    fn finish(&self, data: FieldMap, issues: Vec<FieldIssue>) -> Result<FieldMap, ValidationError> {
        if issues.is_empty() {
            Ok(data)
        } else {
            Err(ValidationError {
                entity: self.name.clone(),
                issues,
            })
        }
    }
}

/// Validating builder for [`EntitySchema`].
#[derive(Debug, Clone)]
pub struct EntitySchemaBuilder {
    name: String,
    fields: Vec<FieldDef>,
    relations: Vec<RelationDef>,
    dependents: Vec<DependentDef>,
}

impl EntitySchemaBuilder {
    pub fn required(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.field(name, kind, true)
    }

    pub fn optional(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.field(name, kind, false)
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind, required: bool) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind,
            required,
        });
        self
    }

    /// Declares a to-one relation backed by a local `reference` field.
    pub fn relation(
        mut self,
        name: impl Into<String>,
        field: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.relations.push(RelationDef {
            name: name.into(),
            field: field.into(),
            target: target.into(),
        });
        self
    }

    /// Declares a child collection removed by cascading deletes.
    pub fn dependent(mut self, collection: impl Into<String>, field: impl Into<String>) -> Self {
        self.dependents.push(DependentDef {
            collection: collection.into(),
            field: field.into(),
        });
        self
    }

    /// Validates declarations and returns the schema.
    pub fn build(self) -> Result<EntitySchema, InvalidFieldError> {
        let entity = self.name.as_str();
        if !IDENTIFIER_RE.is_match(entity) {
            return Err(InvalidFieldError::new(
                entity,
                entity,
                "collection name is not an identifier",
            ));
        }

        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if !IDENTIFIER_RE.is_match(&field.name) {
                return Err(InvalidFieldError::new(
                    entity,
                    &field.name,
                    "field name is not an identifier",
                ));
            }
            if GENERATED_FIELDS.contains(&field.name.as_str()) {
                return Err(InvalidFieldError::new(
                    entity,
                    &field.name,
                    "field name shadows a generated field",
                ));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(InvalidFieldError::new(
                    entity,
                    &field.name,
                    "field declared twice",
                ));
            }
        }

        let mut relation_names = BTreeSet::new();
        for relation in &self.relations {
            let is_reference = self
                .fields
                .iter()
                .any(|field| field.name == relation.field && field.kind == FieldKind::Reference);
            if !is_reference {
                return Err(InvalidFieldError::new(
                    entity,
                    &relation.field,
                    "relation field must be a declared reference field",
                ));
            }
            if !IDENTIFIER_RE.is_match(&relation.target) {
                return Err(InvalidFieldError::new(
                    entity,
                    &relation.target,
                    "relation target is not an identifier",
                ));
            }
            if !relation_names.insert(relation.name.as_str()) {
                return Err(InvalidFieldError::new(
                    entity,
                    &relation.name,
                    "relation declared twice",
                ));
            }
        }

        for dependent in &self.dependents {
            if !IDENTIFIER_RE.is_match(&dependent.collection)
                || !IDENTIFIER_RE.is_match(&dependent.field)
            {
                return Err(InvalidFieldError::new(
                    entity,
                    &dependent.field,
                    "dependent declaration is not an identifier",
                ));
            }
        }

        Ok(EntitySchema {
            name: self.name,
            fields: self.fields,
            relations: self.relations,
            dependents: self.dependents,
        })
    }
}

/// A filter, search field, include or declaration references an unknown or
/// malformed field. Caller or configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFieldError {
    pub entity: String,
    pub field: String,
    pub reason: String,
}

impl InvalidFieldError {
    pub fn new(entity: &str, field: &str, reason: impl Into<String>) -> Self {
        Self {
            entity: entity.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl Display for InvalidFieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid field `{}` on {}: {}",
            self.field, self.entity, self.reason
        )
    }
}

impl Error for InvalidFieldError {}

/// One rejected payload field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Payload failed schema constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub entity: String,
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn single(entity: &str, field: &str, message: impl Into<String>) -> Self {
        Self {
            entity: entity.to_string(),
            issues: vec![FieldIssue::new(field, message)],
        }
    }

    /// Whether any issue names the given field.
    pub fn mentions(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation failed for {}", self.entity)?;
        for (index, issue) in self.issues.iter().enumerate() {
            let separator = if index == 0 { ": " } else { "; " };
            write!(f, "{separator}{}: {}", issue.field, issue.message)?;
        }
        Ok(())
    }
}

impl Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::{EntitySchema, FieldKind};
    use crate::model::value::{FieldMap, FieldValue};

    fn users() -> EntitySchema {
        EntitySchema::builder("users")
            .required("name", FieldKind::Text)
            .required("email", FieldKind::Text)
            .optional("age", FieldKind::Integer)
            .optional("role_id", FieldKind::Reference)
            .relation("role", "role_id", "roles")
            .build()
            .expect("valid schema")
    }

    fn map(pairs: &[(&str, FieldValue)]) -> FieldMap {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn builder_rejects_generated_and_duplicate_fields() {
        let err = EntitySchema::builder("users")
            .required("id", FieldKind::Text)
            .build()
            .expect_err("id is generated");
        assert_eq!(err.field, "id");

        let err = EntitySchema::builder("users")
            .required("name", FieldKind::Text)
            .optional("name", FieldKind::Text)
            .build()
            .expect_err("duplicate field");
        assert!(err.reason.contains("twice"));
    }

    #[test]
    fn builder_rejects_non_identifier_names() {
        let err = EntitySchema::builder("users")
            .required("name; DROP TABLE users", FieldKind::Text)
            .build()
            .expect_err("unsafe name");
        assert!(err.reason.contains("identifier"));
    }

    #[test]
    fn builder_requires_relation_fields_to_be_references() {
        let err = EntitySchema::builder("users")
            .required("role_id", FieldKind::Text)
            .relation("role", "role_id", "roles")
            .build()
            .expect_err("text field cannot back relation");
        assert_eq!(err.field, "role_id");
    }

    #[test]
    fn validate_create_fills_optionals_and_reports_missing_required() {
        let schema = users();
        let data = schema
            .validate_create(&map(&[
                ("name", FieldValue::from("A")),
                ("email", FieldValue::from("a@x.io")),
            ]))
            .expect("valid payload");
        assert_eq!(data.get("age"), Some(&FieldValue::Null));

        let err = schema
            .validate_create(&map(&[("name", FieldValue::from("A"))]))
            .expect_err("email missing");
        assert!(err.mentions("email"));
    }

    #[test]
    fn validate_create_coerces_text_and_rejects_unknown_fields() {
        let schema = users();
        let data = schema
            .validate_create(&map(&[
                ("name", FieldValue::from("A")),
                ("email", FieldValue::from("a@x.io")),
                ("age", FieldValue::from("31")),
            ]))
            .expect("coercible payload");
        assert_eq!(data.get("age"), Some(&FieldValue::Integer(31)));

        let err = schema
            .validate_create(&map(&[
                ("name", FieldValue::from("A")),
                ("email", FieldValue::from("a@x.io")),
                ("nickname", FieldValue::from("a")),
                ("created_at", FieldValue::Integer(1)),
            ]))
            .expect_err("unknown and read-only fields");
        assert!(err.mentions("nickname"));
        assert!(err.mentions("created_at"));
    }

    #[test]
    fn validate_partial_keeps_only_supplied_keys() {
        let schema = users();
        let data = schema
            .validate_partial(&map(&[("age", FieldValue::Integer(31))]))
            .expect("partial payload");
        assert_eq!(data.len(), 1);

        let err = schema
            .validate_partial(&map(&[("name", FieldValue::Null)]))
            .expect_err("required cannot be nulled");
        assert!(err.mentions("name"));
    }

    #[test]
    fn search_fields_must_be_declared_text() {
        let schema = users();
        assert!(schema.require_search_field("email").is_ok());
        let err = schema.require_search_field("age").expect_err("integer field");
        assert_eq!(err.field, "age");
        assert!(schema.require_search_field("role_id").is_err());
        assert!(schema.require_search_field("nickname").is_err());
    }

    #[test]
    fn coerce_filters_drops_unknown_keys_and_rejects_bad_values() {
        let schema = users();
        let coerced = schema
            .coerce_filters(&map(&[
                ("age", FieldValue::from("30")),
                ("nope", FieldValue::from("x")),
            ]))
            .expect("filters coerce");
        assert_eq!(coerced.len(), 1);
        assert_eq!(coerced.get("age"), Some(&FieldValue::Integer(30)));

        let err = schema
            .coerce_filters(&map(&[("age", FieldValue::from("thirty"))]))
            .expect_err("non-numeric filter");
        assert!(err.mentions("age"));
    }

    #[test]
    fn reference_coercion_normalizes_uuid_text() {
        let coerced = FieldKind::Reference
            .coerce(&FieldValue::from("6F9619FF-8B86-D011-B42D-00C04FC964FF"))
            .expect("uuid parses");
        assert_eq!(
            coerced,
            FieldValue::from("6f9619ff-8b86-d011-b42d-00c04fc964ff")
        );
        assert_eq!(
            FieldKind::Reference.coerce(&FieldValue::from("nope")),
            None
        );
    }
}
