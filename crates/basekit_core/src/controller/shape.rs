//! Output shaping of service results into JSON.

use crate::model::record::{Record, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// What a service operation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceOutput {
    Records(Vec<Record>),
    Record(Record),
    /// Already primitive (or null); passed through unchanged.
    Value(Value),
}

/// Exposed view of a record.
///
/// Loaded relations are always rendered; related records use the full
/// shape since their schema is not known here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputShape {
    /// `None` exposes every field.
    only: Option<Vec<String>>,
    hidden: BTreeSet<String>,
}

impl OutputShape {
    /// Exposes generated and stored fields.
    pub fn all() -> Self {
        Self::default()
    }

    /// Exposes only the listed fields.
    pub fn only(fields: &[&str]) -> Self {
        Self {
            only: Some(fields.iter().map(|field| field.to_string()).collect()),
            hidden: BTreeSet::new(),
        }
    }

    /// Drops the listed fields from the exposed set.
    pub fn hiding(mut self, fields: &[&str]) -> Self {
        self.hidden
            .extend(fields.iter().map(|field| field.to_string()));
        self
    }

    pub fn render(&self, output: ServiceOutput) -> Value {
        match output {
            ServiceOutput::Records(records) => Value::Array(
                records
                    .iter()
                    .map(|record| self.render_record(record))
                    .collect(),
            ),
            ServiceOutput::Record(record) => self.render_record(&record),
            ServiceOutput::Value(value) => value,
        }
    }

    pub fn render_record(&self, record: &Record) -> Value {
        let names = match &self.only {
            Some(only) => only.clone(),
            None => [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD]
                .into_iter()
                .map(String::from)
                .chain(record.fields.keys().cloned())
                .collect(),
        };

        let mut object = Map::new();
        for name in names {
            if self.hidden.contains(&name) {
                continue;
            }
            if let Some(value) = record.value_of(&name) {
                object.insert(name, value.to_json());
            }
        }

        let full = Self::all();
        for (relation, related) in &record.relations {
            let value = related
                .as_ref()
                .map_or(Value::Null, |related| full.render_record(related));
            object.insert(relation.clone(), value);
        }

        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::{OutputShape, ServiceOutput};
    use crate::model::record::Record;
    use crate::model::value::{FieldMap, FieldValue};
    use serde_json::{json, Value};

    fn record() -> Record {
        Record::new(FieldMap::from([
            ("name".to_string(), FieldValue::from("A")),
            ("password".to_string(), FieldValue::from("secret")),
        ]))
    }

    #[test]
    fn hiding_removes_fields_and_keeps_generated_ones() {
        let rendered = OutputShape::all()
            .hiding(&["password"])
            .render(ServiceOutput::Record(record()));
        assert!(rendered.get("password").is_none());
        assert_eq!(rendered["name"], json!("A"));
        assert!(rendered.get("id").is_some());
    }

    #[test]
    fn relations_render_null_when_absent() {
        let mut with_relation = record();
        with_relation.relations.insert("role".to_string(), None);
        let rendered = OutputShape::only(&["name"]).render(ServiceOutput::Record(with_relation));
        assert_eq!(rendered, json!({"name": "A", "role": null}));
    }

    #[test]
    fn primitives_pass_through() {
        assert_eq!(
            OutputShape::all().render(ServiceOutput::Value(Value::Null)),
            Value::Null
        );
    }
}
