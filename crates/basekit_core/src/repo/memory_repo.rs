//! In-process document repository.
//!
//! # Responsibility
//! - Hold document collections keyed by collection name.
//! - Evaluate query descriptors as predicates over stored documents.
//!
//! # Invariants
//! - Search matches the escaped, case-folded text as a regex `.*text.*`
//!   against the case-folded value of each text search field.
//! - Collections keep insertion order; pagination slices that order.
//! - Returned records are copies; callers never alias stored state.

use crate::model::record::{Record, RecordId};
use crate::model::schema::{EntitySchema, RelationDef};
use crate::model::value::{fold_search_text, FieldMap, FieldValue};
use crate::query::descriptor::QueryDescriptor;
use crate::query::pagination::page_offset;
use crate::repo::{
    check_descriptor, require_declared_fields, DeleteRule, RepoError, RepoResult, Repository,
};
use regex::Regex;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

/// Shared document storage for every memory repository built on it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RefCell<BTreeMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection; `0` for unknown collections.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .borrow()
            .get(collection)
            .map_or(0, Vec::len)
    }

    fn find(&self, collection: &str, id: RecordId) -> Option<Record> {
        self.collections
            .borrow()
            .get(collection)
            .and_then(|documents| documents.iter().find(|document| document.id == id))
            .cloned()
    }
}

/// Compiled document predicate for one list query.
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    pub filters: FieldMap,
    /// Search pattern and the fields it is matched against.
    pub search: Option<(Regex, Vec<String>)>,
    pub includes: BTreeSet<String>,
}

impl MemoryQuery {
    fn matches(&self, record: &Record) -> bool {
        let filters_match = self.filters.iter().all(|(name, expected)| {
            record.value_of(name).unwrap_or(FieldValue::Null) == *expected
        });
        if !filters_match {
            return false;
        }

        match &self.search {
            Some((pattern, fields)) => fields.iter().any(|field| {
                record
                    .value_of(field)
                    .and_then(|value| value.search_text())
                    .is_some_and(|text| pattern.is_match(&text))
            }),
            None => true,
        }
    }
}

/// Document repository over one collection of a [`MemoryStore`].
pub struct MemoryRepository<'store> {
    store: &'store MemoryStore,
    schema: EntitySchema,
}

impl<'store> MemoryRepository<'store> {
    pub fn new(store: &'store MemoryStore, schema: EntitySchema) -> Self {
        store
            .collections
            .borrow_mut()
            .entry(schema.name().to_string())
            .or_default();
        Self { store, schema }
    }

    fn snapshot(&self) -> Vec<Record> {
        self.store
            .collections
            .borrow()
            .get(self.schema.name())
            .cloned()
            .unwrap_or_default()
    }

    fn attach_relations(&self, record: &mut Record, includes: &BTreeSet<String>) {
        for include in includes {
            let Some(relation) = self.schema.relation(include) else {
                continue;
            };
            let related = self.load_related(record, relation);
            record.relations.insert(relation.name.clone(), related);
        }
    }

    fn load_related(&self, record: &Record, relation: &RelationDef) -> Option<Record> {
        let id = record
            .get(&relation.field)
            .and_then(FieldValue::as_text)
            .and_then(|text| RecordId::parse_str(text).ok())?;
        self.store.find(&relation.target, id)
    }

    fn not_found(&self, id: RecordId) -> RepoError {
        RepoError::NotFound {
            entity: self.schema.name().to_string(),
            id,
        }
    }
}

impl Repository for MemoryRepository<'_> {
    type Query = MemoryQuery;

    fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    fn build_filter_query(&self, descriptor: &QueryDescriptor) -> RepoResult<MemoryQuery> {
        let filters = check_descriptor(&self.schema, descriptor)?;
        let search = match descriptor.active_search() {
            Some(text) => {
                let escaped = regex::escape(&fold_search_text(text));
                let pattern = Regex::new(&format!(".*{escaped}.*"))
                    .map_err(|err| RepoError::InvalidData(format!("search pattern: {err}")))?;
                Some((pattern, descriptor.search_fields.clone()))
            }
            None => None,
        };

        Ok(MemoryQuery {
            filters,
            search,
            includes: descriptor.includes.clone(),
        })
    }

    fn paginate(&self, query: &MemoryQuery, page: u64, count: u64) -> RepoResult<(Vec<Record>, u64)> {
        let matched = self
            .snapshot()
            .into_iter()
            .filter(|record| query.matches(record))
            .collect::<Vec<_>>();
        let total = matched.len() as u64;

        let offset = usize::try_from(page_offset(page, count)).unwrap_or(usize::MAX);
        let limit = usize::try_from(count).unwrap_or(usize::MAX);
        let mut items = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect::<Vec<_>>();
        for item in &mut items {
            self.attach_relations(item, &query.includes);
        }

        Ok((items, total))
    }

    fn list_all(&self, includes: &BTreeSet<String>) -> RepoResult<Vec<Record>> {
        self.schema.require_relations(includes)?;
        let mut records = self.snapshot();
        for record in &mut records {
            self.attach_relations(record, includes);
        }
        Ok(records)
    }

    fn get_by_id(&self, id: RecordId, includes: &BTreeSet<String>) -> RepoResult<Option<Record>> {
        self.schema.require_relations(includes)?;
        Ok(self.store.find(self.schema.name(), id).map(|mut record| {
            self.attach_relations(&mut record, includes);
            record
        }))
    }

    fn get_by_fields(&self, fields: &FieldMap) -> RepoResult<Option<Record>> {
        for name in fields.keys() {
            self.schema.require_field(name)?;
        }
        let query = MemoryQuery {
            filters: self.schema.coerce_filters(fields)?,
            search: None,
            includes: BTreeSet::new(),
        };
        Ok(self
            .snapshot()
            .into_iter()
            .find(|record| query.matches(record)))
    }

    fn create(&self, data: FieldMap) -> RepoResult<Record> {
        require_declared_fields(&self.schema, &data)?;
        let record = Record::new(data);
        self.store
            .collections
            .borrow_mut()
            .entry(self.schema.name().to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    fn update(&self, existing: &Record, data: FieldMap) -> RepoResult<Record> {
        require_declared_fields(&self.schema, &data)?;

        let mut updated = {
            let mut collections = self.store.collections.borrow_mut();
            let stored = collections
                .get_mut(self.schema.name())
                .and_then(|documents| {
                    documents
                        .iter_mut()
                        .find(|document| document.id == existing.id)
                })
                .ok_or_else(|| self.not_found(existing.id))?;
            stored.apply(data);
            stored.clone()
        };

        let includes = existing.relations.keys().cloned().collect();
        self.attach_relations(&mut updated, &includes);
        Ok(updated)
    }

    fn delete(&self, record: &Record, rule: DeleteRule) -> RepoResult<()> {
        let mut collections = self.store.collections.borrow_mut();
        let documents = collections
            .get_mut(self.schema.name())
            .ok_or_else(|| self.not_found(record.id))?;
        let before = documents.len();
        documents.retain(|document| document.id != record.id);
        if documents.len() == before {
            return Err(self.not_found(record.id));
        }

        if rule == DeleteRule::Cascade {
            let parent_id = record.id.to_string();
            for dependent in self.schema.dependents() {
                if let Some(children) = collections.get_mut(&dependent.collection) {
                    children.retain(|child| {
                        child.get(&dependent.field).and_then(FieldValue::as_text)
                            != Some(parent_id.as_str())
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryRepository, MemoryStore};
    use crate::model::schema::{EntitySchema, FieldKind};
    use crate::model::value::{FieldMap, FieldValue};
    use crate::query::descriptor::QueryDescriptor;
    use crate::repo::Repository;

    fn notes() -> EntitySchema {
        EntitySchema::builder("notes")
            .required("title", FieldKind::Text)
            .build()
            .expect("valid schema")
    }

    fn title(value: &str) -> FieldMap {
        FieldMap::from([("title".to_string(), FieldValue::from(value))])
    }

    #[test]
    fn search_treats_regex_metacharacters_literally() {
        let store = MemoryStore::new();
        let repo = MemoryRepository::new(&store, notes());
        repo.create(title("cost (a+b)")).expect("create");
        repo.create(title("cost ab")).expect("create");

        let query = repo
            .build_filter_query(&QueryDescriptor::new().search("(A+B)", &["title"]))
            .expect("query");
        let (items, total) = repo.paginate(&query, 1, 10).expect("paginate");

        assert_eq!(total, 1);
        assert_eq!(items[0].get("title"), Some(&FieldValue::from("cost (a+b)")));
    }

    #[test]
    fn returned_records_do_not_alias_store() {
        let store = MemoryStore::new();
        let repo = MemoryRepository::new(&store, notes());
        let mut created = repo.create(title("a")).expect("create");
        created.fields.insert("title".to_string(), FieldValue::from("mutated"));

        let stored = repo
            .get_by_id(created.id, &Default::default())
            .expect("lookup")
            .expect("present");
        assert_eq!(stored.get("title"), Some(&FieldValue::from("a")));
        assert_eq!(store.len("notes"), 1);
    }
}
