//! Generic CRUD service over any [`Repository`].
//!
//! # Responsibility
//! - Build query descriptors for list requests and compute pagination.
//! - Validate payloads, uniqueness and foreign keys before writes.
//! - Map repository errors into the [`CrudError`] taxonomy.
//!
//! # Invariants
//! - Write order: payload validation, existence, duplicate, foreign key,
//!   write. The first failure returns before any storage mutation.
//! - Partial updates only touch keys present in the payload.
//! - Uniqueness and foreign-key checks are not atomic with the write; a
//!   concurrent writer can slip in between check and write.

use crate::action::Action;
use crate::config::CrudConfig;
use crate::error::{CrudError, CrudResult};
use crate::model::payload::Payload;
use crate::model::record::{Record, RecordId};
use crate::model::schema::{FieldKind, InvalidFieldError, ValidationError};
use crate::model::value::{FieldMap, FieldValue};
use crate::query::descriptor::QueryDescriptor;
use crate::query::pagination::{Page, PaginationMeta};
use crate::repo::{DeleteRule, ParentLookup, Repository};
use crate::service::hooks::{FilterHook, NoRelations, PassThroughFilters, RelationHook};
use log::{info, warn};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Foreign-key field validated against a sibling repository.
pub struct ForeignKey<'a> {
    pub field: String,
    pub parent: &'a dyn ParentLookup,
}

/// Construction-time behavior of a [`CrudService`].
pub struct ServiceOptions<'a> {
    /// Fields free-text search is matched against, in order.
    pub search_fields: Vec<String>,
    /// Fields that must be unique across the collection.
    pub duplicate_check_fields: Vec<String>,
    pub foreign_keys: Vec<ForeignKey<'a>>,
    pub filter_hook: Box<dyn FilterHook + 'a>,
    pub relation_hook: Box<dyn RelationHook + 'a>,
    pub config: CrudConfig,
}

impl Default for ServiceOptions<'_> {
    fn default() -> Self {
        Self {
            search_fields: Vec::new(),
            duplicate_check_fields: Vec::new(),
            foreign_keys: Vec::new(),
            filter_hook: Box::new(PassThroughFilters),
            relation_hook: Box::new(NoRelations),
            config: CrudConfig::default(),
        }
    }
}

impl<'a> ServiceOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_fields(mut self, fields: &[&str]) -> Self {
        self.search_fields = fields.iter().map(|field| field.to_string()).collect();
        self
    }

    pub fn unique(mut self, fields: &[&str]) -> Self {
        self.duplicate_check_fields = fields.iter().map(|field| field.to_string()).collect();
        self
    }

    pub fn foreign_key(mut self, field: impl Into<String>, parent: &'a dyn ParentLookup) -> Self {
        self.foreign_keys.push(ForeignKey {
            field: field.into(),
            parent,
        });
        self
    }

    pub fn filter_hook(mut self, hook: impl FilterHook + 'a) -> Self {
        self.filter_hook = Box::new(hook);
        self
    }

    pub fn relation_hook(mut self, hook: impl RelationHook + 'a) -> Self {
        self.relation_hook = Box::new(hook);
        self
    }

    pub fn config(mut self, config: CrudConfig) -> Self {
        self.config = config;
        self
    }
}

/// Parsed list request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub search: Option<String>,
    pub page: u64,
    pub count: u64,
    pub filters: FieldMap,
}

impl ListRequest {
    pub fn new(page: u64, count: u64) -> Self {
        Self {
            search: None,
            page,
            count,
            filters: FieldMap::new(),
        }
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn filter(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }
}

/// Orchestrates one repository.
pub struct CrudService<'a, R: Repository> {
    repo: R,
    options: ServiceOptions<'a>,
}

impl<'a, R: Repository> CrudService<'a, R> {
    /// Creates a service after checking the options against the schema.
    ///
    /// # Errors
    /// - `InvalidField` when a search, unique or foreign-key field is not
    ///   declared, or a foreign-key field is not a `reference` field.
    /// - `Validation` when the pagination config is inconsistent.
    pub fn try_new(repo: R, options: ServiceOptions<'a>) -> CrudResult<Self> {
        let schema = repo.schema();
        for field in &options.search_fields {
            schema.require_search_field(field)?;
        }
        for field in &options.duplicate_check_fields {
            schema.require_field(field)?;
        }
        for foreign_key in &options.foreign_keys {
            if schema.kind_of(&foreign_key.field) != Some(FieldKind::Reference) {
                return Err(InvalidFieldError::new(
                    schema.name(),
                    &foreign_key.field,
                    "foreign key must be a reference field",
                )
                .into());
            }
        }
        options
            .config
            .validate()
            .map_err(|err| ValidationError::single(schema.name(), "config", err.to_string()))?;

        Ok(Self { repo, options })
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn config(&self) -> &CrudConfig {
        &self.options.config
    }

    fn entity(&self) -> &str {
        self.repo.schema().name()
    }

    /// Lists one page of records matching search and filters.
    pub fn list(&self, request: &ListRequest) -> CrudResult<Page<Record>> {
        self.check_page(request.page, request.count)?;

        let descriptor = QueryDescriptor {
            search: request.search.clone(),
            search_fields: self.options.search_fields.clone(),
            filters: self
                .options
                .filter_hook
                .filters(Action::List, request.filters.clone()),
            includes: self.includes_for(Action::List),
        };
        let query = self.repo.build_filter_query(&descriptor)?;
        let (items, total_items) = self.repo.paginate(&query, request.page, request.count)?;

        info!(
            "event=crud_list module=service status=ok entity={} page={} count={} returned={} total={}",
            self.entity(),
            request.page,
            request.count,
            items.len(),
            total_items
        );

        Ok(Page {
            items,
            pagination: PaginationMeta::new(total_items, request.page, request.count),
        })
    }

    /// Every record, unpaginated, with list includes.
    pub fn list_all(&self) -> CrudResult<Vec<Record>> {
        Ok(self.repo.list_all(&self.includes_for(Action::List))?)
    }

    pub fn retrieve(&self, id: &str) -> CrudResult<Record> {
        self.load(id, &self.includes_for(Action::Retrieve))
    }

    /// Creates a record using the configured unique fields.
    pub fn create(&self, payload: &Payload) -> CrudResult<Record> {
        let fields = self
            .options
            .duplicate_check_fields
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>();
        self.create_with(payload, &fields)
    }

    /// Creates a record checking uniqueness on `duplicate_check_fields`.
    pub fn create_with(
        &self,
        payload: &Payload,
        duplicate_check_fields: &[&str],
    ) -> CrudResult<Record> {
        let data = self.repo.schema().validate_create(&payload.dump())?;
        self.check_duplicate(&data, duplicate_check_fields, None)?;
        self.check_foreign_keys(&data)?;

        let created = self.repo.create(data)?;
        info!(
            "event=crud_create module=service status=ok entity={} id={}",
            self.entity(),
            created.id
        );
        self.with_includes(created, Action::Create)
    }

    /// Applies a partial update to an existing record.
    pub fn update(&self, id: &str, payload: &Payload) -> CrudResult<Record> {
        let data = self.repo.schema().validate_partial(&payload.dump())?;
        let existing = self.load(id, &self.includes_for(Action::Update))?;

        let unique = self
            .options
            .duplicate_check_fields
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>();
        if unique.iter().any(|field| data.contains_key(*field)) {
            let mut candidate = existing.fields.clone();
            candidate.extend(data.iter().map(|(name, value)| (name.clone(), value.clone())));
            self.check_duplicate(&candidate, &unique, Some(existing.id))?;
        }
        self.check_foreign_keys(&data)?;

        let updated = self.repo.update(&existing, data)?;
        info!(
            "event=crud_update module=service status=ok entity={} id={}",
            self.entity(),
            updated.id
        );
        Ok(updated)
    }

    /// Deletes using the configured delete rule.
    pub fn delete(&self, id: &str) -> CrudResult<()> {
        self.delete_with_rule(id, self.options.config.delete_rule)
    }

    pub fn delete_with_rule(&self, id: &str, rule: DeleteRule) -> CrudResult<()> {
        let existing = self.load(id, &BTreeSet::new())?;
        self.repo.delete(&existing, rule)?;
        info!(
            "event=crud_delete module=service status=ok entity={} id={} cascade={}",
            self.entity(),
            existing.id,
            rule == DeleteRule::Cascade
        );
        Ok(())
    }

    fn includes_for(&self, action: Action) -> BTreeSet<String> {
        self.options.relation_hook.relations_for(action)
    }

    fn load(&self, id: &str, includes: &BTreeSet<String>) -> CrudResult<Record> {
        let not_found = || CrudError::not_found(self.entity(), id);
        let record_id = Uuid::parse_str(id.trim()).map_err(|_| not_found())?;
        self.repo
            .get_by_id(record_id, includes)?
            .ok_or_else(not_found)
    }

    fn with_includes(&self, record: Record, action: Action) -> CrudResult<Record> {
        let includes = self.includes_for(action);
        if includes.is_empty() {
            return Ok(record);
        }
        self.repo
            .get_by_id(record.id, &includes)?
            .ok_or_else(|| CrudError::not_found(self.entity(), record.id))
    }

    fn check_page(&self, page: u64, count: u64) -> CrudResult<()> {
        let max_count = self.options.config.max_count;
        if page == 0 {
            return Err(ValidationError::single(self.entity(), "page", "page must be at least 1").into());
        }
        if count == 0 || count > max_count {
            return Err(ValidationError::single(
                self.entity(),
                "count",
                format!("count must be between 1 and {max_count}"),
            )
            .into());
        }
        Ok(())
    }

    /// Fails when another record already holds the supplied unique values.
    ///
    /// Only fields present with a non-null value take part; `exclude` skips
    /// the record being updated.
    fn check_duplicate(
        &self,
        data: &FieldMap,
        fields: &[&str],
        exclude: Option<RecordId>,
    ) -> CrudResult<()> {
        let probe = fields
            .iter()
            .filter_map(|field| {
                data.get(*field)
                    .filter(|value| !value.is_null())
                    .map(|value| (field.to_string(), value.clone()))
            })
            .collect::<FieldMap>();
        if probe.is_empty() {
            return Ok(());
        }

        let conflict = match exclude {
            None => self.repo.get_by_fields(&probe)?,
            Some(own_id) => {
                let query = self.repo.build_filter_query(&QueryDescriptor {
                    filters: probe.clone(),
                    ..QueryDescriptor::default()
                })?;
                let (matches, _) = self.repo.paginate(&query, 1, 2)?;
                matches.into_iter().find(|record| record.id != own_id)
            }
        };

        match conflict {
            Some(existing) => {
                warn!(
                    "event=crud_duplicate module=service status=error entity={} existing_id={} fields={}",
                    self.entity(),
                    existing.id,
                    probe.keys().cloned().collect::<Vec<_>>().join(",")
                );
                Err(CrudError::Duplicate {
                    entity: self.entity().to_string(),
                    fields: probe.into_iter().collect(),
                })
            }
            None => Ok(()),
        }
    }

    /// Fails with `NotFound` naming the first missing parent.
    fn check_foreign_keys(&self, data: &FieldMap) -> CrudResult<()> {
        for foreign_key in &self.options.foreign_keys {
            let Some(FieldValue::Text(raw)) = data.get(&foreign_key.field) else {
                continue;
            };
            let parent = foreign_key.parent;
            let exists = match Uuid::parse_str(raw) {
                Ok(parent_id) => parent.exists(parent_id)?,
                Err(_) => false,
            };
            if !exists {
                warn!(
                    "event=crud_foreign_key module=service status=error entity={} field={} parent={}",
                    self.entity(),
                    foreign_key.field,
                    parent.entity_name()
                );
                return Err(CrudError::not_found(parent.entity_name(), raw));
            }
        }
        Ok(())
    }
}
