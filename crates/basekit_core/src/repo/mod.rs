//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the single contract every storage backend implements.
//! - Isolate backend query languages from service orchestration.
//!
//! # Invariants
//! - Lookups return `Ok(None)` for absent records; absence is not an error.
//! - `paginate` counts and fetches with the same predicate.
//! - Repositories never clamp `page`/`count`; callers validate them.
//!
//! # Backends
//! - `sqlite_repo`: relational rows over rusqlite.
//! - `memory_repo`: document collections held in process.

use crate::db::DbError;
use crate::model::record::{Record, RecordId};
use crate::model::schema::{EntitySchema, InvalidFieldError, ValidationError};
use crate::model::value::FieldMap;
use crate::query::descriptor::QueryDescriptor;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory_repo;
pub mod sqlite_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query construction.
#[derive(Debug)]
pub enum RepoError {
    /// Query or write references a field the entity does not declare.
    InvalidField(InvalidFieldError),
    /// Filter or write value cannot be coerced to the declared kind.
    Validation(ValidationError),
    /// Write targeted a record that no longer exists.
    NotFound { entity: String, id: RecordId },
    Db(DbError),
    /// Persisted state cannot be decoded into a record.
    InvalidData(String),
    MissingRequiredTable(String),
    MissingRequiredColumn { table: String, column: String },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidField(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "required table missing: {table}"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column missing: {table}.{column}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidField(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InvalidFieldError> for RepoError {
    fn from(value: InvalidFieldError) -> Self {
        Self::InvalidField(value)
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// What happens to dependent records when a record is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteRule {
    /// Remove only the record; dependents keep their (now dangling) links.
    #[default]
    KeepLinks,
    /// Also remove records declared as dependents on the schema.
    Cascade,
}

/// Storage contract for one entity collection.
pub trait Repository {
    /// Backend-specific compiled query.
    type Query;

    fn schema(&self) -> &EntitySchema;

    /// Compiles a query descriptor into a backend query.
    ///
    /// Unknown filter keys are dropped. Unknown search fields and unknown
    /// includes fail with `RepoError::InvalidField`.
    fn build_filter_query(&self, descriptor: &QueryDescriptor) -> RepoResult<Self::Query>;

    /// Returns `(items, total_count)` for offset `count * (page - 1)` and
    /// limit `count`.
    fn paginate(&self, query: &Self::Query, page: u64, count: u64) -> RepoResult<(Vec<Record>, u64)>;

    /// Returns every record without pagination.
    fn list_all(&self, includes: &BTreeSet<String>) -> RepoResult<Vec<Record>>;

    fn get_by_id(&self, id: RecordId, includes: &BTreeSet<String>) -> RepoResult<Option<Record>>;

    /// First record matching all supplied fields (AND).
    fn get_by_fields(&self, fields: &FieldMap) -> RepoResult<Option<Record>>;

    /// Inserts and returns the persisted record with generated fields.
    fn create(&self, data: FieldMap) -> RepoResult<Record>;

    /// Applies only the supplied keys and returns the updated record.
    fn update(&self, existing: &Record, data: FieldMap) -> RepoResult<Record>;

    fn delete(&self, record: &Record, rule: DeleteRule) -> RepoResult<()>;
}

/// Existence lookup used for foreign-key validation.
///
/// Object-safe view over any [`Repository`], so services can hold sibling
/// repositories of different backends side by side.
pub trait ParentLookup {
    fn entity_name(&self) -> &str;
    fn exists(&self, id: RecordId) -> RepoResult<bool>;
}

impl<R: Repository> ParentLookup for R {
    fn entity_name(&self) -> &str {
        self.schema().name()
    }

    fn exists(&self, id: RecordId) -> RepoResult<bool> {
        Ok(self.get_by_id(id, &BTreeSet::new())?.is_some())
    }
}

/// Rejects write keys the schema does not declare.
pub(crate) fn require_declared_fields(schema: &EntitySchema, data: &FieldMap) -> RepoResult<()> {
    for name in data.keys() {
        if schema.field(name).is_none() {
            return Err(InvalidFieldError::new(schema.name(), name, "not a writable field").into());
        }
    }
    Ok(())
}

/// Validates search fields and includes of a descriptor.
pub(crate) fn check_descriptor(
    schema: &EntitySchema,
    descriptor: &QueryDescriptor,
) -> RepoResult<FieldMap> {
    for field in &descriptor.search_fields {
        schema.require_search_field(field)?;
    }
    schema.require_relations(&descriptor.includes)?;

    let dropped = descriptor
        .filters
        .keys()
        .filter(|name| !schema.has_field(name))
        .cloned()
        .collect::<Vec<_>>();
    if !dropped.is_empty() {
        log::debug!(
            "event=filter_drop module=repo entity={} fields={}",
            schema.name(),
            dropped.join(",")
        );
    }

    Ok(schema.coerce_filters(&descriptor.filters)?)
}
