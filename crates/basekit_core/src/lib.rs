//! Generic CRUD orchestration core.
//! Controller -> Service -> Repository over relational and document backends.

pub mod action;
pub mod config;
pub mod context;
pub mod controller;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod permission;
pub mod query;
pub mod repo;
pub mod service;

pub use action::Action;
pub use config::{ConfigError, CrudConfig};
pub use context::{Actor, RequestContext};
pub use controller::crud_controller::CrudController;
pub use controller::envelope::{ResponseEnvelope, ResponseStatus};
pub use controller::params::parse_list_query;
pub use controller::shape::{OutputShape, ServiceOutput};
pub use error::{CrudError, CrudResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use model::payload::Payload;
pub use model::record::{Record, RecordId};
pub use model::schema::{
    EntitySchema, FieldDef, FieldKind, InvalidFieldError, RelationDef, ValidationError,
};
pub use model::value::{FieldMap, FieldValue};
pub use permission::checks::{
    AllowAll, DenyAll, FnCheck, IsActive, IsOwnerOrPrivileged, IsPrivileged, PermissionCheck,
};
pub use permission::gate::PermissionGate;
pub use query::descriptor::QueryDescriptor;
pub use query::pagination::{Page, PaginationMeta};
pub use repo::memory_repo::{MemoryQuery, MemoryRepository, MemoryStore};
pub use repo::sqlite_repo::{SqlQuery, SqliteRepository};
pub use repo::{DeleteRule, ParentLookup, RepoError, RepoResult, Repository};
pub use service::crud_service::{CrudService, ListRequest, ServiceOptions};
pub use service::hooks::{
    ActionRelations, DefaultFilters, FilterHook, NoRelations, PassThroughFilters, RelationHook,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
