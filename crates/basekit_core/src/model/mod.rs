//! Domain model shared by every CRUD layer.
//!
//! # Responsibility
//! - Define the dynamic record shape (`Record` + `FieldMap`) used by all
//!   backends.
//! - Declare entity schemas and the minimal payload validation layer.
//!
//! # Invariants
//! - Every record is identified by a stable generated `RecordId`.
//! - Generated fields (`id`, `created_at`, `updated_at`) are never writable
//!   through payloads.

pub mod payload;
pub mod record;
pub mod schema;
pub mod value;
