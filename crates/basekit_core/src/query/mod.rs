//! List-query intent and pagination arithmetic.
//!
//! # Responsibility
//! - Carry search/filter/include intent from service to repository.
//! - Compute page offsets and pagination metadata.
//!
//! # Invariants
//! - Search is active only with non-empty text and non-empty field list.
//! - `total_pages = ceil(total_items / count)`, `0` when there are no items.

pub mod descriptor;
pub mod pagination;
