//! Service layer orchestrating one repository.
//!
//! # Responsibility
//! - Enforce business rules independent of transport and storage dialect.
//! - Keep the write pipeline order: existence, duplicate, foreign key, write.

pub mod crud_service;
pub mod hooks;
