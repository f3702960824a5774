//! Domain error taxonomy surfaced by services and controllers.
//!
//! # Invariants
//! - Errors propagate unmodified from repository/service to controller.
//! - [`CrudError::status_code`] is the only mapping to transport status.

use crate::model::schema::{InvalidFieldError, ValidationError};
use crate::model::value::FieldValue;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CrudResult<T> = Result<T, CrudError>;

/// Failure of one CRUD operation.
#[derive(Debug)]
pub enum CrudError {
    /// Requested record or foreign-key parent is absent.
    NotFound { entity: String, id: String },
    /// A configured unique field already holds the supplied value.
    Duplicate {
        entity: String,
        fields: Vec<(String, FieldValue)>,
    },
    /// A permission check denied the action.
    Permission { check: String, message: String },
    InvalidField(InvalidFieldError),
    Validation(ValidationError),
    /// Storage failure with no domain meaning.
    Repo(RepoError),
}

impl CrudError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Transport status equivalent.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Duplicate { .. } => 409,
            Self::Permission { .. } => 403,
            Self::InvalidField(_) => 400,
            Self::Validation(_) => 422,
            Self::Repo(_) => 500,
        }
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Duplicate { .. } => "duplicate",
            Self::Permission { .. } => "permission",
            Self::InvalidField(_) => "invalid_field",
            Self::Validation(_) => "validation",
            Self::Repo(_) => "internal",
        }
    }
}

impl Display for CrudError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Duplicate { entity, fields } => {
                let names = fields
                    .iter()
                    .map(|(name, _)| name.as_str())
                    .collect::<Vec<_>>();
                write!(f, "{entity} already exists with {}", names.join(", "))
            }
            Self::Permission { message, .. } => write!(f, "{message}"),
            Self::InvalidField(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CrudError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidField(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InvalidFieldError> for CrudError {
    fn from(value: InvalidFieldError) -> Self {
        Self::InvalidField(value)
    }
}

impl From<ValidationError> for CrudError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for CrudError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound {
                entity,
                id: id.to_string(),
            },
            RepoError::InvalidField(err) => Self::InvalidField(err),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}
