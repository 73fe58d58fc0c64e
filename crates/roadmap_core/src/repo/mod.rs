//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Organisation writes validate the aggregate before SQL mutations.
//! - Repository APIs return semantic errors (`OrgNotFound`,
//!   `DuplicateIdentifier`) in addition to DB transport errors.

use crate::db::DbError;
use crate::model::identifier::SchemeId;
use crate::model::org::{OrgId, OrgValidationError};
use crate::model::user::{UserId, UserValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod identifier_repo;
pub mod org_repo;
pub mod session_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by organisation, identifier and user storage.
#[derive(Debug)]
pub enum RepoError {
    Validation(OrgValidationError),
    UserValidation(UserValidationError),
    Db(DbError),
    OrgNotFound(OrgId),
    UserNotFound(UserId),
    /// Storage-level uniqueness guard on `(org_id, identifier_scheme_id)` fired.
    DuplicateIdentifier {
        org_id: OrgId,
        scheme_id: SchemeId,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::UserValidation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::OrgNotFound(id) => write!(f, "org not found: {id}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::DuplicateIdentifier { org_id, scheme_id } => write!(
                f,
                "org {org_id} already holds an identifier for scheme {scheme_id}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::UserValidation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<OrgValidationError> for RepoError {
    fn from(value: OrgValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<UserValidationError> for RepoError {
    fn from(value: UserValidationError) -> Self {
        Self::UserValidation(value)
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

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}
