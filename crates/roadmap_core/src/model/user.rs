//! User account model used for authorization and federated sign-in.
//!
//! # Invariants
//! - `provider` and `uid` are either both unset or both set, each at most
//!   255 characters.

use crate::model::org::OrgId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type UserId = i64;

/// Column limit for omniauth `provider` and `uid`.
pub const OMNIAUTH_FIELD_MAX_CHARS: usize = 255;

/// Administrative role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    OrgAdmin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::OrgAdmin => "org_admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "org_admin" => Some(Self::OrgAdmin),
            "super_admin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }
}

/// Federated identity linked to a user (`provider` + `uid`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmniauthIdentity {
    pub provider: String,
    pub uid: String,
}

impl OmniauthIdentity {
    pub fn new(provider: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            uid: uid.into(),
        }
    }

    pub fn validate(&self) -> Result<(), UserValidationError> {
        for (field, value) in [("provider", &self.provider), ("uid", &self.uid)] {
            if value.trim().is_empty() {
                return Err(UserValidationError::BlankField(field));
            }
            if value.chars().count() > OMNIAUTH_FIELD_MAX_CHARS {
                return Err(UserValidationError::FieldTooLong {
                    field,
                    max_chars: OMNIAUTH_FIELD_MAX_CHARS,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub org_id: Option<OrgId>,
    pub role: Role,
    pub identity: Option<OmniauthIdentity>,
}

impl User {
    pub fn can_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    pub fn can_org_admin(&self) -> bool {
        matches!(self.role, Role::OrgAdmin | Role::SuperAdmin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub org_id: Option<OrgId>,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    BlankField(&'static str),
    FieldTooLong {
        field: &'static str,
        max_chars: usize,
    },
}

impl Display for UserValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "{field} can't be blank"),
            Self::FieldTooLong { field, max_chars } => {
                write!(f, "{field} is longer than {max_chars} characters")
            }
        }
    }
}

impl Error for UserValidationError {}
