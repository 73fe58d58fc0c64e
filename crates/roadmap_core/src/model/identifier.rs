//! Identifier scheme and organisation identifier models.
//!
//! # Responsibility
//! - Describe external identifier namespaces (schemes).
//! - Describe identifiers held by an organisation, persisted or proposed.
//!
//! # Invariants
//! - An organisation holds at most one identifier per scheme.
//! - A blank identifier value means "absent" and never persists.
//! - `id == None` marks a proposal that has not been stored yet.

use serde::{Deserialize, Serialize};

pub type IdentifierId = i64;
pub type SchemeId = i64;

/// Scheme name used for federation entity IDs.
pub const SCHEME_SHIBBOLETH: &str = "shibboleth";
/// Scheme name used for Research Organization Registry IDs.
pub const SCHEME_ROR: &str = "ror";
/// Scheme name used for Crossref funder IDs.
pub const SCHEME_FUNDREF: &str = "fundref";

/// External namespace for identifiers. Reference data, never edited here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierScheme {
    pub id: SchemeId,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
}

/// Identifier held by (or proposed for) an organisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    /// Durable row id. `None` until stored.
    pub id: Option<IdentifierId>,
    pub scheme_id: SchemeId,
    pub value: String,
}

impl Identifier {
    /// Builds a proposal that has no durable identity yet.
    pub fn proposed(scheme_id: SchemeId, value: impl Into<String>) -> Self {
        Self {
            id: None,
            scheme_id,
            value: value.into(),
        }
    }

    /// Builds a reference to a stored identifier row.
    pub fn persisted(id: IdentifierId, scheme_id: SchemeId, value: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            scheme_id,
            value: value.into(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Whitespace-only values count as blank.
    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }
}

/// Raw `identifiers_attributes` entry as submitted by a form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierAttributes {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub identifier_scheme_id: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl IdentifierAttributes {
    /// Converts the submitted entry into an identifier proposal.
    ///
    /// Returns `None` when the entry is not identifier-shaped: the scheme
    /// reference is missing or not numeric, or a supplied row id is not
    /// numeric.
    pub fn to_candidate(&self) -> Option<Identifier> {
        let scheme_id = self
            .identifier_scheme_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())?
            .parse::<SchemeId>()
            .ok()?;

        let id = match self.id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<IdentifierId>().ok()?),
        };

        Some(Identifier {
            id,
            scheme_id,
            value: self.value.clone().unwrap_or_default().trim().to_string(),
        })
    }
}
