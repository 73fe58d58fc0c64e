//! Organisation aggregate model.
//!
//! # Responsibility
//! - Define the organisation profile record and the identifiers it owns.
//! - Validate profile fields before persistence.
//!
//! # Invariants
//! - `name` is never blank.
//! - `identifiers` holds at most one entry per scheme.
//! - `links` always serializes to an object with an `org` list.

use crate::model::identifier::{Identifier, SchemeId};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type OrgId = i64;
pub type LanguageId = i64;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

/// Organisation category bit set.
///
/// One organisation can be several kinds at once, e.g. an institution that
/// is also a funder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgTypes(u8);

impl OrgTypes {
    pub const INSTITUTION: Self = Self(1);
    pub const FUNDER: Self = Self(2);
    pub const ORGANISATION: Self = Self(4);
    pub const RESEARCH_INSTITUTE: Self = Self(8);
    pub const PROJECT: Self = Self(16);
    pub const SCHOOL: Self = Self(32);

    const ALL_BITS: u8 = 63;

    /// Builds a set from raw bits, rejecting unknown flags.
    pub fn from_bits(bits: i64) -> Option<Self> {
        u8::try_from(bits)
            .ok()
            .filter(|value| value & !Self::ALL_BITS == 0)
            .map(Self)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// One entry of the organisation link list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgLink {
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub text: String,
}

/// Structured link metadata shown on the organisation profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgLinks {
    #[serde(default)]
    pub org: Vec<OrgLink>,
}

impl OrgLinks {
    /// Decodes the JSON document submitted as `org_links`.
    pub fn from_json(raw: &str) -> Result<Self, OrgValidationError> {
        serde_json::from_str(raw).map_err(|err| OrgValidationError::InvalidLinks(err.to_string()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"org":[]}"#.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.org.is_empty()
    }
}

/// Interface language an organisation can default to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: LanguageId,
    pub abbreviation: String,
    pub name: String,
}

/// Validation errors for organisation profile fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgValidationError {
    BlankName,
    InvalidContactEmail(String),
    InvalidLinks(String),
    InvalidOrgType(String),
    DuplicateScheme(SchemeId),
    BlankIdentifier(SchemeId),
}

impl Display for OrgValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name can't be blank"),
            Self::InvalidContactEmail(value) => {
                write!(f, "contact email `{value}` is not a valid address")
            }
            Self::InvalidLinks(message) => write!(f, "links are not valid JSON: {message}"),
            Self::InvalidOrgType(value) => write!(f, "org type `{value}` is not recognised"),
            Self::DuplicateScheme(scheme_id) => {
                write!(f, "more than one identifier for scheme {scheme_id}")
            }
            Self::BlankIdentifier(scheme_id) => {
                write!(f, "identifier for scheme {scheme_id} has a blank value")
            }
        }
    }
}

impl Error for OrgValidationError {}

/// Fields required to register a new organisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrg {
    pub name: String,
    pub abbreviation: Option<String>,
    pub org_type: OrgTypes,
    pub managed: bool,
}

impl NewOrg {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            abbreviation: None,
            org_type: OrgTypes::INSTITUTION,
            managed: false,
        }
    }
}

/// Organisation aggregate: profile fields plus owned identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Org {
    pub id: OrgId,
    pub name: String,
    pub abbreviation: Option<String>,
    pub contact_email: Option<String>,
    pub contact_name: Option<String>,
    /// Stored logo reference (file name or storage key).
    pub logo: Option<String>,
    pub links: OrgLinks,
    pub org_type: OrgTypes,
    /// Centrally managed by the service operator.
    pub managed: bool,
    pub feedback_enabled: bool,
    pub feedback_msg: Option<String>,
    pub tracker_code: Option<String>,
    pub language_id: Option<LanguageId>,
    pub identifiers: Vec<Identifier>,
}

impl Org {
    /// Returns the identifier held for `scheme_id`, if any.
    pub fn identifier_for_scheme(&self, scheme_id: SchemeId) -> Option<&Identifier> {
        self.identifiers
            .iter()
            .find(|identifier| identifier.scheme_id == scheme_id)
    }

    pub fn is_funder(&self) -> bool {
        self.org_type.contains(OrgTypes::FUNDER)
    }

    /// Validates profile fields and the one-identifier-per-scheme invariant.
    pub fn validate(&self) -> Result<(), OrgValidationError> {
        if self.name.trim().is_empty() {
            return Err(OrgValidationError::BlankName);
        }

        if let Some(email) = self.contact_email.as_deref() {
            if !email.is_empty() && !EMAIL_RE.is_match(email) {
                return Err(OrgValidationError::InvalidContactEmail(email.to_string()));
            }
        }

        let mut seen = Vec::with_capacity(self.identifiers.len());
        for identifier in &self.identifiers {
            if identifier.is_blank() {
                return Err(OrgValidationError::BlankIdentifier(identifier.scheme_id));
            }
            if seen.contains(&identifier.scheme_id) {
                return Err(OrgValidationError::DuplicateScheme(identifier.scheme_id));
            }
            seen.push(identifier.scheme_id);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Org, OrgLinks, OrgTypes, OrgValidationError};
    use crate::model::identifier::Identifier;

    fn sample_org() -> Org {
        Org {
            id: 1,
            name: "University of Example".to_string(),
            abbreviation: Some("UoE".to_string()),
            contact_email: Some("helpdesk@example.ac.uk".to_string()),
            contact_name: None,
            logo: None,
            links: OrgLinks::default(),
            org_type: OrgTypes::INSTITUTION,
            managed: false,
            feedback_enabled: false,
            feedback_msg: None,
            tracker_code: None,
            language_id: None,
            identifiers: Vec::new(),
        }
    }

    #[test]
    fn org_types_reject_unknown_bits() {
        assert_eq!(OrgTypes::from_bits(3), Some(OrgTypes::INSTITUTION.union(OrgTypes::FUNDER)));
        assert_eq!(OrgTypes::from_bits(64), None);
        assert_eq!(OrgTypes::from_bits(-1), None);
    }

    #[test]
    fn links_decode_and_default_to_empty_list() {
        let links = OrgLinks::from_json(r#"{"org":[{"link":"https://x.org","text":"X"}]}"#)
            .expect("valid links");
        assert_eq!(links.org.len(), 1);
        assert_eq!(OrgLinks::from_json("{}").expect("empty object").org.len(), 0);
        assert!(matches!(
            OrgLinks::from_json("not json"),
            Err(OrgValidationError::InvalidLinks(_))
        ));
        assert_eq!(OrgLinks::default().to_json(), r#"{"org":[]}"#);
    }

    #[test]
    fn validate_rejects_blank_name_and_bad_email() {
        let mut org = sample_org();
        org.name = "   ".to_string();
        assert_eq!(org.validate(), Err(OrgValidationError::BlankName));

        let mut org = sample_org();
        org.contact_email = Some("not-an-email".to_string());
        assert!(matches!(
            org.validate(),
            Err(OrgValidationError::InvalidContactEmail(_))
        ));
    }

    #[test]
    fn validate_rejects_two_identifiers_for_one_scheme() {
        let mut org = sample_org();
        org.identifiers = vec![Identifier::proposed(1, "a"), Identifier::proposed(1, "b")];
        assert_eq!(org.validate(), Err(OrgValidationError::DuplicateScheme(1)));
    }
}
