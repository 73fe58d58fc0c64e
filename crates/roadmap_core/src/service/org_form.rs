//! Submitted organisation form and its role-based projection.
//!
//! # Responsibility
//! - Mirror the `org` form fields exactly as submitted.
//! - Project them once into the fields the caller's role may edit.
//!
//! # Invariants
//! - Only super admins receive `PrivilegedFields` (org type, managed flag,
//!   identifier candidates, org lookup selection).
//! - Org lookup helper fields never reach the organisation profile.
//! - Fields that were not submitted leave the stored value untouched.

use crate::model::identifier::IdentifierAttributes;
use crate::model::org::{Org, OrgLinks, OrgTypes, OrgValidationError};
use crate::model::user::Role;
use crate::service::org_selection::OrgSelection;
use serde::Deserialize;

/// Tab the edit page reopens on after a submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTab {
    Profile,
    Feedback,
}

impl EditTab {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Feedback => "feedback",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TrackerAttributes {
    #[serde(default)]
    pub code: Option<String>,
}

/// Raw `org` form submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OrgForm {
    pub name: Option<String>,
    pub abbreviation: Option<String>,
    pub logo: Option<String>,
    pub contact_email: Option<String>,
    pub contact_name: Option<String>,
    pub remove_logo: Option<String>,
    pub org_type: Option<String>,
    pub managed: Option<String>,
    pub feedback_enabled: Option<String>,
    pub org_links: Option<String>,
    pub feedback_email_msg: Option<String>,
    pub org_id: Option<String>,
    pub org_name: Option<String>,
    pub org_crosswalk: Option<String>,
    pub identifiers_attributes: Vec<IdentifierAttributes>,
    pub tracker_attributes: Option<TrackerAttributes>,
}

impl OrgForm {
    /// Feedback tab when the feedback toggle was submitted.
    pub fn tab(&self) -> EditTab {
        if is_present(self.feedback_enabled.as_deref()) {
            EditTab::Feedback
        } else {
            EditTab::Profile
        }
    }

    /// Splits the submission into the fields `role` may edit.
    pub fn project(self, role: Role) -> Result<OrgEdit, OrgValidationError> {
        let privileged = if role == Role::SuperAdmin {
            let org_type = match self.org_type.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(raw) => Some(
                    raw.parse::<i64>()
                        .ok()
                        .and_then(OrgTypes::from_bits)
                        .ok_or_else(|| OrgValidationError::InvalidOrgType(raw.to_string()))?,
                ),
            };
            Some(PrivilegedFields {
                org_type,
                managed: self.managed.as_deref().map(|value| value == "1"),
                identifiers: self.identifiers_attributes,
                selection: OrgSelection::from_form(
                    self.org_id.as_deref(),
                    self.org_name.as_deref(),
                    self.org_crosswalk.as_deref(),
                ),
            })
        } else {
            None
        };

        let links = match self.org_links.as_deref() {
            Some(raw) if is_present(Some(raw)) => Some(OrgLinks::from_json(raw)?),
            _ => None,
        };

        Ok(OrgEdit {
            profile: ProfileFields {
                name: self.name,
                abbreviation: self.abbreviation,
                contact_email: self.contact_email,
                contact_name: self.contact_name,
                logo: self.logo.filter(|value| is_present(Some(value.as_str()))),
                remove_logo: self.remove_logo.as_deref() == Some("1"),
                links,
                feedback_enabled: self
                    .feedback_enabled
                    .as_deref()
                    .map(|value| matches!(value, "1" | "true")),
                feedback_msg: self.feedback_email_msg,
                tracker_code: self.tracker_attributes.and_then(|tracker| tracker.code),
            },
            privileged,
        })
    }
}

/// Fields every authorized editor may change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFields {
    pub name: Option<String>,
    pub abbreviation: Option<String>,
    pub contact_email: Option<String>,
    pub contact_name: Option<String>,
    pub logo: Option<String>,
    pub remove_logo: bool,
    pub links: Option<OrgLinks>,
    pub feedback_enabled: Option<bool>,
    pub feedback_msg: Option<String>,
    pub tracker_code: Option<String>,
}

impl ProfileFields {
    pub fn apply_to(&self, org: &mut Org) {
        if let Some(name) = &self.name {
            org.name = name.trim().to_string();
        }
        if let Some(value) = &self.abbreviation {
            org.abbreviation = optional_text(value);
        }
        if let Some(value) = &self.contact_email {
            org.contact_email = optional_text(value);
        }
        if let Some(value) = &self.contact_name {
            org.contact_name = optional_text(value);
        }
        if self.remove_logo {
            org.logo = None;
        }
        if let Some(logo) = &self.logo {
            org.logo = Some(logo.trim().to_string());
        }
        if let Some(links) = &self.links {
            org.links = links.clone();
        }
        if let Some(enabled) = self.feedback_enabled {
            org.feedback_enabled = enabled;
        }
        if let Some(value) = &self.feedback_msg {
            org.feedback_msg = optional_text(value);
        }
        if let Some(value) = &self.tracker_code {
            org.tracker_code = optional_text(value);
        }
    }
}

/// Fields reserved for super admins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegedFields {
    pub org_type: Option<OrgTypes>,
    pub managed: Option<bool>,
    pub identifiers: Vec<IdentifierAttributes>,
    pub selection: Option<OrgSelection>,
}

impl PrivilegedFields {
    pub fn apply_to(&self, org: &mut Org) {
        if let Some(org_type) = self.org_type {
            org.org_type = org_type;
        }
        if let Some(managed) = self.managed {
            org.managed = managed;
        }
    }
}

/// Role-filtered view of one form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgEdit {
    pub profile: ProfileFields,
    pub privileged: Option<PrivilegedFields>,
}

fn is_present(value: Option<&str>) -> bool {
    value.is_some_and(|value| !value.trim().is_empty())
}

fn optional_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{EditTab, OrgForm};
    use crate::model::identifier::IdentifierAttributes;
    use crate::model::org::{OrgTypes, OrgValidationError};
    use crate::model::user::Role;

    fn privileged_form() -> OrgForm {
        OrgForm {
            name: Some("Renamed".to_string()),
            org_type: Some("3".to_string()),
            managed: Some("1".to_string()),
            org_name: Some("Example".to_string()),
            identifiers_attributes: vec![IdentifierAttributes {
                id: None,
                identifier_scheme_id: Some("1".to_string()),
                value: Some("urn:example".to_string()),
            }],
            ..OrgForm::default()
        }
    }

    #[test]
    fn non_super_admins_lose_privileged_fields() {
        let edit = privileged_form().project(Role::OrgAdmin).expect("projection");
        assert!(edit.privileged.is_none());
        assert_eq!(edit.profile.name.as_deref(), Some("Renamed"));
    }

    #[test]
    fn super_admins_keep_privileged_fields() {
        let edit = privileged_form().project(Role::SuperAdmin).expect("projection");
        let privileged = edit.privileged.expect("privileged fields");
        assert_eq!(
            privileged.org_type,
            Some(OrgTypes::INSTITUTION.union(OrgTypes::FUNDER))
        );
        assert_eq!(privileged.managed, Some(true));
        assert_eq!(privileged.identifiers.len(), 1);
        assert!(privileged.selection.is_some());
    }

    #[test]
    fn unknown_org_type_is_rejected_for_super_admins() {
        let form = OrgForm {
            org_type: Some("128".to_string()),
            ..OrgForm::default()
        };
        assert_eq!(
            form.project(Role::SuperAdmin),
            Err(OrgValidationError::InvalidOrgType("128".to_string()))
        );
    }

    #[test]
    fn feedback_toggle_selects_feedback_tab() {
        let form = OrgForm {
            feedback_enabled: Some("0".to_string()),
            ..OrgForm::default()
        };
        assert_eq!(form.tab(), EditTab::Feedback);
        assert_eq!(OrgForm::default().tab(), EditTab::Profile);
    }

    #[test]
    fn invalid_links_fail_projection() {
        let form = OrgForm {
            org_links: Some("{broken".to_string()),
            ..OrgForm::default()
        };
        assert!(matches!(
            form.project(Role::User),
            Err(OrgValidationError::InvalidLinks(_))
        ));
    }
}
