//! Organisation administration use-cases.
//!
//! # Responsibility
//! - Build the admin edit view for one organisation.
//! - Apply a submitted org form: authorize, project by role, collect
//!   identifier candidates, then save profile and identifiers atomically.
//!
//! # Invariants
//! - Authorization happens before any field is applied.
//! - Nothing is persisted when validation fails.
//! - Identifier candidates come from privileged fields only.

use crate::config::ShibbolethConfig;
use crate::model::identifier::{
    Identifier, IdentifierAttributes, IdentifierId, SCHEME_SHIBBOLETH,
};
use crate::model::org::{Language, Org, OrgId, OrgValidationError};
use crate::model::user::User;
use crate::policy::{Authorizer, OrgAction};
use crate::reconcile::IdentifierAction;
use crate::repo::identifier_repo::IdentifierRepository;
use crate::repo::org_repo::OrgRepository;
use crate::repo::RepoError;
use crate::service::org_form::{EditTab, OrgForm, PrivilegedFields};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for organisation administration.
#[derive(Debug)]
pub enum OrgServiceError {
    OrgNotFound(OrgId),
    Forbidden { action: OrgAction, org_id: OrgId },
    Validation(OrgValidationError),
    Repo(RepoError),
}

impl Display for OrgServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrgNotFound(id) => write!(f, "org not found: {id}"),
            Self::Forbidden { action, org_id } => {
                write!(f, "not allowed to {} org {org_id}", action.as_str())
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OrgServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for OrgServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::OrgNotFound(id) => Self::OrgNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<OrgValidationError> for OrgServiceError {
    fn from(value: OrgValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Data rendered by the admin edit page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgEditView {
    pub org: Org,
    pub languages: Vec<Language>,
    /// Form method, always `PUT`.
    pub method: &'static str,
    /// Form target.
    pub url: String,
}

/// Result of a successful admin update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub org: Org,
    pub tab: EditTab,
    pub actions: Vec<IdentifierAction>,
}

/// Path of the admin edit page for `org_id`.
pub fn admin_edit_path(org_id: OrgId) -> String {
    format!("/org/admin/{org_id}/admin_edit")
}

/// Path the admin edit form submits to.
pub fn admin_update_path(org_id: OrgId) -> String {
    format!("/org/admin/{org_id}/admin_update")
}

/// Organisation administration facade over repository implementations.
pub struct OrgService<R, A>
where
    R: OrgRepository + IdentifierRepository,
    A: Authorizer,
{
    repo: R,
    authorizer: A,
    shibboleth: ShibbolethConfig,
}

impl<R, A> OrgService<R, A>
where
    R: OrgRepository + IdentifierRepository,
    A: Authorizer,
{
    pub fn new(repo: R, authorizer: A, shibboleth: ShibbolethConfig) -> Self {
        Self {
            repo,
            authorizer,
            shibboleth,
        }
    }

    /// Loads the edit view for one organisation.
    pub fn admin_edit(&self, user: &User, org_id: OrgId) -> Result<OrgEditView, OrgServiceError> {
        let org = self.load_authorized(user, OrgAction::AdminEdit, org_id)?;
        let languages = self.repo.list_languages()?;

        Ok(OrgEditView {
            url: admin_update_path(org.id),
            org,
            languages,
            method: "PUT",
        })
    }

    /// Applies one submitted org form.
    ///
    /// # Errors
    /// - `OrgNotFound` / `Forbidden` before anything is read from the form.
    /// - `Validation` when the projected profile or reconciled identifiers
    ///   are invalid; storage is left untouched.
    /// - `Repo` for storage failures, including the uniqueness guard.
    pub fn admin_update(
        &mut self,
        user: &User,
        org_id: OrgId,
        form: OrgForm,
    ) -> Result<UpdateOutcome, OrgServiceError> {
        let mut org = self.load_authorized(user, OrgAction::AdminUpdate, org_id)?;
        let tab = form.tab();

        let edit = form.project(user.role).inspect_err(|err| {
            warn!(
                "event=org_update module=service status=rejected org_id={} reason={:?}",
                org_id, err
            );
        })?;
        edit.profile.apply_to(&mut org);

        let candidates = match &edit.privileged {
            Some(privileged) => {
                privileged.apply_to(&mut org);
                self.candidates(org.id, privileged)?
            }
            None => Vec::new(),
        };

        let saved = match self.repo.save_org(&org, &candidates) {
            Ok(saved) => saved,
            Err(err) => {
                warn!(
                    "event=org_update module=service status=error org_id={} tab={}",
                    org_id,
                    tab.as_str()
                );
                return Err(err.into());
            }
        };

        info!(
            "event=org_update module=service status=ok org_id={} tab={} privileged={} removed={} added={}",
            org_id,
            tab.as_str(),
            edit.privileged.is_some(),
            saved.changes.removed.len(),
            saved.changes.added.len()
        );

        Ok(UpdateOutcome {
            org: saved.org,
            tab,
            actions: saved.actions,
        })
    }

    fn load_authorized(
        &self,
        user: &User,
        action: OrgAction,
        org_id: OrgId,
    ) -> Result<Org, OrgServiceError> {
        let org = self
            .repo
            .get_org(org_id)?
            .ok_or(OrgServiceError::OrgNotFound(org_id))?;

        if !self.authorizer.allows(user, action, &org) {
            warn!(
                "event=authorize module=service status=denied action={} org_id={} user_id={}",
                action.as_str(),
                org_id,
                user.id
            );
            return Err(OrgServiceError::Forbidden { action, org_id });
        }
        Ok(org)
    }

    /// Identifier candidates in application order: submitted identifiers
    /// first, then identifiers carried by the org lookup selection.
    fn candidates(
        &self,
        org_id: OrgId,
        privileged: &PrivilegedFields,
    ) -> Result<Vec<Identifier>, OrgServiceError> {
        let mut candidates = Vec::new();

        if self.shibboleth.use_filtered_discovery_service {
            let shibboleth = self.repo.scheme_by_name(SCHEME_SHIBBOLETH)?;
            if let (Some(scheme), Some(first)) = (shibboleth, privileged.identifiers.first()) {
                let entity_id = first.value.as_deref().unwrap_or_default().trim();
                if entity_id.is_empty() {
                    // blanked out: only a referenced stored row can be removed
                    if let Some(id) = submitted_row_id(first) {
                        candidates.push(Identifier::persisted(id, scheme.id, ""));
                    }
                } else {
                    candidates.push(self.repo.find_or_build(org_id, scheme.id, entity_id)?);
                }
            }
        } else {
            candidates.extend(
                privileged
                    .identifiers
                    .iter()
                    .filter_map(IdentifierAttributes::to_candidate),
            );
        }

        if let Some(selection) = &privileged.selection {
            let schemes = self.repo.list_schemes()?;
            candidates.extend(selection.identifiers_for(&schemes));
        }

        Ok(candidates)
    }
}

fn submitted_row_id(attributes: &IdentifierAttributes) -> Option<IdentifierId> {
    attributes
        .id
        .as_deref()
        .map(str::trim)
        .and_then(|raw| raw.parse::<IdentifierId>().ok())
}

#[cfg(test)]
mod tests {
    use super::{admin_edit_path, admin_update_path, OrgServiceError};
    use crate::model::org::OrgValidationError;
    use crate::repo::RepoError;

    #[test]
    fn paths_follow_admin_routes() {
        assert_eq!(admin_edit_path(7), "/org/admin/7/admin_edit");
        assert_eq!(admin_update_path(7), "/org/admin/7/admin_update");
    }

    #[test]
    fn repo_validation_errors_surface_as_validation() {
        let err = OrgServiceError::from(RepoError::Validation(OrgValidationError::BlankName));
        assert!(matches!(
            err,
            OrgServiceError::Validation(OrgValidationError::BlankName)
        ));
        assert!(matches!(
            OrgServiceError::from(RepoError::OrgNotFound(3)),
            OrgServiceError::OrgNotFound(3)
        ));
    }
}
