//! Filtered Shibboleth discovery.
//!
//! # Responsibility
//! - List organisations that can sign in through a federation IdP.
//! - Turn a chosen organisation into the service provider login redirect.
//!
//! # Invariants
//! - Login and callback URLs are always `https`.
//! - Only organisations holding a `shibboleth` identifier are offered.

use crate::config::ShibbolethConfig;
use crate::model::identifier::SCHEME_SHIBBOLETH;
use crate::model::org::OrgId;
use crate::repo::identifier_repo::{IdentifierRepository, SchemeHolder};
use crate::repo::RepoResult;
use log::{info, warn};

/// Outcome of opening the discovery page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// The visitor is already signed in.
    SignedIn,
    /// No organisation holds a federation entity ID.
    Empty,
    /// Organisations to choose from, ordered by name.
    Choose(Vec<SchemeHolder>),
}

/// Outcome of submitting the discovery form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Passthru {
    /// No organisation was chosen.
    NoSelection,
    /// The chosen organisation has no federation entity ID.
    NotConfigured,
    /// Start the IdP login at `url`.
    Login { url: String },
}

pub struct ShibbolethService<R: IdentifierRepository> {
    repo: R,
    config: ShibbolethConfig,
}

impl<R: IdentifierRepository> ShibbolethService<R> {
    pub fn new(repo: R, config: ShibbolethConfig) -> Self {
        Self { repo, config }
    }

    pub fn discovery(&self, signed_in: bool) -> RepoResult<Discovery> {
        if signed_in {
            return Ok(Discovery::SignedIn);
        }

        let holders = self.repo.holders_of_scheme(SCHEME_SHIBBOLETH)?;
        if holders.is_empty() {
            warn!("event=shibboleth_ds module=service status=empty");
            return Ok(Discovery::Empty);
        }
        Ok(Discovery::Choose(holders))
    }

    /// Resolves the chosen organisation to a login redirect.
    ///
    /// `base_url` is the scheme and authority the request arrived on.
    pub fn passthru(
        &self,
        org_id: Option<&str>,
        org_name: Option<&str>,
        base_url: &str,
    ) -> RepoResult<Passthru> {
        if org_name.map_or(true, |name| name.trim().is_empty()) {
            return Ok(Passthru::NoSelection);
        }

        let Some(org_id) = org_id.and_then(|raw| raw.trim().parse::<OrgId>().ok()) else {
            return Ok(Passthru::NotConfigured);
        };

        let entity = self
            .repo
            .holders_of_scheme(SCHEME_SHIBBOLETH)?
            .into_iter()
            .find(|holder| holder.org_id == org_id);

        match entity {
            Some(holder) => {
                info!(
                    "event=shibboleth_passthru module=service status=ok org_id={}",
                    org_id
                );
                Ok(Passthru::Login {
                    url: self.login_url(base_url, &holder.identifier.value),
                })
            }
            None => {
                warn!(
                    "event=shibboleth_passthru module=service status=not_configured org_id={}",
                    org_id
                );
                Ok(Passthru::NotConfigured)
            }
        }
    }

    fn login_url(&self, base_url: &str, entity_id: &str) -> String {
        let base = force_https(base_url.trim_end_matches('/'));
        format!(
            "{base}{}?target={base}{}&entityID={entity_id}",
            self.config.login_url, self.config.callback_path
        )
    }
}

/// Rewrites every `http:` to `https:`.
pub fn force_https(url: &str) -> String {
    url.replace("http:", "https:")
}
